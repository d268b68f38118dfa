use std::sync::Arc;

use stride_coach::composer::Composer;
use stride_coach::config::AppConfig;
use stride_coach::engine::{CompletionEngine, WorkflowEngine, WorkflowSpec};
use stride_coach::http::{self, AppState};
use stride_coach::llm::{LlmProvider, RetryingProvider, create_provider};
use stride_coach::retrieval::{KeywordIndex, SnippetIndex};
use stride_coach::store::{JsonStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export OPENAI_API_KEY=sk-... (or GEMINI_API_KEY with STRIDE_COACH_BACKEND=gemini)");
        std::process::exit(1);
    });

    eprintln!("🏃 Stride Coach v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   API: http://{}", config.bind_addr);
    eprintln!("   Data: {}", config.data_dir.display());

    // ── LLM provider (retry policy wraps the transport) ─────────────────
    let provider = create_provider(&config.llm)?;
    let llm: Arc<dyn LlmProvider> = Arc::new(RetryingProvider::new(provider, config.retry));

    // ── Knowledge retrieval ─────────────────────────────────────────────
    let retrieval: Option<Arc<dyn SnippetIndex>> = match config.knowledge_path {
        Some(ref path) => match KeywordIndex::load(path) {
            Ok(index) => {
                eprintln!("   Knowledge: {} entries from {}", index.len(), path.display());
                Some(Arc::new(index))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load knowledge index, retrieval disabled");
                eprintln!("   Knowledge: disabled ({e})");
                None
            }
        },
        None => {
            eprintln!("   Knowledge: disabled");
            None
        }
    };

    // ── Store ───────────────────────────────────────────────────────────
    let store: Arc<dyn Store> = Arc::new(JsonStore::new(
        config.data_dir.clone(),
        config.history_window,
    ));

    // ── Workflow spec ───────────────────────────────────────────────────
    let workflow_spec = match config.workflow_path {
        Some(ref path) => WorkflowSpec::from_file(path).unwrap_or_else(|e| {
            eprintln!("Error: Failed to load workflow spec from {}: {e}", path.display());
            std::process::exit(1);
        }),
        None => WorkflowSpec::default_coaching(),
    };
    eprintln!("   Workflow: {} steps\n", workflow_spec.steps.len());

    // ── Engines ─────────────────────────────────────────────────────────
    let composer = Arc::new(Composer::new(llm, retrieval, config.retrieval_top_k));
    let completion = Arc::new(CompletionEngine::new(
        Arc::clone(&store),
        Arc::clone(&composer),
    ));
    let workflow = Arc::new(WorkflowEngine::new(
        store,
        composer,
        Arc::new(workflow_spec),
    ));

    // ── HTTP server ─────────────────────────────────────────────────────
    let app = http::router(AppState {
        completion,
        workflow,
    });
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Server started");
    axum::serve(listener, app).await?;

    Ok(())
}
