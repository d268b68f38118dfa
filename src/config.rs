//! Configuration — one explicit object built at startup and passed by
//! reference into the engines, never read from the environment mid-flight.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig, RetryPolicy};

/// Default read-view cap for conversation logs.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Default number of knowledge snippets retrieved per chat turn.
pub const DEFAULT_RETRIEVAL_TOP_K: usize = 3;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Directory for the flat-JSON store.
    pub data_dir: PathBuf,
    /// Conversation-log read-view cap.
    pub history_window: usize,
    /// Knowledge snippets per retrieval query.
    pub retrieval_top_k: usize,
    /// Knowledge metadata file; retrieval is disabled when absent.
    pub knowledge_path: Option<PathBuf>,
    /// Workflow spec file; the built-in coaching workflow is used when absent.
    pub workflow_path: Option<PathBuf>,
    /// LLM backend, key, and model.
    pub llm: LlmConfig,
    /// Transport retry policy for the LLM boundary.
    pub retry: RetryPolicy,
}

impl AppConfig {
    /// Build the configuration from environment variables.
    ///
    /// `STRIDE_COACH_BACKEND` selects `openai` (default) or `gemini`; the
    /// matching `OPENAI_API_KEY` / `GEMINI_API_KEY` must be set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend: LlmBackend = std::env::var("STRIDE_COACH_BACKEND")
            .unwrap_or_else(|_| "openai".to_string())
            .parse()?;

        let (key_var, default_model) = match backend {
            LlmBackend::OpenAi => ("OPENAI_API_KEY", "gpt-4-turbo"),
            LlmBackend::Gemini => ("GEMINI_API_KEY", "gemini-1.5-pro"),
        };
        let api_key = std::env::var(key_var)
            .map_err(|_| ConfigError::MissingEnvVar(key_var.to_string()))?;

        let model = std::env::var("STRIDE_COACH_MODEL")
            .unwrap_or_else(|_| default_model.to_string());

        let bind_addr = std::env::var("STRIDE_COACH_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let bind_addr: SocketAddr =
            bind_addr
                .parse()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "STRIDE_COACH_BIND".to_string(),
                    message: format!("{e}"),
                })?;

        let data_dir = std::env::var("STRIDE_COACH_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let history_window = match std::env::var("STRIDE_COACH_HISTORY_WINDOW") {
            Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: "STRIDE_COACH_HISTORY_WINDOW".to_string(),
                message: format!("{e}"),
            })?,
            Err(_) => DEFAULT_HISTORY_WINDOW,
        };

        let knowledge_path = std::env::var("STRIDE_COACH_KNOWLEDGE_PATH")
            .ok()
            .map(PathBuf::from);
        let workflow_path = std::env::var("STRIDE_COACH_WORKFLOW_PATH")
            .ok()
            .map(PathBuf::from);

        Ok(Self {
            bind_addr,
            data_dir,
            history_window,
            retrieval_top_k: DEFAULT_RETRIEVAL_TOP_K,
            knowledge_path,
            workflow_path,
            llm: LlmConfig {
                backend,
                api_key: secrecy::SecretString::from(api_key),
                model,
            },
            retry: RetryPolicy::default(),
        })
    }
}
