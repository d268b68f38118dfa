//! HTTP surface — thin axum wrappers over the engines.
//!
//! Every route takes the caller identity from the `X-User-Email` header.
//! Real authentication would slot into the `Identity` extractor; the engine
//! contract only needs a stable identity key.

mod artifact;
mod chat;

use std::sync::Arc;

use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::{StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::engine::{CompletionEngine, WorkflowEngine};
use crate::error::{EngineError, Error};

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub completion: Arc<CompletionEngine>,
    pub workflow: Arc<WorkflowEngine>,
}

/// Build the application router.
pub fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health))
        .route("/chat/start", get(chat::start_chat))
        .route("/chat", post(chat::chat))
        .route("/chat/set_name", post(chat::set_name))
        .route("/chat/update_profile", post(chat::update_profile))
        .route("/chat/history", get(chat::chat_history))
        .route("/profile", get(chat::get_profile))
        .route("/debug/profile_status", get(chat::profile_status))
        .route("/artifact/step/{step_name}", post(artifact::submit_step))
        .route("/artifact", get(artifact::get_artifact))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "stride-coach"
    }))
}

// ── Errors ──────────────────────────────────────────────────────────

/// Error payload for HTTP responses.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            detail: "Missing or empty X-User-Email header".to_string(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let status = match &error {
            Error::Engine(EngineError::EmptyMessage)
            | Error::Engine(EngineError::InvalidField { .. }) => StatusCode::BAD_REQUEST,
            Error::Engine(EngineError::UnknownField(_))
            | Error::Engine(EngineError::UnknownStep(_)) => StatusCode::NOT_FOUND,
            Error::Llm(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Store(_) | Error::Retrieval(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            detail: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, detail = %self.detail, "Request failed");
        }
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

// ── Identity ────────────────────────────────────────────────────────

/// The caller's identity key, from the `X-User-Email` header.
pub struct Identity(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-email")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Identity(s.to_string()))
            .ok_or_else(ApiError::unauthorized)
    }
}
