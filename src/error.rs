//! Error types for Stride Coach.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors from the JSON store.
///
/// A conversation log that fails to parse is *not* an error here — the store
/// resets it to empty and persists the reset. A profile or workflow-state
/// file that fails to parse is surfaced as `Serialization`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Knowledge-index errors (load time only — search never fails, it degrades
/// to an empty result).
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse knowledge metadata: {0}")]
    Parse(String),
}

/// Completion-engine errors — the request-rejecting class. A validation
/// failure leaves the stored record unchanged.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Invalid value for field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Unknown profile field: {0}")]
    UnknownField(String),

    #[error("Unknown workflow step: {0}")]
    UnknownStep(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
