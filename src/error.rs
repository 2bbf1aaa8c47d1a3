//! Error types shared across the engine

use thiserror::Error;

/// Errors raised by a graph store adapter
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Graph store is closed")]
    Closed,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed [{code}]: {message}")]
    Query { code: String, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unsupported query: {0}")]
    Unsupported(String),
}

impl GraphError {
    pub fn query(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the text-completion capability
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Empty completion")]
    EmptyCompletion,
}

/// Errors raised by the external text lookup
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Page not found: {0}")]
    NotFound(String),

    #[error("'{title}' may refer to several pages: {options}")]
    Disambiguation { title: String, options: String },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<::config::ConfigError> for EngineError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
