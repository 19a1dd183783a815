//! Error types for recobra-core

use thiserror::Error;

/// Main error type for the recobra-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Cache database error
    #[error("cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pattern compilation error
    #[error("invalid pattern for tag {tag}: {message}")]
    Pattern { tag: String, message: String },

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// LLM error
    #[error("LLM error: {0}")]
    Llm(String),
}

/// Result type alias for recobra-core
pub type Result<T> = std::result::Result<T, Error>;
