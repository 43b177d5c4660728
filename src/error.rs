//! Error types for the access portal server.

use thiserror::Error;

/// Result type for access portal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the access portal server.
#[derive(Debug, Error)]
pub enum Error {
    /// A lookup key was absent from its table or template store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid or missing tool parameters.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// A knowledge table could not be parsed.
    #[error("table error: {0}")]
    Table(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A remote system returned an unusable response.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// HTTP client error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Registry file error.
    #[error("registry error: {0}")]
    Registry(#[from] serde_yaml::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
