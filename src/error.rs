//! Error types for server setup and transport

use crate::engines::EngineError;
use thiserror::Error;

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors outside a single tool call: configuration, startup and transport
#[derive(Debug, Error)]
pub enum Error {
    /// Engine construction or selection failed
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Error during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A setting holds a value that cannot be used
    #[error("invalid setting `{key}`: {reason}")]
    Config { key: &'static str, reason: String },

    /// Settings file could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Outbound HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Bind address could not be parsed
    #[error("invalid bind address: {0}")]
    Address(#[from] std::net::AddrParseError),

    /// A background task panicked or was aborted
    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
