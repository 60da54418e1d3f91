//! Engine error taxonomy

use super::traits::OperationKind;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors raised while constructing, selecting or calling an engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Provider could not be constructed (missing credentials or config)
    #[error("failed to initialize {engine} engine: {reason}")]
    Construction { engine: String, reason: String },

    /// Nothing was registered, so there is nothing to select
    #[error("no search engines available; please ensure API keys are set")]
    NoEngineAvailable,

    /// Operation invoked on an engine that does not serve it
    #[error("{engine} does not support {operation}")]
    Unsupported {
        engine: String,
        operation: OperationKind,
    },

    /// Network or provider failure
    #[error("{engine} upstream error: {message}")]
    Upstream {
        engine: String,
        status: Option<u16>,
        message: String,
    },

    /// Request parameters failed validation
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Upstream replied successfully but carried no data
    #[error("{engine} returned no data")]
    NoData { engine: String },

    /// Caller cancelled the call
    #[error("call cancelled")]
    Cancelled,

    /// Call deadline elapsed
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
}

impl EngineError {
    pub fn construction(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(engine: impl Into<String>, operation: OperationKind) -> Self {
        Self::Unsupported {
            engine: engine.into(),
            operation,
        }
    }

    pub fn upstream(
        engine: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Upstream {
            engine: engine.into(),
            status,
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    /// Short machine-readable label, used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Construction { .. } => "construction",
            Self::NoEngineAvailable => "no_engine_available",
            Self::Unsupported { .. } => "unsupported",
            Self::Upstream { .. } => "upstream",
            Self::InvalidParams(_) => "invalid_params",
            Self::NoData { .. } => "no_data",
            Self::Cancelled => "cancelled",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Whether this error was caused by the caller rather than the provider
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParams(_) | Self::Unsupported { .. } | Self::Cancelled
        )
    }
}
