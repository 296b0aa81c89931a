// =============================================================================
// Engine Errors
// =============================================================================
//
// Typed errors that cross the core / API seam. Startup and file I/O keep
// using `anyhow`; anything a handler needs to map to a status code is an
// `EngineError`.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Missing or malformed signal, price, or configuration value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Factor name not present in the configured factor set.
    #[error("unknown factor '{0}'")]
    UnknownFactor(String),

    /// Upstream fetch failed or timed out.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Store lookup miss.
    #[error("not found: {0}")]
    NotFound(String),
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Short machine-readable code used in API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::UnknownFactor(_) => "unknown_factor",
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::NotFound(_) => "not_found",
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
