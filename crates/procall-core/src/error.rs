//! Error types for procall

use thiserror::Error;

/// Core error type for procall operations
#[derive(Error, Debug)]
pub enum ProcallError {
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Duplicate parameter: {0}")]
    DuplicateParameter(String),

    #[error("No connection string configured for '{0}'")]
    ConnectionResolutionFailed(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Cannot convert {from} to {to}")]
    CoercionFailed { from: String, to: &'static str },

    #[error("JSON decode failed: {0}")]
    DecodeFailed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcallError {
    pub(crate) fn coercion(from: &crate::Value, to: &'static str) -> Self {
        ProcallError::CoercionFailed {
            from: from.describe(),
            to,
        }
    }

    /// Short machine-friendly name of the error kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            ProcallError::UnsupportedType(_) => "unsupported_type",
            ProcallError::DuplicateParameter(_) => "duplicate_parameter",
            ProcallError::ConnectionResolutionFailed(_) => "connection_resolution_failed",
            ProcallError::ExecutionFailed(_) => "execution_failed",
            ProcallError::CoercionFailed { .. } => "coercion_failed",
            ProcallError::DecodeFailed(_) => "decode_failed",
            ProcallError::Configuration(_) => "configuration",
            ProcallError::Io(_) => "io",
        }
    }
}

/// Result type alias for procall operations
pub type Result<T> = std::result::Result<T, ProcallError>;
