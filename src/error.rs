//! Error taxonomy for the retention engine.
//!
//! Parameter violations and codec failures are programmer errors and are
//! returned immediately. Storage unavailability is deliberately absent here:
//! it is detected once by the local storage probe and degrades to no-ops.

pub use codec::CodecError;

/// Errors produced by channels, the orchestrator, and store bindings.
#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    /// An argument was rejected at the API boundary.
    #[error("{function}() parameter violation: {message}")]
    ParameterViolation { function: &'static str, message: String },

    /// A value could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl RetentionError {
    /// Stable machine-readable code for logs and tooling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ParameterViolation { .. } => "E_PARAMETER_VIOLATION",
            Self::Codec(CodecError::UnsupportedType(_)) => "E_UNSUPPORTED_TYPE",
            Self::Codec(CodecError::EnvironmentUnsupported { .. }) => "E_ENVIRONMENT_UNSUPPORTED",
            Self::Codec(CodecError::Mismatch(_)) => "E_TYPE_MISMATCH",
        }
    }
}

pub type Result<T, E = RetentionError> = std::result::Result<T, E>;

/// Reject empty keys, naming the offending function.
pub(crate) fn check_key(function: &'static str, key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(RetentionError::ParameterViolation {
            function,
            message: "key is required (a non-empty string)".to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
