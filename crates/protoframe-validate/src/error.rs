use std::time::Duration;

/// Terminal failure states of a pending validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// No matching response arrived before the validation timeout.
    #[error("validation '{label}' timed out after {timeout:?}")]
    Timeout { label: String, timeout: Duration },

    /// The response was rejected (script failure reason, invalid pattern).
    #[error("validation '{label}' failed: {reason}")]
    Failed { label: String, reason: String },

    /// The validation was cleared before it resolved.
    #[error("validation '{label}' cancelled")]
    Cancelled { label: String },
}

pub type Result<T> = std::result::Result<T, ValidationError>;
