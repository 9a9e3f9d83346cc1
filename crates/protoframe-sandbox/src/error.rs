use std::time::Duration;

/// Errors surfaced by a script sandbox invocation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SandboxError {
    /// The script threw.
    #[error("script error: {0}")]
    Script(String),

    /// The script did not finish within its deadline and was abandoned.
    #[error("script exceeded deadline of {0:?}")]
    Timeout(Duration),

    /// The script returned a value that does not fit the expected contract.
    #[error("script returned unexpected shape: {0}")]
    InvalidShape(String),

    /// No sandbox is configured for this host.
    #[error("no script sandbox available")]
    Unavailable,
}

pub type Result<T> = std::result::Result<T, SandboxError>;
