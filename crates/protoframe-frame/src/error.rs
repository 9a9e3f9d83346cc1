use protoframe_codec::CodecError;
use protoframe_sandbox::SandboxError;

/// Errors that can occur while framing a byte stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The framing configuration cannot be applied.
    #[error("invalid framing config: {0}")]
    InvalidConfig(String),

    /// The delimiter pattern could not be decoded.
    #[error("invalid delimiter: {0}")]
    InvalidDelimiter(#[from] CodecError),

    /// SCRIPT framing needs a sandbox and the async path.
    #[error("SCRIPT framing requires a sandbox")]
    ScriptUnavailable,

    /// The framing script failed, timed out or returned a malformed result.
    #[error("framing script failed: {0}")]
    Script(#[from] SandboxError),

    /// The framer session task has stopped.
    #[error("framer session closed")]
    SessionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
