use protoframe_codec::CodecError;

/// Errors that can occur while preparing a command for sending.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// A required parameter has neither a value nor a default.
    #[error("required parameter '{name}' has no value")]
    RequiredParameterMissing { name: String },

    /// A parameter value does not fit its declared type or range.
    #[error("parameter '{name}' is invalid: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// A STRUCTURED command carries no message structure.
    #[error("command '{0}' is STRUCTURED but has no message structure")]
    MissingStructure(String),

    /// Payload encoding failed in the codec.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, CommandError>;
