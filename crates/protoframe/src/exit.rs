use std::fmt;
use std::io;
use std::path::Path;

use protoframe_codec::CodecError;
use protoframe_command::CommandError;
use protoframe_frame::FrameError;

// Exit codes follow sysexits-style semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn json_error(path: &Path, err: serde_json::Error) -> CliError {
    CliError::new(DATA_INVALID, format!("{} is not valid: {err}", path.display()))
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    match err {
        CodecError::MissingParameter(_) | CodecError::NotNumeric { .. } | CodecError::InvalidHex(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::InvalidConfig(_) | FrameError::InvalidDelimiter(_) | FrameError::ScriptUnavailable => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

pub fn command_error(context: &str, err: CommandError) -> CliError {
    match err {
        CommandError::Codec(err) => codec_error(context, err),
        CommandError::RequiredParameterMissing { .. } | CommandError::InvalidParameter { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        CommandError::MissingStructure(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}
