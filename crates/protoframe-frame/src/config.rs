use std::time::Duration;

use protoframe_codec::text::{looks_like_hex_bytes, parse_hex, unescape};
use protoframe_codec::ByteOrder;
use protoframe_sandbox::DEFAULT_SCRIPT_TIMEOUT;
use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};

/// Default cap on bytes held while waiting for a frame boundary.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Largest supported length prefix, in bytes.
pub const MAX_PREFIX_LENGTH_SIZE: usize = 8;

/// How a delimiter is written in a protocol document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DelimiterRepr")]
#[serde(rename_all = "camelCase")]
pub enum DelimiterPattern {
    /// Escape-coded text such as `\r\n`.
    Escaped(String),
    /// Space-separated hex bytes such as `0D 0A`.
    Hex(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DelimiterRepr {
    Plain(String),
    Escaped { escaped: String },
    Hex { hex: String },
}

impl From<DelimiterRepr> for DelimiterPattern {
    fn from(repr: DelimiterRepr) -> Self {
        match repr {
            DelimiterRepr::Plain(s) => Self::detect(&s),
            DelimiterRepr::Escaped { escaped } => Self::Escaped(escaped),
            DelimiterRepr::Hex { hex } => Self::Hex(hex),
        }
    }
}

impl DelimiterPattern {
    /// Classify a bare delimiter string: two or more two-digit hex tokens are hex,
    /// anything else is escape-coded text.
    pub fn detect(input: &str) -> Self {
        if looks_like_hex_bytes(input) {
            Self::Hex(input.to_string())
        } else {
            Self::Escaped(input.to_string())
        }
    }

    /// The delimiter byte sequence.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            Self::Escaped(text) => unescape(text),
            Self::Hex(hex) => parse_hex(hex)?,
        };
        if bytes.is_empty() {
            return Err(FrameError::InvalidConfig("delimiter is empty".into()));
        }
        Ok(bytes)
    }
}

/// Framing strategy for a session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FramingConfig {
    /// Every push becomes one frame.
    #[default]
    None,
    /// Split after each delimiter occurrence.
    Delimiter { delimiter: DelimiterPattern },
    /// Emit everything buffered after `timeout_ms` of silence.
    #[serde(rename_all = "camelCase")]
    Timeout { timeout_ms: u64 },
    /// Frames start with an unsigned length of `prefix_length_size` bytes.
    #[serde(rename_all = "camelCase")]
    PrefixLength {
        prefix_length_size: usize,
        #[serde(default)]
        byte_order: ByteOrder,
    },
    /// User script decides the partition.
    Script { script: String },
}

impl FramingConfig {
    pub fn delimiter(pattern: &str) -> Self {
        Self::Delimiter {
            delimiter: DelimiterPattern::detect(pattern),
        }
    }

    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn prefix_length(prefix_length_size: usize, byte_order: ByteOrder) -> Self {
        Self::PrefixLength {
            prefix_length_size,
            byte_order,
        }
    }

    /// Strategy name as written in protocol documents.
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Delimiter { .. } => "DELIMITER",
            Self::Timeout { .. } => "TIMEOUT",
            Self::PrefixLength { .. } => "PREFIX_LENGTH",
            Self::Script { .. } => "SCRIPT",
        }
    }

    /// Debounce period for TIMEOUT framing.
    pub fn debounce(&self) -> Option<Duration> {
        match self {
            Self::Timeout { timeout_ms } => Some(Duration::from_millis(*timeout_ms)),
            _ => None,
        }
    }

    /// Reject configurations that can never produce a frame.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Delimiter { delimiter } => delimiter.to_bytes().map(|_| ()),
            Self::Timeout { timeout_ms: 0 } => {
                Err(FrameError::InvalidConfig("timeout must be greater than zero".into()))
            }
            Self::PrefixLength {
                prefix_length_size, ..
            } if !(1..=MAX_PREFIX_LENGTH_SIZE).contains(prefix_length_size) => {
                Err(FrameError::InvalidConfig(format!(
                    "prefix length size {prefix_length_size} outside 1..={MAX_PREFIX_LENGTH_SIZE}"
                )))
            }
            Self::Script { script } if script.trim().is_empty() => {
                Err(FrameError::InvalidConfig("framing script is empty".into()))
            }
            _ => Ok(()),
        }
    }
}

/// Runtime limits for a [`StreamFramer`](crate::StreamFramer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerOptions {
    /// Buffered bytes above this are force-emitted as one frame.
    pub max_buffer_size: usize,
    /// Wall-clock budget for one SCRIPT framing call.
    pub script_timeout: Duration,
}

impl Default for FramerOptions {
    fn default() -> Self {
        Self {
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
        }
    }
}
