//! Stream framing, structured message codecs and command templating for device protocols.
//!
//! protoframe turns the raw byte stream of a serial or network transport into
//! discrete frames, decodes them against declarative message structures, checks
//! them against command validations, and builds outbound payloads from protocol
//! command templates.
//!
//! # Crate Structure
//!
//! - [`codec`]: Checksums, numerics, structured message build/parse
//! - [`frame`]: Stream framer (NONE, DELIMITER, TIMEOUT, PREFIX_LENGTH, SCRIPT)
//! - [`validate`]: Response validation and variable extraction
//! - [`command`]: Two-layer command merge, parameter substitution, sync
//! - [`sandbox`]: Script sandbox contract used by SCRIPT strategies

/// Re-export codec types.
pub mod codec {
    pub use protoframe_codec::*;
}

/// Re-export framer types.
pub mod frame {
    pub use protoframe_frame::*;
}

/// Re-export validation types.
pub mod validate {
    pub use protoframe_validate::*;
}

/// Re-export command types.
pub mod command {
    pub use protoframe_command::*;
}

/// Re-export sandbox types.
pub mod sandbox {
    pub use protoframe_sandbox::*;
}
