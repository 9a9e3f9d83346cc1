//! Stream framing for protoframe.
//!
//! Transports deliver raw, arbitrarily split [`TimedChunk`]s. A [`StreamFramer`]
//! buffers them and cuts complete [`Frame`]s under one of five strategies:
//! - `NONE`: every push is a frame
//! - `DELIMITER`: split after an escape-coded or hex delimiter
//! - `TIMEOUT`: emit after a quiet period (debounce)
//! - `PREFIX_LENGTH`: 1-8 byte unsigned length prefix
//! - `SCRIPT`: a user script in the sandbox decides
//!
//! The strategies themselves are the pure [`compose_frames`] function; the
//! framer only owns the buffer and the debounce deadline.

pub mod compose;
pub mod config;
pub mod error;
pub mod framer;
pub mod script;
pub mod session;

pub use compose::{compose_frames, Composed, Frame, TimedChunk};
pub use config::{DelimiterPattern, FramerOptions, FramingConfig, DEFAULT_MAX_BUFFER_SIZE};
pub use error::{FrameError, Result};
pub use framer::StreamFramer;
pub use script::compose_frames_scripted;
pub use session::{FramerSession, DEFAULT_CHANNEL_CAPACITY};
