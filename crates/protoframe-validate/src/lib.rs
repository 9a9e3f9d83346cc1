//! Response validation for protoframe sessions.
//!
//! After a command is sent, its [`CommandValidation`] is registered with the
//! [`ValidationEngine`] under the session id. Every inbound frame of that
//! session is checked against the pending validations; the first frame that
//! passes resolves the validation and runs variable extraction (regex groups,
//! decoded structure fields, transform script).

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod validation;

pub use config::EngineConfig;
pub use engine::{ValidationEngine, ValidationHandle, ValidationPass};
pub use error::{Result, ValidationError};
pub use extract::{extract_regex, extract_variables, run_transform_script};
pub use matcher::{Matcher, Verdict};
pub use validation::{
    CaptureVariable, CommandValidation, FieldExtraction, MatchType, RegexExtraction, ResponsePattern,
    ValidationRequest, ValidationRule,
};
