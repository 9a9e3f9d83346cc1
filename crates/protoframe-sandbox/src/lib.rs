//! Contract for running user scripts from framing, validation and transforms.
//!
//! The runtime itself lives outside protoframe. Callers go through
//! [`execute_with_deadline`] so a runaway script is abandoned after its budget
//! instead of stalling the session that invoked it.

pub mod error;
pub mod sandbox;

pub use error::{Result, SandboxError};
pub use sandbox::{
    execute_with_deadline, CollectingHost, FnSandbox, NoSandbox, Sandbox, ScriptContext,
    ScriptHost, DEFAULT_SCRIPT_TIMEOUT,
};
