//! SCRIPT framing: the partition is decided by a user script in the sandbox.
//!
//! The script sees `{ chunks: [{data, timestamp}], forceFlush }` and must return
//! `{ frames: [{data, timestamp, payloadStart?, payloadLength?}], remaining: [...] }`.

use std::time::Duration;

use protoframe_sandbox::{execute_with_deadline, Sandbox, SandboxError, ScriptContext};
use serde_json::Value;

use crate::compose::{Composed, TimedChunk};
use crate::error::Result;

/// Run a framing script over `chunks`.
///
/// The returned shape is checked before it is trusted: a malformed result is a
/// [`SandboxError::InvalidShape`] and leaves the caller's buffer untouched.
pub async fn compose_frames_scripted(
    sandbox: &dyn Sandbox,
    script: &str,
    chunks: &[TimedChunk],
    force_flush: bool,
    deadline: Duration,
) -> Result<Composed> {
    let chunks_json = serde_json::to_value(chunks).map_err(|err| SandboxError::InvalidShape(err.to_string()))?;
    let context = ScriptContext::new()
        .bind("chunks", chunks_json)
        .bind("forceFlush", Value::Bool(force_flush));

    let value = execute_with_deadline(sandbox, script, context, deadline).await?;
    Ok(parse_script_result(value)?)
}

fn parse_script_result(value: Value) -> std::result::Result<Composed, SandboxError> {
    let Value::Object(mut map) = value else {
        return Err(SandboxError::InvalidShape(format!(
            "expected {{frames, remaining}}, got {}",
            type_name(&value)
        )));
    };
    // Scripts commonly omit an empty list.
    map.entry("frames").or_insert_with(|| Value::Array(Vec::new()));
    map.entry("remaining").or_insert_with(|| Value::Array(Vec::new()));

    let composed: Composed = serde_json::from_value(Value::Object(map))
        .map_err(|err| SandboxError::InvalidShape(err.to_string()))?;
    for frame in &composed.frames {
        if let (Some(start), Some(len)) = (frame.payload_start, frame.payload_length) {
            if start.saturating_add(len) > frame.data.len() {
                return Err(SandboxError::InvalidShape(format!(
                    "payload range {start}+{len} exceeds frame of {} bytes",
                    frame.data.len()
                )));
            }
        }
    }
    Ok(composed)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
