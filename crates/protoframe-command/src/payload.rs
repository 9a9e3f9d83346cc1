use std::sync::Arc;

use protoframe_codec::text::{parse_hex, unescape};
use protoframe_codec::{build_structured_message, BuildInput};
use protoframe_validate::ValidationRequest;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CommandError, Result};
use crate::model::{ExecutableCommand, PayloadMode};
use crate::params::{resolve_parameter_values, substitute_parameters};

/// Wire bytes of a command together with the text they came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedPayload {
    pub bytes: Vec<u8>,
    /// Payload template after substitution.
    pub text: String,
    pub unresolved: Vec<String>,
}

/// A command ready to be written to the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedCommand {
    pub payload: EncodedPayload,
    /// Resolved parameter values, defaults included.
    pub values: Map<String, Value>,
}

/// Encode `command`'s payload with already resolved parameter `values`.
///
/// - `TEXT`: substituted template with escapes processed, plus the line ending
/// - `HEX`: substituted template parsed as hex bytes
/// - `STRUCTURED`: the message structure built from the bindings and values;
///   non-empty template text becomes the PAYLOAD region
pub fn encode_command_payload(command: &ExecutableCommand, values: &Map<String, Value>) -> Result<EncodedPayload> {
    let outcome = substitute_parameters(&command.payload, values, &command.parameters);

    let bytes = match command.mode {
        PayloadMode::Text => {
            let mut bytes = unescape(&outcome.text);
            bytes.extend_from_slice(command.line_ending.as_bytes());
            bytes
        }
        PayloadMode::Hex => parse_hex(&outcome.text)?,
        PayloadMode::Structured => {
            let structure = command
                .message_structure
                .as_ref()
                .ok_or_else(|| CommandError::MissingStructure(command.id.clone()))?;
            let region = unescape(&outcome.text);
            let mut input = BuildInput::new(values, &command.bindings);
            if !outcome.text.trim().is_empty() {
                input = input.with_payload(&region);
            }
            build_structured_message(structure, &input)?.data
        }
    };

    Ok(EncodedPayload {
        bytes,
        text: outcome.text,
        unresolved: outcome.unresolved,
    })
}

/// Resolve parameters and encode the payload.
///
/// A required parameter without a value fails here, before any substitution.
pub fn prepare_command(command: &ExecutableCommand, user_values: &Map<String, Value>) -> Result<PreparedCommand> {
    let values = resolve_parameter_values(&command.parameters, user_values)?;
    let payload = encode_command_payload(command, &values)?;
    tracing::debug!(
        command = %command.id,
        mode = ?command.mode,
        bytes = payload.bytes.len(),
        "command prepared"
    );
    Ok(PreparedCommand { payload, values })
}

impl ExecutableCommand {
    /// The validation to register after sending, if the command declares one.
    pub fn validation_request(&self, values: &Map<String, Value>) -> Option<ValidationRequest> {
        let validation = self.validation.clone()?;
        let mut request = ValidationRequest::new(validation, self.name.clone()).with_params(values.clone());
        if let Some(script) = &self.scripting.post_response_script {
            request = request.with_transform_script(script.clone());
        }
        if let Some(structure) = &self.message_structure {
            request = request.with_structure(Arc::new(structure.clone()), self.extract_variables.clone());
        }
        for extraction in &self.regex_extractions {
            request = request.with_regex_extraction(extraction.clone());
        }
        Some(request)
    }
}
