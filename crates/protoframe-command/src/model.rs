//! Command, protocol and layer documents.
//!
//! These mirror the JSON a protocol editor or store produces: camelCase fields,
//! SCREAMING_SNAKE_CASE enum tags, and optional fields left out when empty.

use std::collections::BTreeMap;

use protoframe_codec::{ChecksumAlgorithm, ElementBinding, MessageStructure};
use protoframe_frame::FramingConfig;
use protoframe_validate::{CommandValidation, RegexExtraction, ResponsePattern};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a command parameter; controls formatting on substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A parameter definition as authored in a protocol or custom command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandParameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<EnumOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CommandParameter {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            label: None,
            param_type,
            required: false,
            default_value: None,
            min: None,
            max: None,
            options: Vec::new(),
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_options<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = values
            .into_iter()
            .map(|value| EnumOption {
                value: value.into(),
                label: None,
            })
            .collect();
        self
    }
}

/// How the payload template is turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadMode {
    #[default]
    Text,
    Hex,
    Structured,
}

/// Terminator appended to TEXT payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineEnding {
    #[default]
    None,
    Lf,
    Cr,
    Crlf,
}

impl LineEnding {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::None => b"",
            Self::Lf => b"\n",
            Self::Cr => b"\r",
            Self::Crlf => b"\r\n",
        }
    }
}

/// Pre-request and post-response hook scripts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scripting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_request_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_response_script: Option<String>,
}

impl Scripting {
    pub fn is_empty(&self) -> bool {
        self.pre_request_script.is_none() && self.post_response_script.is_none()
    }
}

/// A command template inside a protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandTemplate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub mode: PayloadMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default)]
    pub line_ending: LineEnding,
    #[serde(default)]
    pub parameters: Vec<CommandParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<CommandValidation>,
    #[serde(default)]
    pub extract_variables: Vec<ResponsePattern>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regex_extractions: Vec<RegexExtraction>,
    #[serde(default, skip_serializing_if = "Scripting::is_empty")]
    pub scripting: Scripting,
    /// Command-specific framing; falls back to the protocol framing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framing: Option<FramingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_structure_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<ElementBinding>,
    /// Milliseconds since epoch of the last template edit.
    pub updated_at: u64,
}

/// A device protocol: shared framing, message structures and command templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framing: Option<FramingConfig>,
    #[serde(default)]
    pub message_structures: Vec<MessageStructure>,
    #[serde(default)]
    pub commands: Vec<CommandTemplate>,
}

impl Protocol {
    pub fn command(&self, id: &str) -> Option<&CommandTemplate> {
        self.commands.iter().find(|c| c.id == id)
    }

    pub fn structure(&self, id: &str) -> Option<&MessageStructure> {
        self.message_structures.iter().find(|s| s.id == id)
    }
}

/// L1: the synced copy of a protocol command template.
///
/// Replaced wholesale on sync, never edited by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolLayer {
    pub protocol_id: String,
    pub protocol_name: String,
    pub protocol_version: String,
    pub protocol_command_id: String,
    pub protocol_command_updated_at: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub payload: String,
    pub mode: PayloadMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default)]
    pub line_ending: LineEnding,
    #[serde(default)]
    pub parameters: Vec<CommandParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<CommandValidation>,
    #[serde(default)]
    pub extract_variables: Vec<ResponsePattern>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regex_extractions: Vec<RegexExtraction>,
    /// Protocol-authored hooks; run before the user's.
    #[serde(default, skip_serializing_if = "Scripting::is_empty")]
    pub scripting: Scripting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_framing: Option<FramingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_structure: Option<MessageStructure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<ElementBinding>,
}

impl ProtocolLayer {
    /// Snapshot `template` of `protocol`.
    ///
    /// The template's framing wins over the protocol framing, and its message
    /// structure is copied so the layer stays usable if the protocol changes.
    pub fn from_template(protocol: &Protocol, template: &CommandTemplate) -> Self {
        let message_structure = template
            .message_structure_id
            .as_deref()
            .and_then(|id| protocol.structure(id))
            .cloned();
        Self {
            protocol_id: protocol.id.clone(),
            protocol_name: protocol.name.clone(),
            protocol_version: protocol.version.clone(),
            protocol_command_id: template.id.clone(),
            protocol_command_updated_at: template.updated_at,
            name: template.name.clone(),
            description: template.description.clone(),
            payload: template.payload.clone(),
            mode: template.mode,
            encoding: template.encoding.clone(),
            line_ending: template.line_ending,
            parameters: template.parameters.clone(),
            validation: template.validation.clone(),
            extract_variables: template.extract_variables.clone(),
            regex_extractions: template.regex_extractions.clone(),
            scripting: template.scripting.clone(),
            default_framing: template.framing.clone().or_else(|| protocol.framing.clone()),
            message_structure,
            bindings: template.bindings.clone(),
        }
    }
}

/// How a parameter value reaches the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterApplication {
    /// Replace `{name}` tokens in the payload template.
    #[default]
    Substitute,
    /// Encode into a structure element (STRUCTURED commands).
    #[serde(rename_all = "camelCase")]
    Element {
        element_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transform: Option<String>,
    },
}

/// User tweaks to one protocol parameter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterEnhancement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<ParameterApplication>,
}

/// L2: user customizations. Never touched by a protocol sync.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_description: Option<String>,
    /// Keyed by parameter name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameter_enhancements: BTreeMap<String, ParameterEnhancement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_extractions: Vec<ResponsePattern>,
    /// User hooks; run after the protocol's.
    #[serde(default, skip_serializing_if = "Scripting::is_empty")]
    pub scripting: Scripting,
    /// Validation timeout in milliseconds. Has no effect when the protocol
    /// template declares no validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_override: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framing_override: Option<FramingConfig>,
    /// Replaces the algorithm of every CHECKSUM element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_override: Option<ChecksumAlgorithm>,
}

/// Flat fields of a user-authored command.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomCommand {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub mode: PayloadMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default)]
    pub line_ending: LineEnding,
    #[serde(default)]
    pub parameters: Vec<CommandParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<CommandValidation>,
    #[serde(default)]
    pub extract_variables: Vec<ResponsePattern>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regex_extractions: Vec<RegexExtraction>,
    #[serde(default, skip_serializing_if = "Scripting::is_empty")]
    pub scripting: Scripting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framing: Option<FramingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_structure: Option<MessageStructure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<ElementBinding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandSource {
    Custom,
    Protocol,
}

/// Where a saved command's definition comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandDefinition {
    Custom(CustomCommand),
    #[serde(rename_all = "camelCase")]
    Protocol { protocol_layer: ProtocolLayer },
}

/// A command as stored by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCommand {
    pub id: String,
    #[serde(flatten)]
    pub definition: CommandDefinition,
    #[serde(default)]
    pub command_layer: CommandLayer,
}

impl SavedCommand {
    pub fn custom(id: impl Into<String>, command: CustomCommand) -> Self {
        Self {
            id: id.into(),
            definition: CommandDefinition::Custom(command),
            command_layer: CommandLayer::default(),
        }
    }

    /// Instantiate a protocol command template.
    pub fn from_protocol(id: impl Into<String>, protocol: &Protocol, template: &CommandTemplate) -> Self {
        Self {
            id: id.into(),
            definition: CommandDefinition::Protocol {
                protocol_layer: ProtocolLayer::from_template(protocol, template),
            },
            command_layer: CommandLayer::default(),
        }
    }

    pub fn source(&self) -> CommandSource {
        match self.definition {
            CommandDefinition::Custom(_) => CommandSource::Custom,
            CommandDefinition::Protocol { .. } => CommandSource::Protocol,
        }
    }

    pub fn protocol_layer(&self) -> Option<&ProtocolLayer> {
        match &self.definition {
            CommandDefinition::Protocol { protocol_layer } => Some(protocol_layer),
            CommandDefinition::Custom(_) => None,
        }
    }
}

/// The merged, ready-to-send view of a [`SavedCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutableCommand {
    pub id: String,
    pub source: CommandSource,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub payload: String,
    pub mode: PayloadMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    pub line_ending: LineEnding,
    pub parameters: Vec<CommandParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<CommandValidation>,
    pub extract_variables: Vec<ResponsePattern>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regex_extractions: Vec<RegexExtraction>,
    #[serde(default, skip_serializing_if = "Scripting::is_empty")]
    pub scripting: Scripting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framing: Option<FramingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_structure: Option<MessageStructure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<ElementBinding>,
}
