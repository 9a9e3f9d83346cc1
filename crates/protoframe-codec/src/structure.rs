//! Declarative message structures.
//!
//! A [`MessageStructure`] is an ordered list of [`MessageElement`]s. Structures are
//! authored once per protocol and never mutated at runtime; they are replaced wholesale.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::checksum::ChecksumAlgorithm;
use crate::numeric::{ByteOrder, DataType, NumericValue};

/// Declared size of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SizeRepr", into = "SizeRepr")]
pub enum ElementSize {
    /// Exactly this many bytes.
    Fixed(usize),
    /// Whatever remains between fixed-size neighbours (payload).
    Variable,
    /// Derived from the element configuration (data type width, checksum algorithm).
    Computed,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SizeRepr {
    Fixed(usize),
    Keyword(SizeKeyword),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum SizeKeyword {
    Variable,
    Computed,
}

impl From<SizeRepr> for ElementSize {
    fn from(repr: SizeRepr) -> Self {
        match repr {
            SizeRepr::Fixed(n) => Self::Fixed(n),
            SizeRepr::Keyword(SizeKeyword::Variable) => Self::Variable,
            SizeRepr::Keyword(SizeKeyword::Computed) => Self::Computed,
        }
    }
}

impl From<ElementSize> for SizeRepr {
    fn from(size: ElementSize) -> Self {
        match size {
            ElementSize::Fixed(n) => Self::Fixed(n),
            ElementSize::Variable => Self::Keyword(SizeKeyword::Variable),
            ElementSize::Computed => Self::Keyword(SizeKeyword::Computed),
        }
    }
}

/// Kind-specific configuration of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementConfig {
    /// Fixed bytes written verbatim and checked on parse.
    Static { value: Vec<u8> },
    /// Numeric value bound to a parameter.
    #[serde(rename_all = "camelCase")]
    Field { data_type: DataType },
    /// Device address; a FIELD defaulting to UINT8.
    #[serde(rename_all = "camelCase")]
    Address {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data_type: Option<DataType>,
    },
    /// Sum of the encoded sizes of `include_elements` plus `adjustment`.
    #[serde(rename_all = "camelCase")]
    Length {
        include_elements: Vec<String>,
        #[serde(default)]
        adjustment: i64,
    },
    /// Checksum over the concatenated bytes of `include_elements`.
    #[serde(rename_all = "camelCase")]
    Checksum {
        algorithm: ChecksumAlgorithm,
        include_elements: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        byte_order: Option<ByteOrder>,
    },
    /// Filler bytes.
    #[serde(rename_all = "camelCase")]
    Padding {
        #[serde(default)]
        fill_byte: u8,
    },
    /// Reserved bytes, zero unless a fill byte is given.
    #[serde(rename_all = "camelCase")]
    Reserved {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fill_byte: Option<u8>,
    },
    /// Opaque payload region.
    Payload,
}

impl ElementConfig {
    /// Short kind name, as it appears in protocol documents.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Static { .. } => "STATIC",
            Self::Field { .. } => "FIELD",
            Self::Address { .. } => "ADDRESS",
            Self::Length { .. } => "LENGTH",
            Self::Checksum { .. } => "CHECKSUM",
            Self::Padding { .. } => "PADDING",
            Self::Reserved { .. } => "RESERVED",
            Self::Payload => "PAYLOAD",
        }
    }

    /// Numeric data type for FIELD/ADDRESS elements.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Field { data_type } => Some(*data_type),
            Self::Address { data_type } => Some(data_type.unwrap_or(DataType::Uint8)),
            _ => None,
        }
    }
}

/// One declared unit of a structured message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageElement {
    pub id: String,
    pub name: String,
    pub size: ElementSize,
    pub config: ElementConfig,
}

impl MessageElement {
    pub fn new(id: impl Into<String>, name: impl Into<String>, size: ElementSize, config: ElementConfig) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size,
            config,
        }
    }

    /// Encoded size if it is known without looking at runtime data.
    ///
    /// FIELD/ADDRESS always take their data type width; CHECKSUM falls back to the
    /// algorithm width and STATIC to its value length when the size is not fixed.
    pub fn static_size(&self) -> Option<usize> {
        if let Some(data_type) = self.config.data_type() {
            return Some(data_type.width());
        }
        match (self.size, &self.config) {
            (ElementSize::Fixed(n), _) => Some(n),
            (_, ElementConfig::Static { value }) => Some(value.len()),
            (_, ElementConfig::Checksum { algorithm, .. }) => Some(algorithm.default_size()),
            _ => None,
        }
    }
}

/// A complete message layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStructure {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub byte_order: ByteOrder,
    /// Text encoding of the payload region, informational for viewers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    pub elements: Vec<MessageElement>,
}

impl MessageStructure {
    pub fn new(id: impl Into<String>, byte_order: ByteOrder, elements: Vec<MessageElement>) -> Self {
        Self {
            id: id.into(),
            name: None,
            byte_order,
            encoding: None,
            elements,
        }
    }

    pub fn element(&self, id: &str) -> Option<&MessageElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Sum of all statically sized elements; the smallest valid message.
    pub fn min_size(&self) -> usize {
        self.elements.iter().filter_map(MessageElement::static_size).sum()
    }
}

/// Maps a runtime parameter onto a FIELD/ADDRESS element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementBinding {
    pub element_id: String,
    pub parameter_name: String,
    /// Expression over `value`, evaluated before encoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

impl ElementBinding {
    pub fn new(element_id: impl Into<String>, parameter_name: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            parameter_name: parameter_name.into(),
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: impl Into<String>) -> Self {
        self.transform = Some(transform.into());
        self
    }
}

/// Position of an element inside an encoded or decoded buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementLayout {
    pub id: String,
    pub name: String,
    pub offset: usize,
    pub size: usize,
}

/// Output of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltMessage {
    pub data: Vec<u8>,
    pub elements: Vec<ElementLayout>,
}

/// A decoded element with its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedElement {
    pub id: String,
    pub name: String,
    pub offset: usize,
    pub size: usize,
    pub bytes: Vec<u8>,
}

/// Decoded value of a named field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(NumericValue),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n.as_f64()),
            Self::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Number(_) => None,
        }
    }

    /// JSON view used by extraction and the CLI.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Number(NumericValue::Unsigned(v)) => serde_json::Value::from(*v),
            Self::Number(NumericValue::Signed(v)) => serde_json::Value::from(*v),
            Self::Number(NumericValue::Float(v)) => serde_json::Value::from(*v),
            Self::Bytes(b) => serde_json::Value::from(b.clone()),
        }
    }
}

/// A decoded field together with its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedField {
    pub value: FieldValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
}

/// Result of parsing a buffer against a structure. Produced fresh per call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elements: Vec<ParsedElement>,
    pub fields: BTreeMap<String, ParsedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
}

impl ParseResult {
    pub(crate) fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Numeric value of a field by name.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(|f| f.value.as_f64())
    }
}
