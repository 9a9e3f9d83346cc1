use std::collections::HashMap;
use std::ops::Range;

use bytes::{BufMut, BytesMut};
use serde_json::Value;

use crate::checksum::checksum_bytes;
use crate::error::{CodecError, Result};
use crate::expression::apply_transform;
use crate::numeric::{encode_numeric, encode_uint, Numeric};
use crate::structure::{
    BuiltMessage, ElementBinding, ElementConfig, ElementLayout, ElementSize, MessageElement,
    MessageStructure,
};

/// Parameter values keyed by parameter name.
pub type ParamValues = serde_json::Map<String, Value>;

/// Inputs to [`build_structured_message`].
#[derive(Debug, Clone, Copy)]
pub struct BuildInput<'a> {
    pub params: &'a ParamValues,
    pub bindings: &'a [ElementBinding],
    pub payload: Option<&'a [u8]>,
}

impl<'a> BuildInput<'a> {
    pub fn new(params: &'a ParamValues, bindings: &'a [ElementBinding]) -> Self {
        Self {
            params,
            bindings,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: &'a [u8]) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Encode a message by walking `structure` in declaration order.
///
/// LENGTH and CHECKSUM elements may only reference elements that precede them.
pub fn build_structured_message(
    structure: &MessageStructure,
    input: &BuildInput<'_>,
) -> Result<BuiltMessage> {
    let order = structure.byte_order;
    let mut out = BytesMut::with_capacity(structure.min_size());
    let mut encoded: HashMap<&str, Range<usize>> = HashMap::new();
    let mut layout = Vec::with_capacity(structure.elements.len());

    for element in &structure.elements {
        let start = out.len();
        match &element.config {
            ElementConfig::Static { value } => {
                let size = match element.size {
                    ElementSize::Fixed(n) => n,
                    _ => value.len(),
                };
                put_resized(&mut out, value, size, 0);
            }
            ElementConfig::Field { .. } | ElementConfig::Address { .. } => {
                let data_type = element
                    .config
                    .data_type()
                    .ok_or_else(|| CodecError::InvalidStructure(element.id.clone()))?;
                let value = resolve_field_value(element, input)?;
                out.put_slice(&encode_numeric(value, data_type, order));
            }
            ElementConfig::Length {
                include_elements,
                adjustment,
            } => {
                let size = fixed_size(element)?;
                let mut total: i64 = 0;
                for target in include_elements {
                    total += lookup(structure, element, &encoded, target)?.len() as i64;
                }
                // Negative adjustments wrap rather than fail.
                let value = total.wrapping_add(*adjustment) as u64;
                out.put_slice(&encode_uint(value, size, order));
            }
            ElementConfig::Checksum {
                algorithm,
                include_elements,
                byte_order,
            } => {
                let mut covered = Vec::new();
                for target in include_elements {
                    let range = lookup(structure, element, &encoded, target)?;
                    covered.extend_from_slice(&out[range]);
                }
                let size = match element.size {
                    ElementSize::Fixed(n) => Some(n),
                    _ => None,
                };
                out.put_slice(&checksum_bytes(*algorithm, &covered, size, *byte_order));
            }
            ElementConfig::Padding { fill_byte } => {
                out.put_bytes(*fill_byte, fixed_size(element)?);
            }
            ElementConfig::Reserved { fill_byte } => {
                out.put_bytes(fill_byte.unwrap_or(0), fixed_size(element)?);
            }
            ElementConfig::Payload => {
                let payload = input.payload.unwrap_or_default();
                match element.size {
                    ElementSize::Fixed(n) => put_resized(&mut out, payload, n, 0),
                    _ => out.put_slice(payload),
                }
            }
        }

        let end = out.len();
        tracing::trace!(element = %element.id, offset = start, size = end - start, "encoded element");
        encoded.insert(element.id.as_str(), start..end);
        layout.push(ElementLayout {
            id: element.id.clone(),
            name: element.name.clone(),
            offset: start,
            size: end - start,
        });
    }

    Ok(BuiltMessage {
        data: out.to_vec(),
        elements: layout,
    })
}

/// Resolve the numeric value for a FIELD/ADDRESS element.
///
/// The element's binding names the parameter; unbound elements fall back to a
/// parameter matching the element name, then the element id.
fn resolve_field_value(element: &MessageElement, input: &BuildInput<'_>) -> Result<Numeric> {
    let binding = input.bindings.iter().find(|b| b.element_id == element.id);
    let (name, value) = match binding {
        Some(binding) => (
            binding.parameter_name.as_str(),
            input.params.get(&binding.parameter_name),
        ),
        None => match input.params.get(&element.name) {
            Some(value) => (element.name.as_str(), Some(value)),
            None => (element.id.as_str(), input.params.get(&element.id)),
        },
    };
    let value = value.ok_or_else(|| CodecError::MissingParameter(name.to_string()))?;
    let numeric = json_to_numeric(name, value)?;

    match binding.and_then(|b| b.transform.as_deref()) {
        Some(expression) if !expression.trim().is_empty() => {
            Ok(Numeric::Float(apply_transform(expression, numeric.as_f64())?))
        }
        _ => Ok(numeric),
    }
}

/// Interpret a JSON parameter value as a number.
///
/// Strings accept decimal, `0x` hex and float notation; booleans map to 1/0.
pub fn json_to_numeric(name: &str, value: &Value) -> Result<Numeric> {
    let not_numeric = || CodecError::NotNumeric {
        name: name.to_string(),
        value: value.to_string(),
    };
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Numeric::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Numeric::from(u))
            } else {
                n.as_f64().map(Numeric::Float).ok_or_else(not_numeric)
            }
        }
        Value::Bool(b) => Ok(Numeric::Integer(i128::from(*b))),
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                return i128::from_str_radix(hex, 16)
                    .map(Numeric::Integer)
                    .map_err(|_| not_numeric());
            }
            if let Ok(i) = s.parse::<i128>() {
                return Ok(Numeric::Integer(i));
            }
            s.parse::<f64>().map(Numeric::Float).map_err(|_| not_numeric())
        }
        _ => Err(not_numeric()),
    }
}

fn fixed_size(element: &MessageElement) -> Result<usize> {
    match element.size {
        ElementSize::Fixed(n) => Ok(n),
        _ => Err(CodecError::InvalidStructure(format!(
            "{} element '{}' needs a fixed size",
            element.config.kind(),
            element.id
        ))),
    }
}

fn lookup(
    structure: &MessageStructure,
    element: &MessageElement,
    encoded: &HashMap<&str, Range<usize>>,
    target: &str,
) -> Result<Range<usize>> {
    if let Some(range) = encoded.get(target) {
        return Ok(range.clone());
    }
    if structure.element(target).is_some() {
        Err(CodecError::ForwardReference {
            element: element.id.clone(),
            target: target.to_string(),
        })
    } else {
        Err(CodecError::UnknownElement(target.to_string()))
    }
}

fn put_resized(out: &mut BytesMut, value: &[u8], size: usize, fill: u8) {
    let take = value.len().min(size);
    out.put_slice(&value[..take]);
    out.put_bytes(fill, size - take);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::checksum::ChecksumAlgorithm;
    use crate::numeric::{ByteOrder, DataType};

    fn params(value: Value) -> ParamValues {
        value.as_object().cloned().unwrap_or_default()
    }

    fn modbus_read() -> MessageStructure {
        MessageStructure::new(
            "modbus-read",
            ByteOrder::BigEndian,
            vec![
                MessageElement::new("addr", "address", ElementSize::Fixed(1), ElementConfig::Address { data_type: None }),
                MessageElement::new("fn", "function", ElementSize::Fixed(1), ElementConfig::Static { value: vec![0x03] }),
                MessageElement::new("start", "start", ElementSize::Fixed(2), ElementConfig::Field { data_type: DataType::Uint16 }),
                MessageElement::new("count", "count", ElementSize::Fixed(2), ElementConfig::Field { data_type: DataType::Uint16 }),
                MessageElement::new(
                    "crc",
                    "crc",
                    ElementSize::Computed,
                    ElementConfig::Checksum {
                        algorithm: ChecksumAlgorithm::Crc16Modbus,
                        include_elements: vec!["addr".into(), "fn".into(), "start".into(), "count".into()],
                        byte_order: None,
                    },
                ),
            ],
        )
    }

    #[test]
    fn builds_modbus_read_holding_registers() {
        let structure = modbus_read();
        let values = params(json!({ "slave": 1, "start": 0, "count": 10 }));
        let bindings = vec![ElementBinding::new("addr", "slave")];

        let built = build_structured_message(&structure, &BuildInput::new(&values, &bindings)).unwrap();

        assert_eq!(built.data, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD]);
        assert_eq!(built.elements.len(), 5);
        assert_eq!(built.elements[4].offset, 6);
        assert_eq!(built.elements[4].size, 2);
    }

    #[test]
    fn length_counts_preceding_elements_with_adjustment() {
        let structure = MessageStructure::new(
            "len",
            ByteOrder::BigEndian,
            vec![
                MessageElement::new("hdr", "hdr", ElementSize::Fixed(2), ElementConfig::Static { value: vec![0xAA, 0x55] }),
                MessageElement::new("body", "body", ElementSize::Variable, ElementConfig::Payload),
                MessageElement::new(
                    "len",
                    "len",
                    ElementSize::Fixed(2),
                    ElementConfig::Length {
                        include_elements: vec!["hdr".into(), "body".into()],
                        adjustment: 1,
                    },
                ),
            ],
        );
        let values = ParamValues::new();
        let built = build_structured_message(
            &structure,
            &BuildInput::new(&values, &[]).with_payload(b"abc"),
        )
        .unwrap();
        assert_eq!(built.data, vec![0xAA, 0x55, b'a', b'b', b'c', 0x00, 0x06]);
    }

    #[test]
    fn forward_reference_is_a_configuration_error() {
        let structure = MessageStructure::new(
            "fwd",
            ByteOrder::BigEndian,
            vec![
                MessageElement::new(
                    "sum",
                    "sum",
                    ElementSize::Computed,
                    ElementConfig::Checksum {
                        algorithm: ChecksumAlgorithm::Xor,
                        include_elements: vec!["later".into()],
                        byte_order: None,
                    },
                ),
                MessageElement::new("later", "later", ElementSize::Fixed(1), ElementConfig::Static { value: vec![1] }),
            ],
        );
        let values = ParamValues::new();
        let err = build_structured_message(&structure, &BuildInput::new(&values, &[])).unwrap_err();
        assert!(matches!(err, CodecError::ForwardReference { .. }));
    }

    #[test]
    fn unknown_reference_is_reported() {
        let structure = MessageStructure::new(
            "unknown",
            ByteOrder::BigEndian,
            vec![MessageElement::new(
                "len",
                "len",
                ElementSize::Fixed(1),
                ElementConfig::Length {
                    include_elements: vec!["ghost".into()],
                    adjustment: 0,
                },
            )],
        );
        let values = ParamValues::new();
        let err = build_structured_message(&structure, &BuildInput::new(&values, &[])).unwrap_err();
        assert_eq!(err, CodecError::UnknownElement("ghost".into()));
    }

    #[test]
    fn missing_parameter_fails() {
        let structure = modbus_read();
        let values = params(json!({ "start": 0 }));
        let err = build_structured_message(&structure, &BuildInput::new(&values, &[])).unwrap_err();
        assert!(matches!(err, CodecError::MissingParameter(_)));
    }

    #[test]
    fn binding_transform_runs_before_encoding() {
        let structure = MessageStructure::new(
            "temp",
            ByteOrder::LittleEndian,
            vec![MessageElement::new(
                "t",
                "setpoint",
                ElementSize::Fixed(2),
                ElementConfig::Field { data_type: DataType::Int16 },
            )],
        );
        let values = params(json!({ "celsius": 21.5 }));
        let bindings = vec![ElementBinding::new("t", "celsius").with_transform("value * 10")];
        let built = build_structured_message(&structure, &BuildInput::new(&values, &bindings)).unwrap();
        assert_eq!(built.data, vec![0xD7, 0x00]);
    }

    #[test]
    fn padding_and_reserved_fill() {
        let structure = MessageStructure::new(
            "fill",
            ByteOrder::BigEndian,
            vec![
                MessageElement::new("p", "p", ElementSize::Fixed(2), ElementConfig::Padding { fill_byte: 0xFF }),
                MessageElement::new("r", "r", ElementSize::Fixed(1), ElementConfig::Reserved { fill_byte: None }),
            ],
        );
        let values = ParamValues::new();
        let built = build_structured_message(&structure, &BuildInput::new(&values, &[])).unwrap();
        assert_eq!(built.data, vec![0xFF, 0xFF, 0x00]);
    }

    #[test]
    fn string_parameters_are_numeric() {
        assert_eq!(json_to_numeric("x", &json!("0x1F")).unwrap(), Numeric::Integer(31));
        assert_eq!(json_to_numeric("x", &json!(" 42 ")).unwrap(), Numeric::Integer(42));
        assert_eq!(json_to_numeric("x", &json!("1.5")).unwrap(), Numeric::Float(1.5));
        assert_eq!(json_to_numeric("x", &json!(true)).unwrap(), Numeric::Integer(1));
        assert!(json_to_numeric("x", &json!("abc")).is_err());
        assert!(json_to_numeric("x", &json!(null)).is_err());
    }
}
