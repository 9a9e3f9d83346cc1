use std::collections::HashMap;
use std::ops::Range;

use crate::checksum::checksum_bytes;
use crate::error::{CodecError, Result};
use crate::numeric::{decode_numeric, read_uint, NumericValue};
use crate::structure::{
    ElementConfig, FieldValue, MessageElement, MessageStructure, ParseResult,
    ParsedElement, ParsedField,
};
use crate::text::format_hex;

/// Parse behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Treat STATIC and CHECKSUM mismatches as fatal.
    pub strict: bool,
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

/// Total encoded size when every element is statically sized, otherwise `None`.
pub fn get_message_structure_size(structure: &MessageStructure) -> Option<usize> {
    structure.elements.iter().map(MessageElement::static_size).sum()
}

/// Decode `data` against `structure`.
///
/// Never fails outright: problems are reported through `success`/`error` on the
/// result, together with whatever elements were decoded before the failure.
pub fn parse_structured_message(
    data: &[u8],
    structure: &MessageStructure,
    options: ParseOptions,
) -> ParseResult {
    let sizes = match resolve_sizes(data.len(), structure) {
        Ok(sizes) => sizes,
        Err(err) => {
            tracing::debug!(structure = %structure.id, len = data.len(), error = %err, "parse rejected");
            return ParseResult::failed(err.to_string());
        }
    };

    let mut result = ParseResult::default();
    match decode_elements(data, structure, &sizes, options, &mut result) {
        Ok(()) => result.success = true,
        Err(err) => {
            tracing::debug!(structure = %structure.id, error = %err, "parse failed");
            result.success = false;
            result.error = Some(err.to_string());
        }
    }
    result
}

/// Concrete size of every element for a buffer of `len` bytes.
///
/// The single unsized element (if any) absorbs what the sized elements leave over.
fn resolve_sizes(len: usize, structure: &MessageStructure) -> Result<Vec<usize>> {
    let declared: Vec<Option<usize>> = structure
        .elements
        .iter()
        .map(MessageElement::static_size)
        .collect();

    let unsized_count = declared.iter().filter(|s| s.is_none()).count();
    if unsized_count > 1 {
        return Err(CodecError::InvalidStructure(format!(
            "{unsized_count} elements have no fixed size; at most one is allowed"
        )));
    }

    let fixed: usize = declared.iter().flatten().sum();
    if len < fixed {
        return Err(CodecError::InsufficientData {
            needed: fixed,
            available: len,
        });
    }
    let remainder = len - fixed;
    Ok(declared.into_iter().map(|s| s.unwrap_or(remainder)).collect())
}

fn decode_elements(
    data: &[u8],
    structure: &MessageStructure,
    sizes: &[usize],
    options: ParseOptions,
    result: &mut ParseResult,
) -> Result<()> {
    let order = structure.byte_order;
    let mut consumed: HashMap<&str, Range<usize>> = HashMap::new();
    let mut offset = 0;

    for (element, &size) in structure.elements.iter().zip(sizes) {
        let range = offset..offset + size;
        let bytes = &data[range.clone()];

        match &element.config {
            ElementConfig::Static { value } => {
                let mut expected = value.clone();
                expected.resize(size, 0);
                if expected != bytes {
                    tracing::debug!(element = %element.id, "static bytes differ");
                    if options.strict {
                        push_element(result, element, &range, bytes);
                        return Err(CodecError::StaticMismatch {
                            element: element.id.clone(),
                            expected: format_hex(&expected),
                            actual: format_hex(bytes),
                        });
                    }
                }
            }
            ElementConfig::Field { .. } | ElementConfig::Address { .. } => {
                let data_type = element.config.data_type();
                if let Some(value) = data_type.and_then(|dt| decode_numeric(bytes, dt, order)) {
                    result.fields.insert(
                        element.name.clone(),
                        ParsedField {
                            value: FieldValue::Number(value),
                            data_type,
                        },
                    );
                }
            }
            ElementConfig::Length { .. } => {
                // Declared lengths are reported, not cross-checked against the buffer.
                result.fields.insert(
                    element.name.clone(),
                    ParsedField {
                        value: FieldValue::Number(NumericValue::Unsigned(read_uint(bytes, order))),
                        data_type: None,
                    },
                );
            }
            ElementConfig::Checksum {
                algorithm,
                include_elements,
                byte_order,
            } => {
                let mut covered = Vec::new();
                for target in include_elements {
                    let source = consumed.get(target.as_str()).cloned().ok_or_else(|| {
                        if structure.element(target).is_some() {
                            CodecError::ForwardReference {
                                element: element.id.clone(),
                                target: target.clone(),
                            }
                        } else {
                            CodecError::UnknownElement(target.clone())
                        }
                    })?;
                    covered.extend_from_slice(&data[source]);
                }

                let effective = byte_order.unwrap_or_else(|| algorithm.default_byte_order());
                let expected = checksum_bytes(*algorithm, &covered, Some(size), Some(effective));
                let valid = expected == bytes;
                let stored = read_uint(bytes, effective);
                result.checksum_valid = Some(result.checksum_valid.unwrap_or(true) && valid);
                result.fields.insert(
                    element.name.clone(),
                    ParsedField {
                        value: FieldValue::Number(NumericValue::Unsigned(stored)),
                        data_type: None,
                    },
                );

                if !valid {
                    tracing::debug!(
                        element = %element.id,
                        algorithm = algorithm.name(),
                        expected = %format_hex(&expected),
                        actual = %format_hex(bytes),
                        "checksum mismatch"
                    );
                    if options.strict {
                        push_element(result, element, &range, bytes);
                        return Err(CodecError::ChecksumInvalid {
                            element: element.id.clone(),
                            expected: read_uint(&expected, effective),
                            actual: stored,
                        });
                    }
                }
            }
            ElementConfig::Payload => {
                result.fields.insert(
                    element.name.clone(),
                    ParsedField {
                        value: FieldValue::Bytes(bytes.to_vec()),
                        data_type: None,
                    },
                );
                result.payload = Some(bytes.to_vec());
            }
            ElementConfig::Padding { .. } | ElementConfig::Reserved { .. } => {}
        }

        push_element(result, element, &range, bytes);
        consumed.insert(element.id.as_str(), range);
        offset += size;
    }

    if offset < data.len() {
        tracing::trace!(structure = %structure.id, trailing = data.len() - offset, "ignoring trailing bytes");
    }
    Ok(())
}

fn push_element(result: &mut ParseResult, element: &MessageElement, range: &Range<usize>, bytes: &[u8]) {
    result.elements.push(ParsedElement {
        id: element.id.clone(),
        name: element.name.clone(),
        offset: range.start,
        size: range.len(),
        bytes: bytes.to_vec(),
    });
}
