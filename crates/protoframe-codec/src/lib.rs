//! Declarative structured message codec for protoframe.
//!
//! A [`MessageStructure`] describes a binary message as an ordered list of
//! elements (static bytes, numeric fields, lengths, checksums, payload).
//! The same description drives both directions:
//! - [`build_structured_message`] encodes parameter values into bytes
//! - [`parse_structured_message`] decodes bytes back into named fields
//!
//! Checksums and numerics are pure functions, so build and parse agree bit-for-bit.

pub mod checksum;
pub mod decode;
pub mod encode;
pub mod error;
pub mod expression;
pub mod lint;
pub mod numeric;
pub mod structure;
pub mod text;

pub use checksum::{checksum_bytes, ChecksumAlgorithm};
pub use decode::{get_message_structure_size, parse_structured_message, ParseOptions};
pub use encode::{build_structured_message, json_to_numeric, BuildInput, ParamValues};
pub use error::{CodecError, Result};
pub use lint::{validate_structure, StructureIssue};
pub use numeric::{decode_numeric, encode_numeric, ByteOrder, DataType, Numeric, NumericValue};
pub use structure::{
    BuiltMessage, ElementBinding, ElementConfig, ElementLayout, ElementSize, FieldValue,
    MessageElement, MessageStructure, ParseResult, ParsedElement, ParsedField,
};
