//! Build/parse agreement over generated message layouts.

use protoframe_codec::{
    build_structured_message, get_message_structure_size, parse_structured_message, BuildInput, ByteOrder,
    ChecksumAlgorithm, DataType, ElementConfig, ElementSize, FieldValue, MessageElement, MessageStructure,
    NumericValue, ParamValues, ParseOptions,
};
use proptest::prelude::*;
use serde_json::{json, Value};

/// A generated FIELD: its type, the parameter value fed to build, and what parse must return.
type FieldCase = (DataType, Value, NumericValue);

fn arb_field() -> impl Strategy<Value = FieldCase> {
    prop_oneof![
        any::<u8>().prop_map(|v| (DataType::Uint8, json!(v), NumericValue::Unsigned(v.into()))),
        any::<i8>().prop_map(|v| (DataType::Int8, json!(v), NumericValue::Signed(v.into()))),
        any::<u16>().prop_map(|v| (DataType::Uint16, json!(v), NumericValue::Unsigned(v.into()))),
        any::<i16>().prop_map(|v| (DataType::Int16, json!(v), NumericValue::Signed(v.into()))),
        any::<u32>().prop_map(|v| (DataType::Uint32, json!(v), NumericValue::Unsigned(v.into()))),
        any::<i32>().prop_map(|v| (DataType::Int32, json!(v), NumericValue::Signed(v.into()))),
        any::<u64>().prop_map(|v| (DataType::Uint64, json!(v), NumericValue::Unsigned(v))),
        any::<i64>().prop_map(|v| (DataType::Int64, json!(v), NumericValue::Signed(v))),
        (-1.0e6f32..1.0e6f32).prop_map(|v| {
            let v = f64::from(v);
            (DataType::Float32, json!(v), NumericValue::Float(v))
        }),
        (-1.0e12f64..1.0e12f64).prop_map(|v| (DataType::Float64, json!(v), NumericValue::Float(v))),
    ]
}

fn arb_order() -> impl Strategy<Value = ByteOrder> {
    prop_oneof![Just(ByteOrder::BigEndian), Just(ByteOrder::LittleEndian)]
}

fn arb_checksum() -> impl Strategy<Value = Option<ChecksumAlgorithm>> {
    prop::option::of(prop_oneof![
        Just(ChecksumAlgorithm::Mod256),
        Just(ChecksumAlgorithm::Xor),
        Just(ChecksumAlgorithm::Lrc),
        Just(ChecksumAlgorithm::Crc16Modbus),
        Just(ChecksumAlgorithm::Crc16Ccitt),
    ])
}

/// Optional static header, the fields in order, then an optional checksum over everything before it.
fn layout(
    order: ByteOrder,
    header: &[u8],
    fields: &[FieldCase],
    checksum: Option<ChecksumAlgorithm>,
) -> (MessageStructure, ParamValues) {
    let mut elements = Vec::new();
    let mut params = ParamValues::new();

    if !header.is_empty() {
        elements.push(MessageElement::new(
            "hdr",
            "header",
            ElementSize::Fixed(header.len()),
            ElementConfig::Static { value: header.to_vec() },
        ));
    }
    for (i, (data_type, value, _)) in fields.iter().enumerate() {
        let name = format!("field{i}");
        elements.push(MessageElement::new(
            format!("f{i}"),
            name.clone(),
            ElementSize::Computed,
            ElementConfig::Field { data_type: *data_type },
        ));
        params.insert(name, value.clone());
    }
    if let Some(algorithm) = checksum {
        let include_elements = elements.iter().map(|e| e.id.clone()).collect();
        elements.push(MessageElement::new(
            "sum",
            "checksum",
            ElementSize::Computed,
            ElementConfig::Checksum {
                algorithm,
                include_elements,
                byte_order: None,
            },
        ));
    }

    (MessageStructure::new("generated", order, elements), params)
}

proptest! {
    /// Whatever build produces, a strict parse accepts and decodes back to the input values.
    #[test]
    fn parse_recovers_built_fields(
        order in arb_order(),
        header in proptest::collection::vec(any::<u8>(), 0..=3),
        fields in proptest::collection::vec(arb_field(), 0..=6),
        checksum in arb_checksum(),
    ) {
        let (structure, params) = layout(order, &header, &fields, checksum);
        let built = build_structured_message(&structure, &BuildInput::new(&params, &[]))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(get_message_structure_size(&structure), Some(built.data.len()));

        let parsed = parse_structured_message(&built.data, &structure, ParseOptions::strict());
        prop_assert!(parsed.success, "parse failed: {:?}", parsed.error);
        prop_assert_eq!(parsed.elements.len(), structure.elements.len());
        prop_assert_eq!(parsed.checksum_valid, checksum.map(|_| true));

        for (i, (_, _, expected)) in fields.iter().enumerate() {
            let field = parsed.fields.get(&format!("field{i}"));
            prop_assert_eq!(field.map(|f| f.value.clone()), Some(FieldValue::Number(*expected)));
        }
    }

    /// Every supported algorithm catches a single corrupted byte in the covered region.
    #[test]
    fn single_byte_corruption_is_detected(
        order in arb_order(),
        fields in proptest::collection::vec(arb_field(), 1..=6),
        algorithm in arb_checksum().prop_filter("needs a checksum", Option::is_some),
        position in any::<prop::sample::Index>(),
        mask in 1u8..=255u8,
    ) {
        let (structure, params) = layout(order, &[], &fields, algorithm);
        let mut data = build_structured_message(&structure, &BuildInput::new(&params, &[]))
            .map_err(|e| TestCaseError::fail(e.to_string()))?
            .data;

        let covered: usize = fields.iter().map(|(dt, _, _)| dt.width()).sum();
        data[position.index(covered)] ^= mask;

        let lenient = parse_structured_message(&data, &structure, ParseOptions::default());
        prop_assert!(lenient.success);
        prop_assert_eq!(lenient.checksum_valid, Some(false));

        let strict = parse_structured_message(&data, &structure, ParseOptions::strict());
        prop_assert!(!strict.success);
    }
}
