use protoframe_codec::text::parse_hex;
use protoframe_codec::{parse_structured_message, MessageStructure, ParseOptions};

use crate::cmd::{load_json, ParseArgs};
use crate::exit::{codec_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_record, OutputFormat};

pub fn run(args: ParseArgs, format: OutputFormat) -> CliResult<i32> {
    let structure: MessageStructure = load_json(&args.structure)?;
    let data = parse_hex(&args.hex).map_err(|err| codec_error("invalid hex input", err))?;
    let options = if args.strict { ParseOptions::strict() } else { ParseOptions::default() };

    let result = parse_structured_message(&data, &structure, options);

    let fields: Vec<(String, String)> = result
        .fields
        .iter()
        .map(|(name, field)| (name.clone(), field.value.to_json().to_string()))
        .collect();
    let mut rows = vec![("success", result.success.to_string())];
    if let Some(error) = &result.error {
        rows.push(("error", error.clone()));
    }
    if let Some(valid) = result.checksum_valid {
        rows.push(("checksumValid", valid.to_string()));
    }
    for (name, value) in &fields {
        rows.push((name.as_str(), value.clone()));
    }
    print_record(&result, &rows, result.payload.as_deref().unwrap_or_default(), format);

    if result.success && result.checksum_valid != Some(false) {
        Ok(SUCCESS)
    } else {
        Ok(DATA_INVALID)
    }
}
