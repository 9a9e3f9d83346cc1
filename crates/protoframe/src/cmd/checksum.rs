use protoframe_codec::text::{format_hex, parse_hex};
use protoframe_codec::{checksum_bytes, ByteOrder, ChecksumAlgorithm};
use serde::Serialize;

use crate::cmd::ChecksumArgs;
use crate::exit::{codec_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_record, schema_id, OutputFormat};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChecksumOutput {
    schema_id: String,
    algorithm: &'static str,
    value: u64,
    hex: String,
}

pub fn run(args: ChecksumArgs, format: OutputFormat) -> CliResult<i32> {
    let algorithm: ChecksumAlgorithm = args.algorithm.parse().map_err(|err: String| CliError::new(USAGE, err))?;
    let data = parse_hex(&args.hex).map_err(|err| codec_error("invalid hex input", err))?;
    let order: ByteOrder = args.byte_order.map_or_else(|| algorithm.default_byte_order(), Into::into);

    let stored = checksum_bytes(algorithm, &data, None, Some(order));
    let out = ChecksumOutput {
        schema_id: schema_id("checksum"),
        algorithm: algorithm.name(),
        value: algorithm.compute(&data),
        hex: format_hex(&stored),
    };
    let rows = [
        ("algorithm", out.algorithm.to_string()),
        ("value", format!("{:#06X}", out.value)),
        ("bytes", out.hex.clone()),
    ];
    print_record(&out, &rows, &stored, format);
    Ok(SUCCESS)
}
