use protoframe_codec::text::{format_hex, parse_hex};
use protoframe_codec::{build_structured_message, BuildInput, ElementBinding, MessageStructure};
use serde::Serialize;

use crate::cmd::{load_json, parse_params, BuildArgs};
use crate::exit::{codec_error, CliResult, SUCCESS};
use crate::output::{print_record, schema_id, OutputFormat};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildOutput {
    schema_id: String,
    structure: String,
    size: usize,
    hex: String,
    elements: Vec<protoframe_codec::ElementLayout>,
}

pub fn run(args: BuildArgs, format: OutputFormat) -> CliResult<i32> {
    let structure: MessageStructure = load_json(&args.structure)?;
    let params = parse_params(&args.params)?;
    let bindings: Vec<ElementBinding> = match &args.bindings {
        Some(path) => load_json(path)?,
        None => Vec::new(),
    };
    let payload = match &args.payload {
        Some(hex) => Some(parse_hex(hex).map_err(|err| codec_error("invalid --payload", err))?),
        None => None,
    };

    let mut input = BuildInput::new(&params, &bindings);
    if let Some(payload) = payload.as_deref() {
        input = input.with_payload(payload);
    }
    let built = build_structured_message(&structure, &input).map_err(|err| codec_error("build failed", err))?;

    let out = BuildOutput {
        schema_id: schema_id("build-result"),
        structure: structure.id.clone(),
        size: built.data.len(),
        hex: format_hex(&built.data),
        elements: built.elements,
    };
    let mut rows = vec![("structure", out.structure.clone()), ("size", out.size.to_string()), ("hex", out.hex.clone())];
    for element in &out.elements {
        rows.push(("element", format!("{} @{}+{}", element.name, element.offset, element.size)));
    }
    print_record(&out, &rows, &built.data, format);
    Ok(SUCCESS)
}
