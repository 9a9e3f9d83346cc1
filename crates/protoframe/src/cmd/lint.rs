use protoframe_codec::{get_message_structure_size, validate_structure, MessageStructure, StructureIssue};
use serde::Serialize;

use crate::cmd::{load_json, LintArgs};
use crate::exit::{CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_record, schema_id, OutputFormat};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LintOutput {
    schema_id: String,
    structure: String,
    min_size: usize,
    fixed_size: Option<usize>,
    issues: Vec<StructureIssue>,
}

pub fn run(args: LintArgs, format: OutputFormat) -> CliResult<i32> {
    let structure: MessageStructure = load_json(&args.structure)?;
    let issues = validate_structure(&structure);

    let out = LintOutput {
        schema_id: schema_id("lint-report"),
        structure: structure.id.clone(),
        min_size: structure.min_size(),
        fixed_size: get_message_structure_size(&structure),
        issues,
    };
    let mut rows = vec![
        ("structure", out.structure.clone()),
        ("minSize", out.min_size.to_string()),
        ("fixedSize", out.fixed_size.map_or_else(|| "variable".to_string(), |n| n.to_string())),
    ];
    for issue in &out.issues {
        rows.push(("issue", issue.to_string()));
    }
    print_record(&out, &rows, &[], format);

    if out.issues.is_empty() {
        Ok(SUCCESS)
    } else {
        Ok(DATA_INVALID)
    }
}
