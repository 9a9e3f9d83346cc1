use protoframe_command::{
    command_sync_status, get_effective_command, prepare_command, sync_protocol_layer, Protocol, SavedCommand,
    SyncStatus,
};
use protoframe_codec::text::format_hex;
use serde::Serialize;

use crate::cmd::{load_json, parse_params, PrepareArgs};
use crate::exit::{command_error, CliResult, SUCCESS};
use crate::output::{print_record, schema_id, OutputFormat};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrepareOutput {
    schema_id: String,
    command: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync: Option<SyncStatus>,
    text: String,
    hex: String,
    unresolved: Vec<String>,
    values: serde_json::Map<String, serde_json::Value>,
}

pub fn run(args: PrepareArgs, format: OutputFormat) -> CliResult<i32> {
    let saved: SavedCommand = load_json(&args.command)?;
    let user_values = parse_params(&args.params)?;

    let (saved, sync) = match &args.protocol {
        Some(path) => {
            let protocol: Protocol = load_json(path)?;
            let status = command_sync_status(&saved, std::slice::from_ref(&protocol));
            let synced = sync_protocol_layer(&saved, &protocol).into_owned();
            (synced, Some(status))
        }
        None => (saved, None),
    };

    let command = get_effective_command(&saved);
    let prepared = prepare_command(&command, &user_values).map_err(|err| command_error("prepare failed", err))?;

    let out = PrepareOutput {
        schema_id: schema_id("prepared-command"),
        command: command.id.clone(),
        name: command.name.clone(),
        sync,
        text: prepared.payload.text.clone(),
        hex: format_hex(&prepared.payload.bytes),
        unresolved: prepared.payload.unresolved.clone(),
        values: prepared.values.clone(),
    };
    let mut rows = vec![
        ("command", out.command.clone()),
        ("name", out.name.clone()),
        ("text", out.text.clone()),
        ("hex", out.hex.clone()),
    ];
    if let Some(sync) = out.sync {
        rows.push(("sync", format!("{sync:?}").to_lowercase()));
    }
    if !out.unresolved.is_empty() {
        rows.push(("unresolved", out.unresolved.join(", ")));
    }
    print_record(&out, &rows, &prepared.payload.bytes, format);
    Ok(SUCCESS)
}
