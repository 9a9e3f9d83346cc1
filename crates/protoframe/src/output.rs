use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use protoframe_codec::text::format_hex;
use protoframe_frame::Frame;
use serde::Serialize;

const SCHEMA_BASE: &str = "https://schemas.3leaps.dev/protoframe/cli/v1";

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn schema_id(name: &str) -> String {
    format!("{SCHEMA_BASE}/{name}.schema.json")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameOutput<'a> {
    schema_id: String,
    index: usize,
    timestamp: u64,
    size: usize,
    hex: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_length: Option<usize>,
    #[serde(skip)]
    raw: &'a [u8],
}

pub fn print_frames(frames: &[Frame], format: OutputFormat) {
    let rows: Vec<FrameOutput<'_>> = frames
        .iter()
        .enumerate()
        .map(|(index, frame)| FrameOutput {
            schema_id: schema_id("frame"),
            index,
            timestamp: frame.timestamp,
            size: frame.data.len(),
            hex: format_hex(&frame.data),
            text: text_preview(&frame.data),
            payload_start: frame.payload_start,
            payload_length: frame.payload_length,
            raw: frame.data.as_ref(),
        })
        .collect();

    match format {
        OutputFormat::Json => {
            for row in &rows {
                println!("{}", serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string()));
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "TIMESTAMP", "SIZE", "HEX", "TEXT"]);
            for row in &rows {
                table.add_row(vec![
                    row.index.to_string(),
                    row.timestamp.to_string(),
                    row.size.to_string(),
                    row.hex.clone(),
                    row.text.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                println!("frame={} ts={} size={} hex={}", row.index, row.timestamp, row.size, row.hex);
            }
        }
        OutputFormat::Raw => {
            for row in &rows {
                print_raw(row.raw);
            }
        }
    }
}

/// Print a single result document.
///
/// `rows` is the field/value view used by the table and pretty formats; `raw`
/// is what `--format raw` writes.
pub fn print_record<T: Serialize>(record: &T, rows: &[(&str, String)], raw: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string()));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in rows {
                table.add_row(vec![field.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (field, value) in rows {
                println!("{field}={value}");
            }
        }
        OutputFormat::Raw => print_raw(raw),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn text_preview(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.escape_debug().to_string(),
        Err(_) => format!("<binary {} bytes>", data.len()),
    }
}
