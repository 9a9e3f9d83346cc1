use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;

use crate::exit::{io_error, json_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod build;
pub mod checksum;
pub mod frame;
pub mod lint;
pub mod parse;
pub mod prepare;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split a byte stream into frames.
    Frame(FrameArgs),
    /// Encode parameter values against a message structure.
    Build(BuildArgs),
    /// Decode bytes against a message structure.
    Parse(ParseArgs),
    /// Compute a checksum over hex bytes.
    Checksum(ChecksumArgs),
    /// Report problems in a message structure.
    Lint(LintArgs),
    /// Merge a saved command and encode its payload.
    Prepare(PrepareArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Frame(args) => frame::run(args, format),
        Command::Build(args) => build::run(args, format),
        Command::Parse(args) => parse::run(args, format),
        Command::Checksum(args) => checksum::run(args, format),
        Command::Lint(args) => lint::run(args, format),
        Command::Prepare(args) => prepare::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum ByteOrderArg {
    #[default]
    Be,
    Le,
}

impl From<ByteOrderArg> for protoframe_codec::ByteOrder {
    fn from(order: ByteOrderArg) -> Self {
        match order {
            ByteOrderArg::Be => Self::BigEndian,
            ByteOrderArg::Le => Self::LittleEndian,
        }
    }
}

#[derive(Args, Debug)]
pub struct FrameArgs {
    /// Input file. Reads stdin when omitted or `-`.
    pub input: Option<PathBuf>,
    /// Split after this delimiter (escape-coded like `\r\n` or hex like `0D 0A`).
    #[arg(long, conflicts_with_all = ["prefix_length", "timeout_ms", "config"])]
    pub delimiter: Option<String>,
    /// Length-prefixed frames with an N-byte prefix.
    #[arg(long, value_name = "N", conflicts_with_all = ["delimiter", "timeout_ms", "config"])]
    pub prefix_length: Option<usize>,
    /// Byte order of the length prefix.
    #[arg(long, value_enum, default_value = "be")]
    pub byte_order: ByteOrderArg,
    /// Quiet-period framing; the end of input counts as silence.
    #[arg(long, value_name = "MS", conflicts_with_all = ["delimiter", "prefix_length", "config"])]
    pub timeout_ms: Option<u64>,
    /// Framing config JSON file.
    #[arg(long, value_name = "FILE", conflicts_with_all = ["delimiter", "prefix_length", "timeout_ms"])]
    pub config: Option<PathBuf>,
    /// Feed the input in chunks of this many bytes. 0 feeds it whole.
    #[arg(long, default_value = "0")]
    pub chunk_size: usize,
    /// Emit bytes left after the last complete frame as a final frame.
    #[arg(long)]
    pub flush: bool,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Message structure JSON file.
    #[arg(long, short = 's', value_name = "FILE")]
    pub structure: PathBuf,
    /// Parameter values as a JSON object.
    #[arg(long, short = 'p', default_value = "{}")]
    pub params: String,
    /// Element bindings JSON file.
    #[arg(long, value_name = "FILE")]
    pub bindings: Option<PathBuf>,
    /// Hex bytes for the PAYLOAD element.
    #[arg(long)]
    pub payload: Option<String>,
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Message structure JSON file.
    #[arg(long, short = 's', value_name = "FILE")]
    pub structure: PathBuf,
    /// Message bytes as hex.
    pub hex: String,
    /// Treat STATIC and checksum mismatches as failures.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct ChecksumArgs {
    /// Algorithm: mod256, xor, lrc, crc16-modbus, crc16-ccitt.
    #[arg(long, short = 'a')]
    pub algorithm: String,
    /// Input bytes as hex.
    pub hex: String,
    /// Byte order of the stored checksum. Defaults to the algorithm's.
    #[arg(long, value_enum)]
    pub byte_order: Option<ByteOrderArg>,
}

#[derive(Args, Debug)]
pub struct LintArgs {
    /// Message structure JSON file.
    pub structure: PathBuf,
}

#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Saved command JSON file.
    pub command: PathBuf,
    /// Parameter values as a JSON object.
    #[arg(long, short = 'p', default_value = "{}")]
    pub params: String,
    /// Protocol JSON file; the command is synced against it first.
    #[arg(long, value_name = "FILE")]
    pub protocol: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn read_input(path: Option<&Path>) -> CliResult<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => {
            std::fs::read(path).map_err(|err| io_error(&format!("failed reading {}", path.display()), err))
        }
        _ => {
            let mut data = Vec::new();
            std::io::stdin()
                .read_to_end(&mut data)
                .map_err(|err| io_error("failed reading stdin", err))?;
            Ok(data)
        }
    }
}

pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let data = read_input(Some(path))?;
    serde_json::from_slice(&data).map_err(|err| json_error(path, err))
}

pub(crate) fn parse_params(input: &str) -> CliResult<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_str(input) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(CliError::new(USAGE, "--params must be a JSON object")),
        Err(err) => Err(CliError::new(USAGE, format!("--params is not valid JSON: {err}"))),
    }
}
