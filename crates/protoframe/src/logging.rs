use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

/// Shape of the diagnostics written to stderr.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Install the stderr subscriber. Stdout is reserved for command output.
///
/// The library crates only emit events; framer, codec and validation logs
/// all surface here. Text output keeps targets so `protoframe::script` lines
/// from user scripts stand out.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(LevelFilter::from(level))
        .with_ansi(false);

    let installed = match format {
        LogFormat::Text => builder.with_target(true).without_time().try_init(),
        LogFormat::Json => builder.with_target(false).json().try_init(),
    };
    if installed.is_err() {
        eprintln!("warning: log subscriber already installed");
    }
}
