use std::time::Duration;

use protoframe_frame::{Frame, FramingConfig, StreamFramer, TimedChunk};

use crate::cmd::{load_json, read_input, FrameArgs};
use crate::exit::{frame_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_frames, OutputFormat};

pub fn run(args: FrameArgs, format: OutputFormat) -> CliResult<i32> {
    let config = resolve_config(&args)?;
    config.validate().map_err(|err| frame_error("invalid framing config", err))?;
    let input = read_input(args.input.as_deref())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))?;
    let (frames, leftover) = runtime.block_on(frame_all(config, &input, args.chunk_size, args.flush))?;

    print_frames(&frames, format);
    if leftover > 0 {
        tracing::info!(bytes = leftover, "bytes left without a complete frame");
    }
    Ok(SUCCESS)
}

fn resolve_config(args: &FrameArgs) -> CliResult<FramingConfig> {
    if let Some(path) = &args.config {
        return load_json(path);
    }
    if let Some(delimiter) = &args.delimiter {
        return Ok(FramingConfig::delimiter(delimiter));
    }
    if let Some(size) = args.prefix_length {
        return Ok(FramingConfig::prefix_length(size, args.byte_order.into()));
    }
    if let Some(ms) = args.timeout_ms {
        return Ok(FramingConfig::timeout(Duration::from_millis(ms)));
    }
    Ok(FramingConfig::None)
}

/// Push the input through a framer. Chunk `i` is stamped with timestamp `i`.
async fn frame_all(config: FramingConfig, input: &[u8], chunk_size: usize, flush: bool) -> CliResult<(Vec<Frame>, usize)> {
    let mut framer = StreamFramer::new(config);
    let chunk_size = if chunk_size == 0 { input.len().max(1) } else { chunk_size };

    let mut frames = Vec::new();
    for (i, chunk) in input.chunks(chunk_size).enumerate() {
        let chunk = TimedChunk::new(chunk.to_vec(), i as u64);
        frames.extend(framer.push(chunk).await.map_err(|err| frame_error("framing failed", err))?);
    }

    // End of input is the quiet period for TIMEOUT framing.
    frames.extend(framer.expire().await.map_err(|err| frame_error("framing failed", err))?);
    if flush {
        frames.extend(framer.flush().await.map_err(|err| frame_error("flush failed", err))?);
    }
    Ok((frames, framer.buffered_len()))
}
