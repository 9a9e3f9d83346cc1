use std::sync::Arc;

use protoframe_sandbox::Sandbox;
use tokio::time::Instant;

use crate::compose::{compose_frames, Composed, Frame, TimedChunk};
use crate::config::{FramerOptions, FramingConfig};
use crate::error::{FrameError, Result};
use crate::script::compose_frames_scripted;

/// Per-session framing state machine.
///
/// Holds buffered chunks between pushes and slices complete frames out of them
/// under the current [`FramingConfig`]. Frames are returned, never mutated after.
///
/// TIMEOUT framing needs a driver: poll [`flush_deadline`](Self::flush_deadline)
/// and call [`expire`](Self::expire) once it passes. [`FramerSession`](crate::FramerSession)
/// does this with a single re-armed timer.
pub struct StreamFramer {
    config: FramingConfig,
    options: FramerOptions,
    buffer: Vec<TimedChunk>,
    sandbox: Option<Arc<dyn Sandbox>>,
    deadline: Option<Instant>,
}

impl StreamFramer {
    /// Create a framer with default options.
    pub fn new(config: FramingConfig) -> Self {
        Self::with_options(config, FramerOptions::default())
    }

    /// Create a framer with explicit options.
    pub fn with_options(config: FramingConfig, options: FramerOptions) -> Self {
        Self {
            config,
            options,
            buffer: Vec::new(),
            sandbox: None,
            deadline: None,
        }
    }

    /// Attach the sandbox used by SCRIPT framing.
    pub fn with_sandbox(mut self, sandbox: Arc<dyn Sandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// Append a chunk and return any frames it completes.
    ///
    /// Under TIMEOUT framing this never yields frames; it re-arms the debounce deadline.
    pub async fn push(&mut self, chunk: TimedChunk) -> Result<Vec<Frame>> {
        tracing::trace!(len = chunk.data.len(), timestamp = chunk.timestamp, "push");
        self.buffer.push(chunk);
        let frames = self.process(false).await?;
        if let Some(debounce) = self.config.debounce() {
            self.deadline = (!self.buffer.is_empty()).then(|| Instant::now() + debounce);
        }
        Ok(frames)
    }

    /// The debounce period elapsed: run a forced framing pass.
    ///
    /// Leftovers the strategy refuses to frame (e.g. bytes after the last delimiter)
    /// stay buffered.
    pub async fn expire(&mut self) -> Result<Vec<Frame>> {
        self.deadline = None;
        self.process(true).await
    }

    /// Emit everything buffered, completing with a single catch-all frame if the
    /// strategy leaves bytes behind.
    pub async fn flush(&mut self) -> Result<Vec<Frame>> {
        self.deadline = None;
        let mut frames = self.process(true).await?;
        if let Some(frame) = self.drain_as_frame() {
            tracing::debug!(len = frame.data.len(), strategy = self.config.strategy(), "flushed partial frame");
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Discard buffered bytes and cancel the debounce deadline.
    pub fn reset(&mut self) {
        if !self.buffer.is_empty() {
            tracing::debug!(chunks = self.buffer.len(), "discarding buffered chunks");
        }
        self.buffer.clear();
        self.deadline = None;
    }

    /// Replace the strategy and reprocess whatever is buffered under it.
    pub async fn set_config(&mut self, config: FramingConfig) -> Result<Vec<Frame>> {
        config.validate()?;
        tracing::debug!(from = self.config.strategy(), to = config.strategy(), "framing config changed");
        self.config = config;
        self.deadline = None;
        let frames = self.process(false).await?;
        if let Some(debounce) = self.config.debounce() {
            self.deadline = (!self.buffer.is_empty()).then(|| Instant::now() + debounce);
        }
        Ok(frames)
    }

    /// When the pending TIMEOUT flush is due, if one is armed.
    pub fn flush_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn config(&self) -> &FramingConfig {
        &self.config
    }

    pub fn options(&self) -> &FramerOptions {
        &self.options
    }

    /// Bytes currently held back.
    pub fn buffered_len(&self) -> usize {
        self.buffer.iter().map(|c| c.data.len()).sum()
    }

    async fn process(&mut self, force_flush: bool) -> Result<Vec<Frame>> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }

        // The buffer is only replaced once a pass succeeds.
        let Composed { mut frames, remaining } = match &self.config {
            FramingConfig::Script { script } => {
                let sandbox = self.sandbox.as_deref().ok_or(FrameError::ScriptUnavailable)?;
                compose_frames_scripted(sandbox, script, &self.buffer, force_flush, self.options.script_timeout).await?
            }
            config => compose_frames(&self.buffer, config, force_flush)?,
        };
        self.buffer = remaining;

        if self.buffered_len() > self.options.max_buffer_size {
            tracing::warn!(
                buffered = self.buffered_len(),
                max = self.options.max_buffer_size,
                strategy = self.config.strategy(),
                "framing buffer overflow, force-emitting"
            );
            frames.extend(self.drain_as_frame());
        }

        if !frames.is_empty() {
            tracing::trace!(count = frames.len(), "frames emitted");
        }
        Ok(frames)
    }

    fn drain_as_frame(&mut self) -> Option<Frame> {
        if self.buffer.is_empty() {
            return None;
        }
        let chunks = std::mem::take(&mut self.buffer);
        compose_frames(&chunks, &FramingConfig::None, true)
            .ok()
            .and_then(|composed| composed.frames.into_iter().next())
    }
}

impl std::fmt::Debug for StreamFramer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamFramer")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("buffered_len", &self.buffered_len())
            .field("deadline", &self.deadline)
            .finish()
    }
}
