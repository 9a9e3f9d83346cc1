use std::future::pending;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::compose::{Frame, TimedChunk};
use crate::config::FramingConfig;
use crate::error::{FrameError, Result};
use crate::framer::StreamFramer;

/// Default depth of the session's input and output channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

enum Input {
    Chunk(TimedChunk),
    Flush,
    Reset,
    SetConfig(FramingConfig, oneshot::Sender<Result<()>>),
}

/// Drives a [`StreamFramer`] on its own task.
///
/// Chunks and control messages share one ordered queue, so a config change
/// always applies to exactly the bytes pushed before it. The TIMEOUT debounce is
/// a single `sleep_until` re-armed from the framer's deadline on every loop.
/// Frames come out of the receiver returned by [`spawn`](Self::spawn).
pub struct FramerSession {
    input: mpsc::Sender<Input>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FramerSession {
    /// Start a session task for `framer`.
    pub fn spawn(framer: StreamFramer) -> (Self, mpsc::Receiver<Frame>) {
        Self::spawn_with_capacity(framer, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn spawn_with_capacity(framer: StreamFramer, capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (frames_tx, frames_rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(framer, input_rx, frames_tx, cancel.clone()));
        (
            Self {
                input: input_tx,
                cancel,
                task: Some(task),
            },
            frames_rx,
        )
    }

    /// Queue a chunk from the transport.
    pub async fn push(&self, chunk: TimedChunk) -> Result<()> {
        self.send(Input::Chunk(chunk)).await
    }

    /// Force out everything buffered.
    pub async fn flush(&self) -> Result<()> {
        self.send(Input::Flush).await
    }

    /// Drop buffered bytes and cancel the debounce timer.
    pub async fn reset(&self) -> Result<()> {
        self.send(Input::Reset).await
    }

    /// Swap the framing strategy once all previously queued chunks are processed.
    ///
    /// Resolves after the buffer was reprocessed; an invalid config is reported
    /// here and leaves the current strategy in place.
    pub async fn set_config(&self, config: FramingConfig) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Input::SetConfig(config, tx)).await?;
        rx.await.map_err(|_| FrameError::SessionClosed)?
    }

    /// Stop the session task and wait for it to exit. Buffered bytes are dropped.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "framer session task failed");
            }
        }
    }

    async fn send(&self, input: Input) -> Result<()> {
        self.input.send(input).await.map_err(|_| FrameError::SessionClosed)
    }
}

impl Drop for FramerSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    mut framer: StreamFramer,
    mut input: mpsc::Receiver<Input>,
    frames: mpsc::Sender<Frame>,
    cancel: CancellationToken,
) {
    tracing::debug!(strategy = framer.config().strategy(), "framer session started");
    'session: loop {
        let deadline = framer.flush_deadline();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break 'session,
            next = input.recv() => match next {
                Some(Input::Chunk(chunk)) => framer.push(chunk).await,
                Some(Input::Flush) => framer.flush().await,
                Some(Input::Reset) => {
                    framer.reset();
                    Ok(Vec::new())
                }
                Some(Input::SetConfig(config, reply)) => {
                    let outcome = framer.set_config(config).await;
                    let (out, ack) = match outcome {
                        Ok(out) => (Ok(out), Ok(())),
                        Err(err) => (Ok(Vec::new()), Err(err)),
                    };
                    let _ = reply.send(ack);
                    out
                }
                None => break 'session,
            },
            _ = sleep_until_armed(deadline) => framer.expire().await,
        };

        match result {
            Ok(out) => {
                let total = out.len();
                for (sent, frame) in out.into_iter().enumerate() {
                    // A full output channel must not keep close() waiting.
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            tracing::debug!(dropped = total - sent, "session cancelled with undelivered frames");
                            break 'session;
                        }
                        delivered = frames.send(frame) => {
                            if delivered.is_err() {
                                tracing::debug!("frame receiver dropped, stopping session");
                                return;
                            }
                        }
                    }
                }
            }
            // Framing errors never tear down the session; the buffer is intact.
            Err(err) => tracing::warn!(error = %err, "framing pass failed"),
        }
    }
    tracing::debug!(buffered = framer.buffered_len(), "framer session stopped");
}

async fn sleep_until_armed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
