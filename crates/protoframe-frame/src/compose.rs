use bytes::{Bytes, BytesMut};
use protoframe_codec::numeric::read_uint;
use serde::{Deserialize, Serialize};

use crate::config::FramingConfig;
use crate::error::{FrameError, Result};

/// Raw bytes as delivered by the transport, stamped with arrival time in ms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedChunk {
    pub data: Bytes,
    pub timestamp: u64,
}

impl TimedChunk {
    pub fn new(data: impl Into<Bytes>, timestamp: u64) -> Self {
        Self {
            data: data.into(),
            timestamp,
        }
    }
}

/// One complete unit cut from the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub data: Bytes,
    /// Timestamp of the chunk holding the frame's first byte.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_length: Option<usize>,
}

impl Frame {
    pub fn new(data: impl Into<Bytes>, timestamp: u64) -> Self {
        Self {
            data: data.into(),
            timestamp,
            payload_start: None,
            payload_length: None,
        }
    }

    /// The useful content: the declared payload range for length-prefixed
    /// frames, the whole frame otherwise.
    pub fn payload(&self) -> &[u8] {
        match (self.payload_start, self.payload_length) {
            (Some(start), Some(len)) if start + len <= self.data.len() => &self.data[start..start + len],
            _ => &self.data,
        }
    }
}

/// Output of one framing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composed {
    pub frames: Vec<Frame>,
    pub remaining: Vec<TimedChunk>,
}

/// Slice `chunks` into frames under `config`.
///
/// Pure: the same input always yields the same partition. SCRIPT framing goes
/// through [`compose_frames_scripted`](crate::script::compose_frames_scripted) instead.
pub fn compose_frames(chunks: &[TimedChunk], config: &FramingConfig, force_flush: bool) -> Result<Composed> {
    if chunks.is_empty() {
        return Ok(Composed::default());
    }
    let stream = Stream::assemble(chunks);

    match config {
        FramingConfig::None => Ok(Composed {
            frames: vec![stream.frame(0, stream.len())],
            remaining: Vec::new(),
        }),
        FramingConfig::Delimiter { delimiter } => {
            let delimiter = delimiter.to_bytes()?;
            let mut frames = Vec::new();
            let mut start = 0;
            while let Some(pos) = find(&stream.data[start..], &delimiter) {
                let end = start + pos + delimiter.len();
                frames.push(stream.frame(start, end));
                start = end;
            }
            Ok(Composed {
                frames,
                remaining: stream.remaining_from(start),
            })
        }
        FramingConfig::Timeout { .. } => {
            if force_flush {
                Ok(Composed {
                    frames: vec![stream.frame(0, stream.len())],
                    remaining: Vec::new(),
                })
            } else {
                Ok(Composed {
                    frames: Vec::new(),
                    remaining: chunks.to_vec(),
                })
            }
        }
        FramingConfig::PrefixLength {
            prefix_length_size,
            byte_order,
        } => {
            config.validate()?;
            let size = *prefix_length_size;
            let mut frames = Vec::new();
            let mut start = 0;
            while stream.len() - start >= size {
                let declared = read_uint(&stream.data[start..start + size], *byte_order);
                let total = usize::try_from(declared)
                    .ok()
                    .and_then(|len| len.checked_add(size));
                let Some(total) = total.filter(|total| stream.len() - start >= *total) else {
                    break;
                };
                let mut frame = stream.frame(start, start + total);
                frame.payload_start = Some(size);
                frame.payload_length = Some(total - size);
                frames.push(frame);
                start += total;
            }
            Ok(Composed {
                frames,
                remaining: stream.remaining_from(start),
            })
        }
        FramingConfig::Script { .. } => Err(FrameError::ScriptUnavailable),
    }
}

/// Buffered chunks flattened into one contiguous view, remembering where each
/// chunk started so timestamps survive slicing.
struct Stream {
    data: Bytes,
    marks: Vec<(usize, u64)>,
}

impl Stream {
    fn assemble(chunks: &[TimedChunk]) -> Self {
        if let [only] = chunks {
            return Self {
                data: only.data.clone(),
                marks: vec![(0, only.timestamp)],
            };
        }
        let total = chunks.iter().map(|c| c.data.len()).sum();
        let mut data = BytesMut::with_capacity(total);
        let mut marks = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            marks.push((data.len(), chunk.timestamp));
            data.extend_from_slice(&chunk.data);
        }
        Self {
            data: data.freeze(),
            marks,
        }
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn timestamp_at(&self, offset: usize) -> u64 {
        let idx = self.marks.partition_point(|(start, _)| *start <= offset);
        self.marks[idx.saturating_sub(1)].1
    }

    fn frame(&self, start: usize, end: usize) -> Frame {
        Frame::new(self.data.slice(start..end), self.timestamp_at(start))
    }

    /// Bytes from `offset` on, split back along the original chunk boundaries.
    fn remaining_from(&self, offset: usize) -> Vec<TimedChunk> {
        let mut out = Vec::new();
        for (i, &(start, timestamp)) in self.marks.iter().enumerate() {
            let end = self.marks.get(i + 1).map_or(self.len(), |(next, _)| *next);
            let from = start.max(offset);
            if from < end {
                out.push(TimedChunk::new(self.data.slice(from..end), timestamp));
            }
        }
        out
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
