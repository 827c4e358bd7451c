//! Playback scheduling for inbound audio chunks
//!
//! Chunks arrive from the Live channel with variable decode latency but
//! must play back-to-back in arrival order. `PlaybackScheduler` keeps a
//! single cursor for the earliest time the next chunk may start and the
//! set of sources that are scheduled but not yet finished, so a barge-in
//! can silence everything at once.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::pcm;

/// Handle for one scheduled chunk on a playback sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u64);

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no output device available")]
    NoDevice,
    #[error("output device failed: {0}")]
    Device(String),
}

/// Decoded audio ready to play against the output side of the pipeline.
#[derive(Debug, Clone)]
pub struct PlaybackBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PlaybackBuffer {
    pub fn duration_secs(&self) -> f64 {
        let frames = self.samples.len() / self.channels.max(1) as usize;
        frames as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Interpret raw 16-bit little-endian PCM bytes as a playable buffer.
///
/// Odd trailing bytes are truncated; empty input yields a zero-length
/// buffer rather than an error.
pub fn decode_audio_data(bytes: &[u8], sample_rate: u32, channels: u16) -> PlaybackBuffer {
    PlaybackBuffer {
        samples: pcm::pcm_to_f32(bytes),
        sample_rate,
        channels,
    }
}

/// Output device seam.
///
/// `now` is the sink's own clock in seconds, monotone while the sink is
/// open. `stop` on an already-finished source must be a no-op.
pub trait PlaybackSink: Send + Sync {
    fn now(&self) -> f64;
    fn schedule(&self, buffer: PlaybackBuffer, start: f64) -> Result<SourceId, PlaybackError>;
    fn stop(&self, id: SourceId);
}

struct ActiveSource {
    start: f64,
    duration: f64,
}

/// Sequential, gapless scheduler over a [`PlaybackSink`].
pub struct PlaybackScheduler {
    sink: Arc<dyn PlaybackSink>,
    next_start: f64,
    active: HashMap<SourceId, ActiveSource>,
}

impl PlaybackScheduler {
    pub fn new(sink: Arc<dyn PlaybackSink>) -> Self {
        Self {
            sink,
            next_start: 0.0,
            active: HashMap::new(),
        }
    }

    /// Schedule a chunk to start as soon as the cursor allows.
    ///
    /// The start time is `max(cursor, sink clock)` so a pipeline that has
    /// fallen behind never schedules into the past; the cursor then
    /// advances by the chunk's duration, which concatenates consecutive
    /// chunks without gap or overlap.
    pub fn enqueue(&mut self, buffer: PlaybackBuffer) -> Result<SourceId, PlaybackError> {
        self.prune_finished();

        let start = self.next_start.max(self.sink.now());
        let duration = buffer.duration_secs();
        let id = self.sink.schedule(buffer, start)?;

        self.next_start = start + duration;
        self.active.insert(id, ActiveSource { start, duration });

        debug!("scheduled chunk {:?} at {:.3}s ({:.3}s)", id, start, duration);
        Ok(id)
    }

    /// Barge-in: stop every scheduled source, clear the set, and reset
    /// the cursor so the next chunk starts from the current clock.
    pub fn interrupt(&mut self) {
        for id in self.active.keys() {
            self.sink.stop(*id);
        }
        self.active.clear();
        self.next_start = 0.0;
    }

    /// Reset for a fresh session: cursor to zero, nothing active.
    pub fn reset(&mut self) {
        self.active.clear();
        self.next_start = 0.0;
    }

    pub fn active_count(&mut self) -> usize {
        self.prune_finished();
        self.active.len()
    }

    pub fn cursor(&self) -> f64 {
        self.next_start
    }

    fn prune_finished(&mut self) {
        let now = self.sink.now();
        self.active
            .retain(|_, source| now < source.start + source.duration);
    }
}
