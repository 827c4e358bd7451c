//! Audio capture abstractions
//!
//! The session orchestrator talks to the microphone through the
//! `CaptureBackend` trait and to the speaker through
//! [`super::playback::PlaybackSink`]; `AudioBackendFactory` bundles the
//! two sides so tests can substitute fakes for real devices.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use super::analyser::Analyser;
use super::playback::{PlaybackError, PlaybackSink};

/// One fixed-size block of capture audio (mono f32 frames).
#[derive(Debug, Clone)]
pub struct CaptureBlock {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Input processing requested from the capture device.
///
/// Backends apply whatever the platform supports and log the rest;
/// unsupported constraints are not an error.
#[derive(Debug, Clone, Copy)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Configuration for the capture side of the pipeline.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (the Live API expects 16kHz input)
    pub sample_rate: u32,
    /// Frames per block pushed to the outbound stream
    pub block_frames: usize,
    pub constraints: CaptureConstraints,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            block_frames: 4096,
            constraints: CaptureConstraints::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device available")]
    NoDevice,
    #[error("microphone stream failed: {0}")]
    Device(String),
}

/// Microphone capture backend
///
/// `start` returns a channel receiver delivering fixed-size blocks; the
/// per-block path must be non-blocking so a slow consumer drops blocks
/// instead of stalling the device callback.
#[async_trait::async_trait]
pub trait CaptureBackend: Send {
    /// Start capturing audio
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureBlock>, CaptureError>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Creates the device-side halves of a session's audio pipeline.
///
/// The analyser handed to each side is a read-only visualization tap;
/// it never alters the signal.
pub trait AudioBackendFactory: Send + Sync {
    fn create_capture(
        &self,
        config: &CaptureConfig,
        analyser: Arc<Analyser>,
    ) -> Result<Box<dyn CaptureBackend>, CaptureError>;

    fn create_sink(
        &self,
        sample_rate: u32,
        analyser: Arc<Analyser>,
    ) -> Result<Arc<dyn PlaybackSink>, PlaybackError>;
}
