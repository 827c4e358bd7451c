//! cpal-backed capture and playback devices
//!
//! cpal streams are not `Send`, so each device runs on its own thread
//! that owns the stream for the session's lifetime; the rest of the
//! crate only sees channels, the mixer state, and the analyser taps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::analyser::Analyser;
use super::backend::{
    AudioBackendFactory, CaptureBackend, CaptureBlock, CaptureConfig, CaptureError,
};
use super::playback::{PlaybackBuffer, PlaybackError, PlaybackSink, SourceId};

/// Real-device factory used by `main`; tests substitute fakes.
pub struct CpalAudio;

impl AudioBackendFactory for CpalAudio {
    fn create_capture(
        &self,
        config: &CaptureConfig,
        analyser: Arc<Analyser>,
    ) -> Result<Box<dyn CaptureBackend>, CaptureError> {
        Ok(Box::new(MicrophoneCapture::new(config.clone(), analyser)))
    }

    fn create_sink(
        &self,
        sample_rate: u32,
        analyser: Arc<Analyser>,
    ) -> Result<Arc<dyn PlaybackSink>, PlaybackError> {
        Ok(Arc::new(SpeakerSink::open(sample_rate, analyser)?))
    }
}

// ---------------------------------------------------------------------------
// Microphone capture
// ---------------------------------------------------------------------------

/// Downmixes the device stream to mono, decimates to the target rate,
/// and re-blocks into fixed-size capture blocks.
struct BlockChunker {
    device_rate: u32,
    target_rate: u32,
    block_frames: usize,
    phase: u32,
    block: Vec<f32>,
}

impl BlockChunker {
    fn new(device_rate: u32, target_rate: u32, block_frames: usize) -> Self {
        Self {
            device_rate,
            target_rate,
            block_frames,
            phase: 0,
            block: Vec::with_capacity(block_frames),
        }
    }

    /// Decimation only; a device rate at or below the target passes
    /// every frame through unchanged (no upsampling).
    fn push(&mut self, interleaved: &[f32], channels: usize, mut emit: impl FnMut(CaptureBlock)) {
        let channels = channels.max(1);
        for frame in interleaved.chunks(channels) {
            let mono = frame.iter().sum::<f32>() / frame.len() as f32;

            self.phase += self.target_rate;
            if self.phase < self.device_rate {
                continue;
            }
            // Cap the residue so a device rate below the target (no
            // upsampling, every frame passes) cannot grow the phase.
            self.phase = (self.phase - self.device_rate).min(self.target_rate);

            self.block.push(mono);
            if self.block.len() == self.block_frames {
                let samples =
                    std::mem::replace(&mut self.block, Vec::with_capacity(self.block_frames));
                emit(CaptureBlock {
                    samples,
                    sample_rate: self.target_rate,
                });
            }
        }
    }
}

pub struct MicrophoneCapture {
    config: CaptureConfig,
    analyser: Arc<Analyser>,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl MicrophoneCapture {
    pub fn new(config: CaptureConfig, analyser: Arc<Analyser>) -> Self {
        Self {
            config,
            analyser,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

fn build_input_stream(
    config: &CaptureConfig,
    analyser: Arc<Analyser>,
    tx: mpsc::Sender<CaptureBlock>,
) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;
    let device_config = device
        .default_input_config()
        .map_err(|e| CaptureError::Device(e.to_string()))?;

    let channels = device_config.channels() as usize;
    let device_rate = device_config.sample_rate().0;
    let mut chunker = BlockChunker::new(device_rate, config.sample_rate, config.block_frames);

    let c = config.constraints;
    info!(
        "opening microphone: {}Hz {}ch -> {}Hz mono (aec={} ns={} agc={}, platform-managed)",
        device_rate, channels, config.sample_rate, c.echo_cancellation, c.noise_suppression,
        c.auto_gain_control
    );

    let mut on_samples = move |floats: &[f32]| {
        chunker.push(floats, channels, |block| {
            analyser.push(&block.samples);
            if tx.try_send(block).is_err() {
                debug!("capture consumer behind, dropping block");
            }
        });
    };

    let err_fn = |e| warn!("capture stream error: {}", e);
    let stream = match device_config.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &device_config.into(),
            move |data: &[f32], _| on_samples(data),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &device_config.into(),
            move |data: &[i16], _| {
                let floats: Vec<f32> =
                    data.iter().map(|&v| v as f32 / i16::MAX as f32).collect();
                on_samples(&floats);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(CaptureError::Device(format!(
                "unsupported input sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| CaptureError::Device(e.to_string()))?;

    Ok(stream)
}

#[async_trait::async_trait]
impl CaptureBackend for MicrophoneCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureBlock>, CaptureError> {
        let (tx, rx) = mpsc::channel(32);
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

        let config = self.config.clone();
        let analyser = Arc::clone(&self.analyser);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        let worker = thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                let stream = match build_input_stream(&config, analyser, tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(CaptureError::Device(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
            })
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        self.worker = Some(worker);

        match ready_rx.await {
            Ok(Ok(())) => Ok(rx),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CaptureError::Device("capture thread exited".into())),
        }
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = tokio::task::spawn_blocking(move || worker.join()).await;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cpal-microphone"
    }
}

// ---------------------------------------------------------------------------
// Speaker sink
// ---------------------------------------------------------------------------

struct PlayingSource {
    id: SourceId,
    start_frame: u64,
    samples: Vec<f32>,
}

struct MixerState {
    next_id: u64,
    /// Playback clock in (fractional) logical frames at the sink rate.
    logical_pos: f64,
    sources: Vec<PlayingSource>,
}

/// Output device with a sample-accurate scheduling clock.
///
/// Scheduled buffers are mixed additively at their start frames; the
/// clock is derived from frames actually rendered, so `now()` tracks
/// what has really hit the device.
pub struct SpeakerSink {
    state: Arc<Mutex<MixerState>>,
    sample_rate: u32,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl SpeakerSink {
    pub fn open(sample_rate: u32, analyser: Arc<Analyser>) -> Result<Self, PlaybackError> {
        let state = Arc::new(Mutex::new(MixerState {
            next_id: 0,
            logical_pos: 0.0,
            sources: Vec::new(),
        }));
        let running = Arc::new(AtomicBool::new(true));

        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let thread_state = Arc::clone(&state);
        let thread_running = Arc::clone(&running);

        let worker = thread::Builder::new()
            .name("speaker-sink".into())
            .spawn(move || {
                let stream = match build_output_stream(sample_rate, thread_state, analyser) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(PlaybackError::Device(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while thread_running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
            })
            .map_err(|e| PlaybackError::Device(e.to_string()))?;

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => Ok(Self {
                state,
                sample_rate,
                running,
                worker: Some(worker),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(PlaybackError::Device("output thread did not start".into())),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MixerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn build_output_stream(
    sample_rate: u32,
    state: Arc<Mutex<MixerState>>,
    analyser: Arc<Analyser>,
) -> Result<cpal::Stream, PlaybackError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(PlaybackError::NoDevice)?;
    let device_config = device
        .default_output_config()
        .map_err(|e| PlaybackError::Device(e.to_string()))?;

    let channels = device_config.channels() as usize;
    let device_rate = device_config.sample_rate().0;
    let step = sample_rate as f64 / device_rate as f64;

    info!(
        "opening speaker: {}Hz {}ch (mixing at {}Hz mono)",
        device_rate, channels, sample_rate
    );

    // Produces one mono logical-rate sample per device frame, nearest-
    // neighbor resampled, and advances the shared clock.
    let mix_frames = move |state: &Arc<Mutex<MixerState>>, frames: usize| -> Vec<f32> {
        let mut guard = match state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut mixed = Vec::with_capacity(frames);
        for _ in 0..frames {
            let frame = guard.logical_pos as u64;
            let mut sample = 0.0f32;
            for source in &guard.sources {
                if frame >= source.start_frame {
                    if let Some(&s) = source.samples.get((frame - source.start_frame) as usize) {
                        sample += s;
                    }
                }
            }
            mixed.push(sample.clamp(-1.0, 1.0));
            guard.logical_pos += step;
        }
        let pos = guard.logical_pos as u64;
        guard
            .sources
            .retain(|s| s.start_frame + s.samples.len() as u64 > pos);
        mixed
    };

    let err_fn = |e| warn!("output stream error: {}", e);
    let stream = match device_config.sample_format() {
        SampleFormat::F32 => {
            let state = Arc::clone(&state);
            device.build_output_stream(
                &device_config.into(),
                move |data: &mut [f32], _| {
                    let mixed = mix_frames(&state, data.len() / channels);
                    analyser.push(&mixed);
                    for (frame, out) in mixed.iter().zip(data.chunks_mut(channels)) {
                        out.fill(*frame);
                    }
                },
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let state = Arc::clone(&state);
            device.build_output_stream(
                &device_config.into(),
                move |data: &mut [i16], _| {
                    let mixed = mix_frames(&state, data.len() / channels);
                    analyser.push(&mixed);
                    for (frame, out) in mixed.iter().zip(data.chunks_mut(channels)) {
                        out.fill((*frame * i16::MAX as f32) as i16);
                    }
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(PlaybackError::Device(format!(
                "unsupported output sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| PlaybackError::Device(e.to_string()))?;

    Ok(stream)
}

impl PlaybackSink for SpeakerSink {
    fn now(&self) -> f64 {
        let state = self.lock_state();
        state.logical_pos / self.sample_rate as f64
    }

    fn schedule(&self, buffer: PlaybackBuffer, start: f64) -> Result<SourceId, PlaybackError> {
        // Buffers are mono in this pipeline; interleaved input is downmixed.
        let samples = if buffer.channels > 1 {
            buffer
                .samples
                .chunks(buffer.channels as usize)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        } else {
            buffer.samples
        };

        let mut state = self.lock_state();
        let id = SourceId(state.next_id);
        state.next_id += 1;
        state.sources.push(PlayingSource {
            id,
            start_frame: (start * self.sample_rate as f64).round() as u64,
            samples,
        });
        Ok(id)
    }

    fn stop(&self, id: SourceId) {
        let mut state = self.lock_state();
        state.sources.retain(|s| s.id != id);
    }
}

impl Drop for SpeakerSink {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
