use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::state::{SessionState, SessionStats, TranscriptItem, TranscriptRole};
use crate::audio::playback::{decode_audio_data, PlaybackScheduler};
use crate::audio::{pcm, Analyser, AudioBackendFactory, CaptureBackend, CaptureError};
use crate::live::{LiveChannel, LiveEvent, LiveHandle, ServerMessage};

const MIC_ERROR: &str = "Could not access the microphone. Check permissions and try again.";
const CONNECT_ERROR: &str = "Connection error. Check your network and API key, then try again.";
const OUTPUT_ERROR: &str = "Could not open the audio output device.";

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Streamed transcription fragments between turn boundaries.
///
/// Committed into `TranscriptItem`s (and cleared) on turn completion;
/// never surfaced on their own.
#[derive(Default)]
struct TurnBuffers {
    user: String,
    examiner: String,
}

/// An exam session that manages capture, outbound streaming, inbound
/// message handling, playback scheduling and transcript collection.
///
/// Cheap to clone: clones share the same session. Only one run is live
/// at a time; `start` tears down any previous run first.
#[derive(Clone)]
pub struct ExamSession {
    config: SessionConfig,
    channel: Arc<dyn LiveChannel>,
    audio: Arc<dyn AudioBackendFactory>,

    state: Arc<StdMutex<SessionState>>,
    error: Arc<StdMutex<Option<String>>>,
    transcript: Arc<StdMutex<Vec<TranscriptItem>>>,
    scheduler: Arc<StdMutex<Option<PlaybackScheduler>>>,

    input_analyser: Arc<Analyser>,
    output_analyser: Arc<Analyser>,

    live: Arc<Mutex<Option<Arc<dyn LiveHandle>>>>,
    capture: Arc<Mutex<Option<Box<dyn CaptureBackend>>>>,
    event_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    capture_task: Arc<Mutex<Option<JoinHandle<()>>>>,

    /// Bumped on every teardown; tasks from an older run observe the
    /// mismatch and exit instead of touching released resources.
    generation: Arc<AtomicU64>,
    next_item_id: Arc<AtomicU64>,
    blocks_sent: Arc<AtomicUsize>,
    chunks_scheduled: Arc<AtomicUsize>,
    started_at: Arc<StdMutex<Option<DateTime<Utc>>>>,
}

impl ExamSession {
    pub fn new(
        config: SessionConfig,
        channel: Arc<dyn LiveChannel>,
        audio: Arc<dyn AudioBackendFactory>,
    ) -> Self {
        Self {
            config,
            channel,
            audio,
            state: Arc::new(StdMutex::new(SessionState::Idle)),
            error: Arc::new(StdMutex::new(None)),
            transcript: Arc::new(StdMutex::new(Vec::new())),
            scheduler: Arc::new(StdMutex::new(None)),
            input_analyser: Arc::new(Analyser::new()),
            output_analyser: Arc::new(Analyser::new()),
            live: Arc::new(Mutex::new(None)),
            capture: Arc::new(Mutex::new(None)),
            event_task: Arc::new(Mutex::new(None)),
            capture_task: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            next_item_id: Arc::new(AtomicU64::new(1)),
            blocks_sent: Arc::new(AtomicUsize::new(0)),
            chunks_scheduled: Arc::new(AtomicUsize::new(0)),
            started_at: Arc::new(StdMutex::new(None)),
        }
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    pub fn error_message(&self) -> Option<String> {
        lock(&self.error).clone()
    }

    pub fn transcript(&self) -> Vec<TranscriptItem> {
        lock(&self.transcript).clone()
    }

    pub fn input_analyser(&self) -> Arc<Analyser> {
        Arc::clone(&self.input_analyser)
    }

    pub fn output_analyser(&self) -> Arc<Analyser> {
        Arc::clone(&self.output_analyser)
    }

    pub fn stats(&self) -> SessionStats {
        let started_at = *lock(&self.started_at);
        let duration_secs = started_at
            .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);
        let active_playback = lock(&self.scheduler)
            .as_mut()
            .map(|s| s.active_count())
            .unwrap_or(0);

        SessionStats {
            state: self.state(),
            started_at,
            duration_secs,
            blocks_sent: self.blocks_sent.load(Ordering::SeqCst),
            chunks_scheduled: self.chunks_scheduled.load(Ordering::SeqCst),
            active_playback,
            transcript_items: lock(&self.transcript).len(),
        }
    }

    /// Start a run. Any previous run is fully torn down first, so this
    /// is valid from every state.
    pub async fn start(&self) -> Result<()> {
        self.stop().await;

        info!("starting session {}", self.config.session_id);
        *lock(&self.error) = None;
        self.set_state(SessionState::Connecting);
        self.blocks_sent.store(0, Ordering::SeqCst);
        self.chunks_scheduled.store(0, Ordering::SeqCst);
        *lock(&self.started_at) = Some(Utc::now());
        let gen = self.generation.load(Ordering::SeqCst);

        // Output side first, so inbound audio can play the moment the
        // channel opens. The cursor starts at zero with the scheduler.
        let sink = match self
            .audio
            .create_sink(self.config.output_sample_rate, self.output_analyser())
        {
            Ok(sink) => sink,
            Err(e) => {
                error!("failed to open output device: {}", e);
                self.fail(OUTPUT_ERROR).await;
                return Err(anyhow::Error::new(e));
            }
        };
        *lock(&self.scheduler) = Some(PlaybackScheduler::new(sink));

        let (handle, events) = match self.channel.connect(&self.config.live).await {
            Ok(pair) => pair,
            Err(e) => {
                error!("failed to open realtime channel: {}", e);
                self.fail(CONNECT_ERROR).await;
                return Err(anyhow::Error::new(e));
            }
        };
        *self.live.lock().await = Some(handle);

        let session = self.clone();
        let task = tokio::spawn(async move { session.event_loop(gen, events).await });
        *self.event_task.lock().await = Some(task);

        Ok(())
    }

    /// Stop the session and return to `Idle`. Idempotent and safe from
    /// any state; the transcript log is cleared.
    pub async fn stop(&self) {
        self.teardown_to(SessionState::Idle).await;
        for slot in [&self.event_task, &self.capture_task] {
            if let Some(task) = slot.lock().await.take() {
                task.abort();
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        *lock(&self.state) = state;
        debug!("session state -> {}", state.as_str());
    }

    async fn fail(&self, message: &str) {
        *lock(&self.error) = Some(message.to_string());
        self.teardown_to(SessionState::Error).await;
    }

    /// Best-effort teardown: every step runs even if an earlier one
    /// fails, so no device or channel is left open behind us.
    async fn teardown_to(&self, final_state: SessionState) {
        self.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(handle) = self.live.lock().await.take() {
            if let Err(e) = handle.close().await {
                debug!("closing realtime channel: {}", e);
            }
        }
        if let Some(mut backend) = self.capture.lock().await.take() {
            if let Err(e) = backend.stop().await {
                warn!("stopping capture backend: {}", e);
            }
        }
        if let Some(mut scheduler) = lock(&self.scheduler).take() {
            // Silence anything still scheduled; dropping the scheduler
            // releases the output device.
            scheduler.interrupt();
        }
        lock(&self.transcript).clear();
        self.set_state(final_state);
    }

    async fn event_loop(self, gen: u64, mut events: mpsc::Receiver<LiveEvent>) {
        let mut pending = TurnBuffers::default();

        while let Some(event) = events.recv().await {
            if self.generation.load(Ordering::SeqCst) != gen {
                break;
            }
            match event {
                LiveEvent::Open => match self.wire_capture(gen).await {
                    Ok(()) => {
                        info!("session active");
                        self.set_state(SessionState::Active);
                    }
                    Err(e) => {
                        error!("failed to wire capture: {}", e);
                        self.fail(MIC_ERROR).await;
                        break;
                    }
                },
                LiveEvent::Message(message) => self.apply_message(&mut pending, message),
                LiveEvent::Closed => {
                    if matches!(
                        self.state(),
                        SessionState::Active | SessionState::Connecting
                    ) {
                        info!("remote closed the session");
                        self.set_state(SessionState::Finished);
                    }
                    break;
                }
                LiveEvent::Error(e) => {
                    error!("realtime channel error: {}", e);
                    self.fail(CONNECT_ERROR).await;
                    break;
                }
            }
        }
        debug!("event loop stopped");
    }

    /// Acquire the microphone and stream encoded blocks outbound.
    async fn wire_capture(&self, gen: u64) -> Result<(), CaptureError> {
        let mut backend = self
            .audio
            .create_capture(&self.config.capture_config(), self.input_analyser())?;
        let mut blocks = backend.start().await?;
        *self.capture.lock().await = Some(backend);

        let Some(handle) = self.live.lock().await.clone() else {
            // Torn down while the microphone was opening.
            return Ok(());
        };

        let generation = Arc::clone(&self.generation);
        let blocks_sent = Arc::clone(&self.blocks_sent);
        let task = tokio::spawn(async move {
            while let Some(block) = blocks.recv().await {
                if generation.load(Ordering::SeqCst) != gen {
                    break;
                }
                let blob = pcm::encode_blob(&block.samples, block.sample_rate);
                // Fire and forget: a failed send drops this block only.
                match handle.send_realtime_input(blob).await {
                    Ok(()) => {
                        blocks_sent.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => debug!("dropping outbound audio block: {}", e),
                }
            }
            debug!("capture task stopped");
        });
        *self.capture_task.lock().await = Some(task);

        Ok(())
    }

    /// Apply one inbound message. Called from the single event loop, so
    /// messages are processed strictly in arrival order.
    fn apply_message(&self, pending: &mut TurnBuffers, message: ServerMessage) {
        let Some(content) = message.server_content else {
            return;
        };

        if let Some(fragment) = &content.input_transcription {
            pending.user.push_str(&fragment.text);
        }
        if let Some(fragment) = &content.output_transcription {
            pending.examiner.push_str(&fragment.text);
        }

        if content.turn_complete {
            self.commit_turn(pending);
        }

        // Barge-in wins over any audio bundled in the same message.
        if content.interrupted {
            if let Some(scheduler) = lock(&self.scheduler).as_mut() {
                scheduler.interrupt();
            }
        }

        if let Some(data) = content.inline_audio() {
            match pcm::decode_base64(data) {
                Ok(bytes) => {
                    let buffer =
                        decode_audio_data(&bytes, self.config.output_sample_rate, 1);
                    if !buffer.is_empty() {
                        if let Some(scheduler) = lock(&self.scheduler).as_mut() {
                            match scheduler.enqueue(buffer) {
                                Ok(_) => {
                                    self.chunks_scheduled.fetch_add(1, Ordering::SeqCst);
                                }
                                Err(e) => warn!("failed to schedule audio chunk: {}", e),
                            }
                        }
                    }
                }
                Err(e) => warn!("skipping malformed audio chunk: {}", e),
            }
        }
    }

    /// Commit pending transcription into the log, user side first.
    fn commit_turn(&self, pending: &mut TurnBuffers) {
        let mut transcript = lock(&self.transcript);
        for (role, buffer) in [
            (TranscriptRole::User, &mut pending.user),
            (TranscriptRole::Examiner, &mut pending.examiner),
        ] {
            if buffer.trim().is_empty() {
                continue;
            }
            transcript.push(TranscriptItem {
                id: self.next_item_id.fetch_add(1, Ordering::SeqCst),
                role,
                text: std::mem::take(buffer),
                timestamp: Utc::now(),
                is_final: true,
            });
        }
    }
}
