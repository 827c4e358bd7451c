// Shared fakes for integration tests: a manual-clock playback sink, a
// scripted realtime channel, and an in-memory capture backend.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use viva_coach::audio::{
    Analyser, AudioBackendFactory, AudioBlob, CaptureBackend, CaptureBlock, CaptureConfig,
    CaptureError, PlaybackBuffer, PlaybackError, PlaybackSink, SourceId,
};
use viva_coach::live::messages::{
    InlineData, ModelPart, ModelTurn, ServerContent, ServerMessage, Transcription,
};
use viva_coach::live::{LiveChannel, LiveConfig, LiveError, LiveEvent, LiveHandle};
use viva_coach::{ExamSession, SessionState};

// ---------------------------------------------------------------------------
// Playback sink with a hand-cranked clock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScheduledChunk {
    pub id: SourceId,
    pub start: f64,
    pub duration: f64,
}

pub struct MockSink {
    clock: Mutex<f64>,
    next_id: AtomicU64,
    pub scheduled: Mutex<Vec<ScheduledChunk>>,
    pub stopped: Mutex<Vec<SourceId>>,
}

impl MockSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            clock: Mutex::new(0.0),
            next_id: AtomicU64::new(0),
            scheduled: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
        })
    }

    pub fn set_clock(&self, now: f64) {
        *self.clock.lock().unwrap() = now;
    }

    pub fn starts(&self) -> Vec<f64> {
        self.scheduled.lock().unwrap().iter().map(|c| c.start).collect()
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.lock().unwrap().len()
    }

    pub fn stopped_count(&self) -> usize {
        self.stopped.lock().unwrap().len()
    }
}

impl PlaybackSink for MockSink {
    fn now(&self) -> f64 {
        *self.clock.lock().unwrap()
    }

    fn schedule(&self, buffer: PlaybackBuffer, start: f64) -> Result<SourceId, PlaybackError> {
        let id = SourceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.scheduled.lock().unwrap().push(ScheduledChunk {
            id,
            start,
            duration: buffer.duration_secs(),
        });
        Ok(id)
    }

    fn stop(&self, id: SourceId) {
        self.stopped.lock().unwrap().push(id);
    }
}

// ---------------------------------------------------------------------------
// Capture backend fed from a prepared block list
// ---------------------------------------------------------------------------

pub struct FakeCapture {
    blocks: Vec<CaptureBlock>,
    capturing: bool,
}

#[async_trait::async_trait]
impl CaptureBackend for FakeCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureBlock>, CaptureError> {
        let (tx, rx) = mpsc::channel(32);
        for block in self.blocks.drain(..) {
            tx.try_send(block).expect("fake capture channel overflow");
        }
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "fake-capture"
    }
}

pub struct FakeAudio {
    pub sink: Arc<MockSink>,
    pub capture_blocks: Mutex<Vec<CaptureBlock>>,
    pub fail_capture: AtomicBool,
}

impl FakeAudio {
    pub fn new(sink: Arc<MockSink>) -> Arc<Self> {
        Arc::new(Self {
            sink,
            capture_blocks: Mutex::new(Vec::new()),
            fail_capture: AtomicBool::new(false),
        })
    }

    pub fn queue_blocks(&self, count: usize, frames: usize) {
        let mut blocks = self.capture_blocks.lock().unwrap();
        for _ in 0..count {
            blocks.push(CaptureBlock {
                samples: vec![0.1; frames],
                sample_rate: 16_000,
            });
        }
    }
}

impl AudioBackendFactory for FakeAudio {
    fn create_capture(
        &self,
        _config: &CaptureConfig,
        _analyser: Arc<Analyser>,
    ) -> Result<Box<dyn CaptureBackend>, CaptureError> {
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(CaptureError::NoDevice);
        }
        let blocks = std::mem::take(&mut *self.capture_blocks.lock().unwrap());
        Ok(Box::new(FakeCapture {
            blocks,
            capturing: false,
        }))
    }

    fn create_sink(
        &self,
        _sample_rate: u32,
        _analyser: Arc<Analyser>,
    ) -> Result<Arc<dyn PlaybackSink>, PlaybackError> {
        Ok(Arc::clone(&self.sink) as Arc<dyn PlaybackSink>)
    }
}

// ---------------------------------------------------------------------------
// Scripted realtime channel
// ---------------------------------------------------------------------------

pub struct FakeHandle {
    pub sent: Arc<Mutex<Vec<AudioBlob>>>,
    pub closed: Arc<AtomicBool>,
    pub fail_send: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl LiveHandle for FakeHandle {
    async fn send_realtime_input(&self, media: AudioBlob) -> Result<(), LiveError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(LiveError::Send("stream rejected chunk".into()));
        }
        self.sent.lock().unwrap().push(media);
        Ok(())
    }

    async fn close(&self) -> Result<(), LiveError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeChannel {
    script: Mutex<Option<Vec<LiveEvent>>>,
    tx: Mutex<Option<mpsc::Sender<LiveEvent>>>,
    pub fail_connect: AtomicBool,
    pub sent: Arc<Mutex<Vec<AudioBlob>>>,
    pub closed: Arc<AtomicBool>,
    pub fail_send: Arc<AtomicBool>,
}

impl FakeChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(None),
            tx: Mutex::new(None),
            fail_connect: AtomicBool::new(false),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            fail_send: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Events delivered immediately after the next `connect`.
    pub fn preload(&self, events: Vec<LiveEvent>) {
        *self.script.lock().unwrap() = Some(events);
    }

    /// Deliver an event on the currently open stream.
    pub async fn push(&self, event: LiveEvent) {
        let tx = self.tx.lock().unwrap().clone().expect("channel not connected");
        tx.send(event).await.expect("event stream dropped");
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LiveChannel for FakeChannel {
    async fn connect(
        &self,
        _config: &LiveConfig,
    ) -> Result<(Arc<dyn LiveHandle>, mpsc::Receiver<LiveEvent>), LiveError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(LiveError::Connect("connection refused".into()));
        }

        let (tx, rx) = mpsc::channel(64);
        if let Some(events) = self.script.lock().unwrap().take() {
            for event in events {
                tx.try_send(event).expect("scripted event overflow");
            }
        }
        *self.tx.lock().unwrap() = Some(tx);
        self.closed.store(false, Ordering::SeqCst);

        let handle = Arc::new(FakeHandle {
            sent: Arc::clone(&self.sent),
            closed: Arc::clone(&self.closed),
            fail_send: Arc::clone(&self.fail_send),
        });
        Ok((handle, rx))
    }
}

// ---------------------------------------------------------------------------
// Message builders and helpers
// ---------------------------------------------------------------------------

pub fn content_message(content: ServerContent) -> LiveEvent {
    LiveEvent::Message(ServerMessage {
        setup_complete: None,
        server_content: Some(content),
    })
}

pub fn audio_message(base64_data: &str) -> LiveEvent {
    content_message(ServerContent {
        model_turn: Some(ModelTurn {
            parts: vec![ModelPart {
                inline_data: Some(InlineData {
                    mime_type: Some("audio/pcm;rate=24000".into()),
                    data: base64_data.to_string(),
                }),
            }],
        }),
        ..Default::default()
    })
}

pub fn user_fragment(text: &str) -> LiveEvent {
    content_message(ServerContent {
        input_transcription: Some(Transcription { text: text.into() }),
        ..Default::default()
    })
}

pub fn examiner_fragment(text: &str) -> LiveEvent {
    content_message(ServerContent {
        output_transcription: Some(Transcription { text: text.into() }),
        ..Default::default()
    })
}

pub fn turn_complete() -> LiveEvent {
    content_message(ServerContent {
        turn_complete: true,
        ..Default::default()
    })
}

pub fn interruption() -> LiveEvent {
    content_message(ServerContent {
        interrupted: true,
        ..Default::default()
    })
}

/// PCM of `frames` mono samples at 24kHz, base64-encoded. One frame is
/// 1/24000s, so 24000 frames make a one-second chunk.
pub fn pcm_chunk(frames: usize) -> String {
    use base64::Engine;
    let bytes: Vec<u8> = std::iter::repeat([0x00, 0x10]).take(frames).flatten().collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub async fn wait_for_state(session: &ExamSession, state: SessionState) {
    wait_until(|| session.state() == state, &format!("state {:?}", state)).await;
}

pub async fn wait_until(mut predicate: impl FnMut() -> bool, what: &str) {
    for _ in 0..400 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {}", what);
}
