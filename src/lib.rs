pub mod audio;
pub mod config;
pub mod http;
pub mod live;
pub mod session;
pub mod visualizer;

pub use audio::{
    Analyser, AudioBackendFactory, CaptureBackend, CaptureBlock, CaptureConfig,
    CaptureConstraints, CpalAudio, PlaybackBuffer, PlaybackScheduler, PlaybackSink,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use live::{GeminiLive, LiveChannel, LiveConfig, LiveEvent, LiveHandle, ServerMessage};
pub use session::{
    ExamSession, SessionConfig, SessionState, SessionStats, TranscriptItem, TranscriptRole,
};
