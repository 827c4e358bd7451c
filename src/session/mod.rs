//! Live exam session orchestration
//!
//! This module provides the `ExamSession` abstraction that owns:
//! - The session state machine (idle/connecting/active/error/finished)
//! - Microphone capture and outbound PCM streaming
//! - Inbound message handling (audio, transcript fragments, barge-in)
//! - Playback scheduling and transcript reconciliation

mod config;
mod session;
mod state;

pub use config::{SessionConfig, DEFAULT_MODEL, DEFAULT_VOICE, EXAMINER_INSTRUCTION};
pub use session::ExamSession;
pub use state::{SessionState, SessionStats, TranscriptItem, TranscriptRole};
