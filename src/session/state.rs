use chrono::{DateTime, Utc};
use serde::Serialize;

/// Session lifecycle. Exactly one value at a time, owned by the
/// orchestrator; every transition is observable through `stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Error,
    Finished,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Error => "error",
            SessionState::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Examiner,
}

/// One committed turn of the conversation.
///
/// Created only when a turn completes with accumulated text; immutable
/// afterwards. Ids are generation-ordered within the process.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptItem {
    pub id: u64,
    pub role: TranscriptRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub is_final: bool,
}

/// Statistics about a running or finished session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub state: SessionState,

    /// When the current run started, if it ever did
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds since the run started
    pub duration_secs: f64,

    /// Capture blocks successfully pushed to the outbound stream
    pub blocks_sent: usize,

    /// Inbound audio chunks handed to the playback scheduler
    pub chunks_scheduled: usize,

    /// Scheduled-but-unfinished playback sources right now
    pub active_playback: usize,

    /// Committed transcript items
    pub transcript_items: usize,
}
