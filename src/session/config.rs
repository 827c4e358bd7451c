use crate::audio::{CaptureConfig, CaptureConstraints};
use crate::live::LiveConfig;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";
pub const DEFAULT_VOICE: &str = "Fenrir";

/// Examiner persona and the three-part exam script, sent verbatim as the
/// system instruction when the channel opens.
pub const EXAMINER_INSTRUCTION: &str = "\
You are Mr. Sterling, a professional, strict but fair IELTS Speaking Examiner. \
Conduct a full IELTS speaking test which has 3 parts.

PART 1: Introduction & Interview (4-5 minutes). Ask about the user (home, work, studies) and then 1-2 familiar topics.
PART 2: Individual Long Turn. Give the user a topic. Tell them they have 1 minute to think. IMPORTANT: You must simulate silence for 1 minute while they think, then ask them to speak for 2 minutes. Stop them if they go over.
PART 3: Two-way Discussion (4-5 minutes). Ask abstract questions related to Part 2.

Guidelines:
- Only speak audio.
- Keep your turns relatively short to allow the student to speak.
- Be encouraging but formal.
- Do not break character.
- Start by introducing yourself and checking the candidate's ID.";

/// Configuration for one exam session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "session-<uuid>")
    pub session_id: String,

    /// Realtime channel parameters (model, voice, persona, credentials)
    pub live: LiveConfig,

    /// Capture side rate; the Live API expects 16kHz input
    pub input_sample_rate: u32,

    /// Playback side rate; model audio arrives at 24kHz
    pub output_sample_rate: u32,

    /// Frames per outbound capture block
    pub block_frames: usize,

    /// Input processing requested from the capture device
    pub constraints: CaptureConstraints,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            live: LiveConfig {
                model: DEFAULT_MODEL.to_string(),
                voice: DEFAULT_VOICE.to_string(),
                system_instruction: EXAMINER_INSTRUCTION.to_string(),
                api_key: String::new(),
            },
            input_sample_rate: 16_000,
            output_sample_rate: 24_000,
            block_frames: 4096,
            constraints: CaptureConstraints::default(),
        }
    }
}

impl SessionConfig {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.input_sample_rate,
            block_frames: self.block_frames,
            constraints: self.constraints,
        }
    }
}
