//! Realtime streaming channel to the conversational model
//!
//! The session orchestrator only sees the narrow surface in this module:
//! `connect` yields a send handle plus an ordered event stream. Wire
//! semantics (framing, setup handshake, transcription config) live in
//! the concrete [`GeminiLive`] client and can be swapped for any
//! equivalent realtime audio backend.

pub mod client;
pub mod messages;

pub use client::GeminiLive;
pub use messages::ServerMessage;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::pcm::AudioBlob;

/// Connection parameters for one live session.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Model identifier, e.g. `gemini-2.5-flash-native-audio-preview-09-2025`
    pub model: String,
    /// Prebuilt voice for spoken responses
    pub voice: String,
    /// Examiner persona and exam script sent as the system instruction
    pub system_instruction: String,
    /// API key; absence surfaces as a connection failure at start
    pub api_key: String,
}

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("API key is not set (GEMINI_API_KEY)")]
    MissingApiKey,
    #[error("failed to open realtime channel: {0}")]
    Connect(String),
    #[error("failed to send on realtime channel: {0}")]
    Send(String),
}

/// Channel lifecycle and inbound traffic, delivered in arrival order.
#[derive(Debug)]
pub enum LiveEvent {
    /// Setup acknowledged; the session may wire up capture.
    Open,
    Message(ServerMessage),
    Closed,
    Error(String),
}

/// Send side of an open channel.
///
/// `close` is best-effort; once the transport shuts down, the event
/// stream handed out by `connect` ends with `Closed`.
#[async_trait::async_trait]
pub trait LiveHandle: Send + Sync {
    async fn send_realtime_input(&self, media: AudioBlob) -> Result<(), LiveError>;
    async fn close(&self) -> Result<(), LiveError>;
}

#[async_trait::async_trait]
pub trait LiveChannel: Send + Sync {
    async fn connect(
        &self,
        config: &LiveConfig,
    ) -> Result<(Arc<dyn LiveHandle>, mpsc::Receiver<LiveEvent>), LiveError>;
}
