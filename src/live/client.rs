//! WebSocket client for the Gemini Live API

use std::sync::Arc;

use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::messages::{RealtimeInputFrame, ServerMessage, SetupFrame};
use super::{LiveChannel, LiveConfig, LiveError, LiveEvent, LiveHandle};
use crate::audio::pcm::AudioBlob;

const DEFAULT_ENDPOINT: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Concrete realtime channel talking BidiGenerateContent.
///
/// No retry or backoff: a connection that never acknowledges setup stays
/// pending until the caller tears the session down.
pub struct GeminiLive {
    endpoint: String,
}

impl GeminiLive {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl Default for GeminiLive {
    fn default() -> Self {
        Self::new()
    }
}

struct GeminiHandle {
    sink: Mutex<WsSink>,
}

#[async_trait::async_trait]
impl LiveHandle for GeminiHandle {
    async fn send_realtime_input(&self, media: AudioBlob) -> Result<(), LiveError> {
        let frame = RealtimeInputFrame::media(media);
        let payload =
            serde_json::to_string(&frame).map_err(|e| LiveError::Send(e.to_string()))?;
        self.sink
            .lock()
            .await
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| LiveError::Send(e.to_string()))
    }

    async fn close(&self) -> Result<(), LiveError> {
        self.sink
            .lock()
            .await
            .send(Message::Close(None))
            .await
            .map_err(|e| LiveError::Send(e.to_string()))
    }
}

#[async_trait::async_trait]
impl LiveChannel for GeminiLive {
    async fn connect(
        &self,
        config: &LiveConfig,
    ) -> Result<(Arc<dyn LiveHandle>, mpsc::Receiver<LiveEvent>), LiveError> {
        if config.api_key.is_empty() {
            return Err(LiveError::MissingApiKey);
        }

        let url = format!("{}?key={}", self.endpoint, config.api_key);
        let (stream, _) = connect_async(&url)
            .await
            .map_err(|e| LiveError::Connect(e.to_string()))?;
        info!("realtime channel connected: model={}", config.model);

        let (mut sink, mut source) = stream.split();

        let setup = SetupFrame::for_config(config);
        let payload =
            serde_json::to_string(&setup).map_err(|e| LiveError::Connect(e.to_string()))?;
        sink.send(Message::Text(payload.into()))
            .await
            .map_err(|e| LiveError::Connect(e.to_string()))?;

        let (event_tx, event_rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut opened = false;
            while let Some(frame) = source.next().await {
                let payload = match frame {
                    Ok(Message::Text(text)) => text.as_bytes().to_vec(),
                    // The Live API delivers JSON in binary frames as well.
                    Ok(Message::Binary(bytes)) => bytes.to_vec(),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = event_tx.send(LiveEvent::Error(e.to_string())).await;
                        return;
                    }
                };

                let message: ServerMessage = match serde_json::from_slice(&payload) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("unparseable server frame, skipping: {}", e);
                        continue;
                    }
                };

                if message.setup_complete.is_some() && !opened {
                    opened = true;
                    debug!("setup acknowledged");
                    if event_tx.send(LiveEvent::Open).await.is_err() {
                        return;
                    }
                    continue;
                }

                if event_tx.send(LiveEvent::Message(message)).await.is_err() {
                    return;
                }
            }
            let _ = event_tx.send(LiveEvent::Closed).await;
        });

        let handle = Arc::new(GeminiHandle {
            sink: Mutex::new(sink),
        });
        Ok((handle, event_rx))
    }
}
