use super::state::AppState;
use crate::session::{SessionStats, TranscriptItem};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub state: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub state: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub error: Option<String>,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Start (or restart) the exam session
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("start requested");

    match state.session.start().await {
        Ok(()) => (
            StatusCode::OK,
            Json(StartSessionResponse {
                state: state.session.state().as_str().to_string(),
                message: "Session starting".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("failed to start session: {}", e);
            let error = state
                .session
                .error_message()
                .unwrap_or_else(|| format!("Failed to start session: {}", e));
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error }))
                .into_response()
        }
    }
}

/// POST /session/stop
/// Stop the session and release all audio resources
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("stop requested");

    state.session.stop().await;
    (
        StatusCode::OK,
        Json(StopSessionResponse {
            state: state.session.state().as_str().to_string(),
            stats: state.session.stats(),
        }),
    )
        .into_response()
}

/// GET /session/status
pub async fn session_status(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(StatusResponse {
            error: state.session.error_message(),
            stats: state.session.stats(),
        }),
    )
        .into_response()
}

/// GET /session/transcript
/// Committed transcript items so far, in turn order
pub async fn session_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let transcript: Vec<TranscriptItem> = state.session.transcript();
    (StatusCode::OK, Json(transcript)).into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
