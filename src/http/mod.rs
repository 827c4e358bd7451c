//! HTTP API for external control (presentation shell)
//!
//! - POST /session/start - Start (or restart) the exam session
//! - POST /session/stop - Stop it and release the devices
//! - GET /session/status - Session state, stats and last error
//! - GET /session/transcript - Committed transcript
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
