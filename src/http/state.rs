use crate::session::ExamSession;

/// Shared application state for HTTP handlers.
///
/// A deployment owns exactly one session; starting it again tears the
/// previous run down, so no map of concurrent sessions is needed.
#[derive(Clone)]
pub struct AppState {
    pub session: ExamSession,
}

impl AppState {
    pub fn new(session: ExamSession) -> Self {
        Self { session }
    }
}
