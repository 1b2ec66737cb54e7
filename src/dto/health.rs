use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Channels with a running session task.
    pub active_sessions: usize,
    /// Connected chat adapters.
    pub adapters: usize,
}

impl HealthResponse {
    /// The engine has a working store.
    pub fn ok() -> Self {
        Self::with_status("ok")
    }

    /// The engine runs without storage; start commands are refused.
    pub fn degraded() -> Self {
        Self::with_status("degraded")
    }

    fn with_status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            active_sessions: 0,
            adapters: 0,
        }
    }

    /// Attach session and adapter counts.
    pub fn with_activity(mut self, active_sessions: usize, adapters: usize) -> Self {
        self.active_sessions = active_sessions;
        self.adapters = adapters;
        self
    }
}
