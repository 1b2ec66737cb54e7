use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Health payload; probes the store when one is installed.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let status = if state.is_degraded() {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    };
    status.with_activity(state.sessions().len(), state.adapters().len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::trivia_store::InMemoryTriviaStore, state::AppState};

    #[tokio::test]
    async fn status_follows_the_degraded_flag() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, "degraded");

        state
            .install_store(Arc::new(InMemoryTriviaStore::new()))
            .await;
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.active_sessions, 0);
    }
}
