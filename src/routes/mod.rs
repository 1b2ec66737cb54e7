use axum::Router;

use crate::state::SharedState;

pub mod commands;
pub mod docs;
pub mod gateway;
pub mod health;
pub mod sse;

/// Compose the command, streaming, gateway and documentation routes over shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(commands::router())
        .merge(sse::router())
        .merge(gateway::router())
        .merge(docs::router());

    api_router.with_state(state)
}
