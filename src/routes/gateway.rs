use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{services::gateway_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/gateway",
    tag = "gateway",
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a chat adapter gateway session.
pub async fn gateway_handler(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| gateway_service::handle_socket(state, socket))
}

/// Configure the gateway endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/gateway", get(gateway_handler))
}
