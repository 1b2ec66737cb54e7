use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/cards",
    tag = "sse",
    responses((status = 200, description = "Presentation cards stream", content_type = "text/event-stream", body = String))
)]
/// Stream question, reveal, notice and scoreboard cards to chat adapters.
pub async fn cards_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let (handshake, receiver) = sse_service::subscribe_cards(&state);
    info!("New card SSE connection");
    sse_service::to_sse_stream(handshake, receiver)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/cards", get(cards_stream))
}
