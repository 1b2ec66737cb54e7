use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    state::SharedState,
};

const CARD_STREAM: &str = "cards";

/// Subscribe to the card stream, queueing the handshake as its first event.
pub fn subscribe_cards(state: &SharedState) -> (ServerEvent, broadcast::Receiver<ServerEvent>) {
    let receiver = state.cards().subscribe();
    let handshake = Handshake {
        stream: CARD_STREAM.to_string(),
        message: "subscribed to trivia cards".to_string(),
        degraded: state.is_degraded(),
    };
    let first = ServerEvent::json(Some("handshake".to_string()), &handshake).unwrap_or_else(|err| {
        warn!(error = %err, "failed to serialize handshake");
        ServerEvent::new(Some("handshake".to_string()), "{}".to_string())
    });
    info!(subscribers = state.cards().subscriber_count(), "card stream subscribed");
    (first, receiver)
}

/// Convert a broadcast receiver into an SSE response, forwarding events until
/// the client disconnects.
pub fn to_sse_stream(
    first: ServerEvent,
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(to_event(first))).await.is_err() {
            return;
        }
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Cards are transient; keep the stream alive.
                            warn!(skipped, "card stream subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }
        info!("card stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}
