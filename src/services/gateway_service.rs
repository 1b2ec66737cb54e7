use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tracing::{debug, info, warn};

use crate::{
    dto::gateway::{GatewayAck, GatewayInbound},
    state::{AdapterConnection, SharedState, answer_window::ReactionEvent},
};

const HELLO_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle of one chat adapter gateway connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound frames flowing while we await inbound ones.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(HELLO_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "gateway receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("gateway hello timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let Ok(GatewayInbound::Hello { adapter }) =
        serde_json::from_str::<GatewayInbound>(&initial_message)
    else {
        warn!("first gateway frame was not hello");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    state.adapters().insert(
        adapter.clone(),
        AdapterConnection {
            name: adapter.clone(),
            tx: outbound_tx.clone(),
        },
    );
    info!(%adapter, "adapter connected");

    let ack = GatewayAck::new(adapter.clone(), state.is_degraded());
    match serde_json::to_string(&ack) {
        Ok(payload) => {
            if outbound_tx.send(Message::Text(payload.into())).is_err() {
                state.adapters().remove(&adapter);
                finalize(writer_task, outbound_tx).await;
                return;
            }
        }
        Err(err) => warn!(error = %err, "failed to serialize gateway ack"),
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<GatewayInbound>(&text) {
                Ok(frame) => handle_frame(&state, &adapter, frame),
                Err(err) => {
                    warn!(%adapter, error = %err, "malformed gateway frame");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%adapter, "adapter closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%adapter, error = %err, "gateway error");
                break;
            }
        }
    }

    state.adapters().remove(&adapter);
    info!(%adapter, "adapter disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Apply one parsed frame. Frames never fail the connection.
pub fn handle_frame(state: &SharedState, adapter: &str, frame: GatewayInbound) {
    match frame {
        GatewayInbound::Reaction {
            channel_id,
            guild_id,
            actor_id,
            actor_name,
            actor_is_bot,
            symbol,
        } => {
            let routed = state.reactions().dispatch(ReactionEvent {
                channel_id,
                guild_id,
                actor_id,
                actor_name,
                actor_is_bot,
                emoji: symbol,
                received_at: Instant::now(),
            });
            if !routed {
                debug!(channel_id, participant_id = actor_id, "reaction outside an answer window");
            }
        }
        GatewayInbound::MemberUpdate {
            participant_id,
            display_name,
        } => {
            state.members().insert(participant_id, display_name);
        }
        GatewayInbound::Hello { .. } => {
            warn!(%adapter, "ignoring duplicate hello frame");
        }
        GatewayInbound::Unknown => {
            debug!(%adapter, "ignoring unknown gateway frame");
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[test]
    fn member_updates_fill_the_name_cache() {
        let state = AppState::new(AppConfig::default());
        handle_frame(
            &state,
            "discord",
            GatewayInbound::MemberUpdate {
                participant_id: 7,
                display_name: "Max Power".into(),
            },
        );
        assert_eq!(
            state.members().get(&7).map(|name| name.value().clone()),
            Some("Max Power".to_string())
        );
    }

    #[tokio::test]
    async fn reactions_reach_the_open_window_of_their_channel() {
        let state = AppState::new(AppConfig::default());
        let mut rx = state.reactions().open(10);

        let frame: GatewayInbound = serde_json::from_str(
            r#"{"type": "reaction", "channel_id": 10, "guild_id": 1, "actor_id": 7,
                "actor_name": "homer", "symbol": "🇧"}"#,
        )
        .unwrap();
        handle_frame(&state, "discord", frame);
        handle_frame(
            &state,
            "discord",
            GatewayInbound::Reaction {
                channel_id: 11,
                guild_id: 1,
                actor_id: 8,
                actor_name: "bart".into(),
                actor_is_bot: false,
                symbol: "🇦".into(),
            },
        );

        let event = rx.try_recv().unwrap();
        assert_eq!(event.actor_id, 7);
        assert_eq!(event.emoji, "🇧");
        assert!(rx.try_recv().is_err());
    }
}
