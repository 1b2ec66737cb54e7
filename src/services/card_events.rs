use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        card::{Card, CardKind},
        sse::{ServerEvent, SystemStatus},
    },
    state::SharedState,
};

const EVENT_CARD_QUESTION: &str = "card.question";
const EVENT_CARD_REVEAL: &str = "card.reveal";
const EVENT_CARD_NOTICE: &str = "card.notice";
const EVENT_CARD_SCOREBOARD: &str = "card.scoreboard";
const EVENT_CARD_LEADERBOARD: &str = "card.leaderboard";
const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Hand a card to every connected adapter for posting in its channel.
pub fn post_card(state: &SharedState, card: &Card) {
    send_event(state, event_name(card.kind), card);
}

/// Broadcast a degraded-mode change.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

fn event_name(kind: CardKind) -> &'static str {
    match kind {
        CardKind::Question => EVENT_CARD_QUESTION,
        CardKind::Reveal => EVENT_CARD_REVEAL,
        CardKind::Notice => EVENT_CARD_NOTICE,
        CardKind::Scoreboard => EVENT_CARD_SCOREBOARD,
        CardKind::Leaderboard => EVENT_CARD_LEADERBOARD,
    }
}

fn send_event<T: Serialize>(state: &SharedState, event: &str, payload: &T) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(message) => state.cards().broadcast(message),
        Err(err) => warn!(event, error = %err, "failed to serialize card event"),
    }
}
