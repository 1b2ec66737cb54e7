//! DTO definitions for the trivia command surface.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Category,
    dto::{format_system_time, validation::validate_not_blank},
    state::{
        registry::SessionSnapshot,
        state_machine::{FinishReason, SessionPhase},
        trivia::{ChannelId, GuildId},
    },
};

/// Request to start a trivia match in the path channel.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartTriviaRequest {
    /// Guild owning the channel.
    pub guild_id: GuildId,
    /// Category key or alias (`simpsons`, `strivia`, `futurama`, ...).
    #[validate(custom(function = "validate_not_blank"))]
    pub category: String,
}

/// Result of a start command.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartTriviaResponse {
    /// `false` when the channel already hosts a session.
    pub started: bool,
    /// Match created by this command.
    pub match_id: Option<Uuid>,
    /// Questions in the match deck.
    pub questions: Option<usize>,
}

/// Result of the informational stop command.
#[derive(Debug, Serialize, ToSchema)]
pub struct StopResponse {
    /// Whether a running session was found (and the notice posted).
    pub active: bool,
}

/// Privileged stop request, carrying the invoker's permission as resolved by the adapter.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ForceStopRequest {
    /// Guild the command was issued in.
    pub guild_id: GuildId,
    /// Whether the invoker may manage the guild.
    #[serde(default)]
    pub can_manage_guild: bool,
}

/// Result of a force-stop command.
#[derive(Debug, Serialize, ToSchema)]
pub struct ForceStopResponse {
    /// `true` only when this command stopped a running session.
    pub stopped: bool,
}

/// Optional channel the global leaderboard card is posted to.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Post the card to this channel in addition to returning it.
    pub channel_id: Option<ChannelId>,
}

/// Current state of a channel session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStatusResponse {
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    /// Category being played.
    pub category: String,
    pub match_id: Option<Uuid>,
    /// Lifecycle phase label (`awaiting_round`, `collecting`, ...).
    pub phase: String,
    /// Round in progress, if any.
    pub round: Option<u32>,
    /// Whether the session still accepts new rounds.
    pub active: bool,
    /// Stop reason latched while the current round finishes.
    pub stop_requested: Option<FinishReason>,
    /// RFC 3339 timestamp of the start command.
    pub started_at: String,
}

impl From<SessionSnapshot> for SessionStatusResponse {
    fn from(value: SessionSnapshot) -> Self {
        let phase = value.machine.phase;
        Self {
            channel_id: value.channel.channel_id,
            guild_id: value.channel.guild_id,
            category: value.category_key,
            match_id: value.match_id,
            phase: phase.label().to_string(),
            round: phase.round(),
            active: value.machine.stop_requested.is_none()
                && !matches!(phase, SessionPhase::Finished(_)),
            stop_requested: value.machine.stop_requested,
            started_at: format_system_time(value.started_at),
        }
    }
}

/// Category available to start commands.
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub key: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub color: u32,
    pub thumbnail_url: Option<String>,
}

impl From<&Category> for CategoryResponse {
    fn from(value: &Category) -> Self {
        Self {
            key: value.key.clone(),
            name: value.name.clone(),
            aliases: value.aliases.clone(),
            color: value.color,
            thumbnail_url: value.thumbnail_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use validator::Validate;

    use super::*;
    use crate::state::{state_machine::Snapshot, trivia::ChannelRef};

    #[test]
    fn blank_category_is_rejected() {
        let request = StartTriviaRequest {
            guild_id: 1,
            category: "   ".into(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn status_reports_the_phase_and_latched_stop() {
        let snapshot = SessionSnapshot {
            channel: ChannelRef {
                channel_id: 10,
                guild_id: 1,
            },
            category_key: "futurama".into(),
            match_id: None,
            machine: Snapshot {
                phase: SessionPhase::Collecting { round: 3 },
                version: 4,
                stop_requested: Some(FinishReason::ForceStopped),
            },
            started_at: SystemTime::UNIX_EPOCH,
        };

        let status = SessionStatusResponse::from(snapshot);
        assert_eq!(status.phase, "collecting");
        assert_eq!(status.round, Some(3));
        assert!(!status.active);
        assert_eq!(status.started_at, "1970-01-01T00:00:00Z");
    }
}
