use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::trivia::{ChannelId, GuildId, ParticipantId};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Frames accepted from chat adapter gateway connections.
#[serde(tag = "type")]
pub enum GatewayInbound {
    /// First frame of every connection.
    #[serde(rename = "hello")]
    Hello { adapter: String },
    /// A user added a reaction to a message.
    #[serde(rename = "reaction")]
    Reaction {
        channel_id: ChannelId,
        guild_id: GuildId,
        actor_id: ParticipantId,
        actor_name: String,
        #[serde(default)]
        actor_is_bot: bool,
        /// Reaction emoji as sent by the platform.
        symbol: String,
    },
    /// A guild member's display name changed or was resolved.
    #[serde(rename = "member_update")]
    MemberUpdate {
        participant_id: ParticipantId,
        display_name: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, ToSchema)]
/// Acknowledgement sent after a successful `hello`.
pub struct GatewayAck {
    #[serde(rename = "type")]
    pub kind: String,
    pub adapter: String,
    /// Whether the engine currently runs without storage.
    pub degraded: bool,
}

impl GatewayAck {
    pub fn new(adapter: String, degraded: bool) -> Self {
        Self {
            kind: "ack".to_string(),
            adapter,
            degraded,
        }
    }
}
