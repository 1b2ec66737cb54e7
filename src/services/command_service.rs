//! Business logic behind the command routes: cooldowns, permissions and the
//! notices each command posts before delegating to the session manager.

use tracing::{debug, info};

use crate::{
    dto::{
        card::Card,
        commands::{
            CategoryResponse, ForceStopResponse, SessionStatusResponse, StartTriviaResponse,
            StopResponse,
        },
    },
    error::ServiceError,
    services::{
        card_events, leaderboard_service,
        session_service::{self, SessionStart},
    },
    state::{
        SharedState,
        cooldown::CommandBucket,
        state_machine::FinishReason,
        trivia::{ChannelId, ChannelRef},
    },
};

const STOP_NOTICE: &str = "The game of trivia will end once nobody answers a question or a \
                           member with manage server permissions uses the forcestop command.";
const FORCE_STOP_NOTICE: &str = "Trivia has ended";

fn enforce_cooldown(
    state: &SharedState,
    channel_id: ChannelId,
    bucket: CommandBucket,
) -> Result<(), ServiceError> {
    let cooldowns = state.config().cooldowns();
    state.cooldowns().prune(cooldowns);
    let rule = match bucket {
        CommandBucket::Start => cooldowns.start,
        CommandBucket::Stop => cooldowns.stop,
    };
    state
        .cooldowns()
        .check(channel_id, bucket, rule)
        .map_err(|retry_after| {
            debug!(
                channel_id,
                ?bucket,
                retry_after_ms = retry_after.as_millis() as u64,
                "command on cooldown"
            );
            ServiceError::RateLimited { retry_after }
        })
}

/// Start a match in `channel`. A channel already playing is answered with
/// `started = false` instead of an error.
pub async fn start_trivia(
    state: &SharedState,
    channel: ChannelRef,
    category_key: &str,
) -> Result<StartTriviaResponse, ServiceError> {
    if state.config().category(category_key).is_none() {
        return Err(ServiceError::NotFound(format!(
            "unknown trivia category `{category_key}`"
        )));
    }
    enforce_cooldown(state, channel.channel_id, CommandBucket::Start)?;

    match session_service::start_session(state, channel, category_key).await? {
        SessionStart::AlreadyRunning => Ok(StartTriviaResponse {
            started: false,
            match_id: None,
            questions: None,
        }),
        SessionStart::Started(started) => Ok(StartTriviaResponse {
            started: true,
            match_id: Some(started.match_id),
            questions: Some(started.questions),
        }),
    }
}

/// Informational stop: explains how games end without touching the session.
pub fn stop(state: &SharedState, channel_id: ChannelId) -> Result<StopResponse, ServiceError> {
    enforce_cooldown(state, channel_id, CommandBucket::Stop)?;

    let active = state.sessions().is_active(channel_id);
    if active {
        card_events::post_card(state, &Card::notice(channel_id, STOP_NOTICE));
    }
    Ok(StopResponse { active })
}

/// Privileged stop. The open answer window still runs to completion; the
/// session ends before the next round.
pub fn force_stop(
    state: &SharedState,
    channel: ChannelRef,
    can_manage_guild: bool,
) -> Result<ForceStopResponse, ServiceError> {
    if !can_manage_guild {
        return Err(ServiceError::Unauthorized(
            "force stop requires the manage server permission".into(),
        ));
    }
    let channel_id = channel.channel_id;
    if state
        .sessions()
        .snapshot(channel_id)
        .is_some_and(|session| session.channel.guild_id != channel.guild_id)
    {
        return Err(ServiceError::InvalidInput(format!(
            "channel {channel_id} does not belong to guild {}",
            channel.guild_id
        )));
    }

    let stopped = state
        .sessions()
        .request_stop(channel_id, FinishReason::ForceStopped);
    if stopped {
        info!(channel_id, "trivia force-stopped");
        card_events::post_card(state, &Card::notice(channel_id, FORCE_STOP_NOTICE));
    }
    Ok(ForceStopResponse { stopped })
}

/// Global leaderboard card, optionally posted to `post_to` as well.
pub async fn leaderboard(
    state: &SharedState,
    post_to: Option<ChannelId>,
) -> Result<Option<Card>, ServiceError> {
    let store = state.require_store().await?;
    let Some(card) = leaderboard_service::global_leaderboard(&store, state.config()).await? else {
        return Ok(None);
    };

    if let Some(channel_id) = post_to {
        card_events::post_card(state, &card.clone().in_channel(channel_id));
    }
    Ok(Some(card))
}

/// Status of the session running in `channel_id`.
pub fn session_status(
    state: &SharedState,
    channel_id: ChannelId,
) -> Result<SessionStatusResponse, ServiceError> {
    state
        .sessions()
        .snapshot(channel_id)
        .map(SessionStatusResponse::from)
        .ok_or_else(|| ServiceError::NotFound(format!("no trivia session in channel {channel_id}")))
}

/// Every configured category.
pub fn categories(state: &SharedState) -> Vec<CategoryResponse> {
    state
        .config()
        .categories()
        .iter()
        .map(CategoryResponse::from)
        .collect()
}
