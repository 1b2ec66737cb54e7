use std::sync::Arc;

use rand::{SeedableRng, rngs::StdRng};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    dao::models::MatchId,
    dto::card::Card,
    error::ServiceError,
    services::{
        card_events, leaderboard_service, question_bank,
        round_service::{self, RoundContext},
    },
    state::{
        SharedState,
        state_machine::{FinishReason, SessionEvent, SessionPhase},
        trivia::{ChannelRef, Deck},
    },
};

const FAILURE_NOTICE: &str = "⛔ **Trivia has ended due to an error.**";

/// Outcome of a start request.
#[derive(Debug)]
pub enum SessionStart {
    /// The channel already hosts a session; nothing changed.
    AlreadyRunning,
    /// A new match was created and its session task spawned.
    Started(StartedSession),
}

/// Handle on a freshly started session.
#[derive(Debug)]
pub struct StartedSession {
    pub match_id: MatchId,
    /// Questions in the shuffled deck.
    pub questions: usize,
    /// Session task; it releases the channel when it exits.
    pub handle: JoinHandle<()>,
}

/// Start a match of `category_key` in `channel`.
///
/// Everything that can fail before the match record exists (unknown
/// category, unreadable question bank, missing store) is reported without
/// touching the registry. A channel that already hosts a session yields
/// [`SessionStart::AlreadyRunning`].
pub async fn start_session(
    state: &SharedState,
    channel: ChannelRef,
    category_key: &str,
) -> Result<SessionStart, ServiceError> {
    let category = state
        .config()
        .category(category_key)
        .cloned()
        .ok_or_else(|| ServiceError::NotFound(format!("unknown trivia category `{category_key}`")))?;
    let channel_id = channel.channel_id;

    if state.sessions().is_registered(channel_id) {
        debug!(channel_id, category = %category.key, "session already running");
        return Ok(SessionStart::AlreadyRunning);
    }

    let questions = question_bank::load_category(state.config(), &category).await?;
    let store = state.require_store().await?;

    if !state.sessions().try_register(channel, &category.key) {
        debug!(channel_id, category = %category.key, "session registered concurrently");
        return Ok(SessionStart::AlreadyRunning);
    }

    let match_id = match store
        .create_match(channel_id, channel.guild_id, category.name.clone())
        .await
    {
        Ok(match_id) => match_id,
        Err(err) => {
            state.sessions().remove(channel_id);
            warn!(channel_id, error = %err, "failed to create match");
            return Err(err.into());
        }
    };
    state.sessions().set_match(channel_id, match_id);
    if let Err(err) = state.sessions().apply(channel_id, SessionEvent::MatchCreated) {
        state.sessions().remove(channel_id);
        return Err(err.into());
    }

    let total = questions.len();
    let deck = Deck::shuffled(questions);
    let rng = StdRng::from_rng(&mut rand::rng());
    info!(
        channel_id,
        guild_id = channel.guild_id,
        %match_id,
        category = %category.key,
        questions = total,
        "trivia session started"
    );

    let ctx = RoundContext {
        state: Arc::clone(state),
        store,
        channel,
        category,
        match_id,
    };
    let handle = tokio::spawn(run_session(ctx, deck, rng));

    Ok(SessionStart::Started(StartedSession {
        match_id,
        questions: total,
        handle,
    }))
}

/// Session task body. Always releases the channel before returning.
async fn run_session(ctx: RoundContext, deck: Deck, mut rng: StdRng) {
    let channel_id = ctx.channel.channel_id;

    match play_match(&ctx, deck, &mut rng).await {
        Ok(reason) => {
            info!(channel_id, match_id = %ctx.match_id, reason = ?reason, "trivia session finished");
        }
        Err(err) => {
            error!(
                channel_id,
                match_id = %ctx.match_id,
                error = %err,
                "trivia session aborted"
            );
            if let Err(transition) = ctx.state.sessions().apply(channel_id, SessionEvent::Fail) {
                warn!(channel_id, error = %transition, "failed to mark session as failed");
            }
            card_events::post_card(&ctx.state, &Card::notice(channel_id, FAILURE_NOTICE));
        }
    }

    ctx.state.reactions().close(channel_id);
    ctx.state.sessions().remove(channel_id);
    if ctx.state.sessions().is_empty() {
        // Names are only needed while some round can still refresh them.
        ctx.state.members().clear();
    }
    debug!(channel_id, "channel released");
}

async fn play_match(
    ctx: &RoundContext,
    mut deck: Deck,
    rng: &mut StdRng,
) -> Result<FinishReason, ServiceError> {
    let channel_id = ctx.channel.channel_id;
    let sessions = ctx.state.sessions();

    let mut played = 0;
    while sessions.is_active(channel_id) {
        let Some((question_index, question)) = deck.draw() else {
            break;
        };
        let number = played + 1;
        if let Err(err) = sessions.apply(channel_id, SessionEvent::RoundOpened { round: number }) {
            debug!(channel_id, error = %err, "next round not opened");
            break;
        }
        round_service::play_round(ctx, number, question_index, &question, rng).await?;
        played = number;
    }

    let reason = match sessions.apply(channel_id, SessionEvent::Finish)? {
        SessionPhase::Finished(reason) => reason,
        _ => FinishReason::DeckExhausted,
    };
    ctx.store.complete_match(ctx.match_id).await?;
    info!(
        channel_id,
        match_id = %ctx.match_id,
        rounds = played,
        remaining = deck.remaining(),
        "match complete"
    );

    if let Some(summary) = leaderboard_service::finalize_match(&ctx.store, ctx.match_id).await? {
        card_events::post_card(
            &ctx.state,
            &leaderboard_service::scoreboard_card(
                ctx.state.config(),
                &ctx.category,
                channel_id,
                ctx.match_id,
                &summary,
            ),
        );
    }

    Ok(reason)
}
