use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        card::Card,
        commands::{
            CategoryResponse, ForceStopRequest, ForceStopResponse, LeaderboardQuery,
            SessionStatusResponse, StartTriviaRequest, StartTriviaResponse, StopResponse,
        },
    },
    error::AppError,
    services::command_service,
    state::{
        SharedState,
        trivia::{ChannelId, ChannelRef},
    },
};

/// Command surface invoked by the chat adapter's command dispatcher.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/channels/{channel_id}/trivia", post(start_trivia))
        .route("/channels/{channel_id}/stop", post(stop))
        .route("/channels/{channel_id}/force-stop", post(force_stop))
        .route("/channels/{channel_id}/session", get(session_status))
        .route("/leaderboard", get(leaderboard))
        .route("/categories", get(list_categories))
}

/// Start a trivia match in a channel.
#[utoipa::path(
    post,
    path = "/channels/{channel_id}/trivia",
    tag = "commands",
    params(("channel_id" = u64, Path, description = "Channel to play in")),
    request_body = StartTriviaRequest,
    responses(
        (status = 200, description = "Match started, or already running in the channel", body = StartTriviaResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Unknown category"),
        (status = 429, description = "Start command on cooldown"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn start_trivia(
    State(state): State<SharedState>,
    Path(channel_id): Path<ChannelId>,
    Json(payload): Json<StartTriviaRequest>,
) -> Result<Json<StartTriviaResponse>, AppError> {
    payload.validate()?;
    let channel = ChannelRef {
        channel_id,
        guild_id: payload.guild_id,
    };
    Ok(Json(
        command_service::start_trivia(&state, channel, &payload.category).await?,
    ))
}

/// Explain how a running game ends.
#[utoipa::path(
    post,
    path = "/channels/{channel_id}/stop",
    tag = "commands",
    params(("channel_id" = u64, Path, description = "Channel the command was issued in")),
    responses(
        (status = 200, description = "Notice posted when a session runs", body = StopResponse),
        (status = 429, description = "Stop command on cooldown")
    )
)]
pub async fn stop(
    State(state): State<SharedState>,
    Path(channel_id): Path<ChannelId>,
) -> Result<Json<StopResponse>, AppError> {
    Ok(Json(command_service::stop(&state, channel_id)?))
}

/// End the session once the open round completes.
#[utoipa::path(
    post,
    path = "/channels/{channel_id}/force-stop",
    tag = "commands",
    params(("channel_id" = u64, Path, description = "Channel to stop")),
    request_body = ForceStopRequest,
    responses(
        (status = 200, description = "Stop latched, or nothing to stop", body = ForceStopResponse),
        (status = 400, description = "Channel belongs to another guild"),
        (status = 401, description = "Invoker lacks the manage server permission")
    )
)]
pub async fn force_stop(
    State(state): State<SharedState>,
    Path(channel_id): Path<ChannelId>,
    Json(payload): Json<ForceStopRequest>,
) -> Result<Json<ForceStopResponse>, AppError> {
    let channel = ChannelRef {
        channel_id,
        guild_id: payload.guild_id,
    };
    Ok(Json(command_service::force_stop(
        &state,
        channel,
        payload.can_manage_guild,
    )?))
}

/// Inspect the session running in a channel.
#[utoipa::path(
    get,
    path = "/channels/{channel_id}/session",
    tag = "commands",
    params(("channel_id" = u64, Path, description = "Channel to inspect")),
    responses(
        (status = 200, description = "Session status", body = SessionStatusResponse),
        (status = 404, description = "No session in the channel")
    )
)]
pub async fn session_status(
    State(state): State<SharedState>,
    Path(channel_id): Path<ChannelId>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    Ok(Json(command_service::session_status(&state, channel_id)?))
}

/// Global cross-match leaderboard.
#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "commands",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Leaderboard card", body = Card),
        (status = 204, description = "Nobody is on the leaderboard yet"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Response, AppError> {
    match command_service::leaderboard(&state, query.channel_id).await? {
        Some(card) => Ok(Json(card).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Categories the start command accepts.
#[utoipa::path(
    get,
    path = "/categories",
    tag = "commands",
    responses((status = 200, description = "Configured categories", body = [CategoryResponse]))
)]
pub async fn list_categories(State(state): State<SharedState>) -> Json<Vec<CategoryResponse>> {
    Json(command_service::categories(&state))
}
