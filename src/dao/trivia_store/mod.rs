pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::collections::HashMap;

use futures::future::BoxFuture;

use crate::dao::models::{
    AnswerEntity, LeaderboardEntryEntity, LeaderboardStat, MatchEntity, MatchId, RoundId,
};
use crate::dao::storage::StorageResult;
use crate::state::trivia::{ChannelId, GuildId, ParticipantId};

pub use memory::InMemoryTriviaStore;

/// Abstraction over the persistence layer for matches, rounds, answers and the
/// cross-match leaderboard.
///
/// Matches, rounds and answers are append-only apart from their completion
/// flags. Leaderboard rows only change through [`apply_round_to_leaderboard`]
/// and [`award_match_win`], which must be atomic per participant row since
/// matches in different channels finish concurrently.
///
/// [`apply_round_to_leaderboard`]: TriviaStore::apply_round_to_leaderboard
/// [`award_match_win`]: TriviaStore::award_match_win
pub trait TriviaStore: Send + Sync {
    /// Record a new, incomplete match and return its id.
    fn create_match(
        &self,
        channel_id: ChannelId,
        guild_id: GuildId,
        category: String,
    ) -> BoxFuture<'static, StorageResult<MatchId>>;
    /// Record a new, incomplete round of `match_id`.
    fn create_round(
        &self,
        match_id: MatchId,
        number: u32,
        question_index: usize,
    ) -> BoxFuture<'static, StorageResult<RoundId>>;
    /// Append one answer to its round.
    fn record_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Answers of a round in arrival order.
    fn round_answers(&self, round_id: RoundId)
    -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>>;
    /// Answers of every round of a match, by round number then arrival.
    fn match_answers(&self, match_id: MatchId)
    -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>>;
    /// Rewrite the display names recorded on a round's answers and on the
    /// matching leaderboard rows.
    fn refresh_display_names(
        &self,
        round_id: RoundId,
        names: HashMap<ParticipantId, String>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Mark a round complete. Returns `true` only for the call that performed the transition.
    fn complete_round(&self, round_id: RoundId) -> BoxFuture<'static, StorageResult<bool>>;
    /// Fold a completed round's answers into the leaderboard, at most once per
    /// round. Returns the number of answers folded by this call.
    fn apply_round_to_leaderboard(
        &self,
        round_id: RoundId,
    ) -> BoxFuture<'static, StorageResult<usize>>;
    /// Mark a match complete. Returns `true` only for the call that performed the transition.
    fn complete_match(&self, match_id: MatchId) -> BoxFuture<'static, StorageResult<bool>>;
    /// Credit `participant_id` with the win of a completed match, at most once per match.
    fn award_match_win(
        &self,
        match_id: MatchId,
        participant_id: ParticipantId,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Fetch a match by id.
    fn find_match(&self, match_id: MatchId)
    -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// Number of participants with a leaderboard row.
    fn leaderboard_size(&self) -> BoxFuture<'static, StorageResult<u64>>;
    /// Best `limit` leaderboard rows for `stat`, ranked per [`LeaderboardStat::rank`].
    fn top_leaderboard(
        &self,
        stat: LeaderboardStat,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>>;
    /// Cheap liveness probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
