use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    dao::{
        models::{
            AnswerEntity, LeaderboardEntryEntity, LeaderboardStat, MatchEntity, MatchId,
            RoundEntity, RoundId,
        },
        storage::{StorageError, StorageResult},
        trivia_store::TriviaStore,
    },
    state::trivia::{ChannelId, GuildId, ParticipantId},
};

/// Process-local [`TriviaStore`] keeping everything behind a single async mutex.
///
/// Every operation runs under the lock, which serialises leaderboard
/// read-modify-write cycles across concurrently finishing matches.
#[derive(Clone, Default)]
pub struct InMemoryTriviaStore {
    inner: Arc<Mutex<MemoryTables>>,
}

#[derive(Default)]
struct MemoryTables {
    matches: HashMap<MatchId, MatchEntity>,
    rounds: HashMap<RoundId, RoundEntity>,
    answers: Vec<AnswerEntity>,
    leaderboard: HashMap<ParticipantId, LeaderboardEntryEntity>,
}

impl InMemoryTriviaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a round by id.
    pub async fn round(&self, round_id: RoundId) -> Option<RoundEntity> {
        self.inner.lock().await.rounds.get(&round_id).cloned()
    }

    /// Every round of a match, ordered by round number.
    pub async fn rounds_of(&self, match_id: MatchId) -> Vec<RoundEntity> {
        let tables = self.inner.lock().await;
        let mut rounds: Vec<_> = tables
            .rounds
            .values()
            .filter(|round| round.match_id == match_id)
            .cloned()
            .collect();
        rounds.sort_by_key(|round| round.number);
        rounds
    }

    /// Leaderboard row of a participant.
    pub async fn leaderboard_entry(
        &self,
        participant_id: ParticipantId,
    ) -> Option<LeaderboardEntryEntity> {
        self.inner
            .lock()
            .await
            .leaderboard
            .get(&participant_id)
            .cloned()
    }
}

impl MemoryTables {
    fn round_mut(&mut self, round_id: RoundId) -> StorageResult<&mut RoundEntity> {
        self.rounds
            .get_mut(&round_id)
            .ok_or_else(|| StorageError::Missing(format!("round `{round_id}`")))
    }

    fn match_mut(&mut self, match_id: MatchId) -> StorageResult<&mut MatchEntity> {
        self.matches
            .get_mut(&match_id)
            .ok_or_else(|| StorageError::Missing(format!("match `{match_id}`")))
    }

    fn answers_of_round(&self, round_id: RoundId) -> Vec<AnswerEntity> {
        let mut answers: Vec<_> = self
            .answers
            .iter()
            .filter(|answer| answer.round_id == round_id)
            .cloned()
            .collect();
        answers.sort_by_key(|answer| answer.arrival);
        answers
    }
}

impl TriviaStore for InMemoryTriviaStore {
    fn create_match(
        &self,
        channel_id: ChannelId,
        guild_id: GuildId,
        category: String,
    ) -> BoxFuture<'static, StorageResult<MatchId>> {
        let store = self.clone();
        Box::pin(async move {
            let id = Uuid::new_v4();
            let entity = MatchEntity {
                id,
                channel_id,
                guild_id,
                category,
                is_complete: false,
                winner: None,
                created_at: SystemTime::now(),
                completed_at: None,
            };
            store.inner.lock().await.matches.insert(id, entity);
            Ok(id)
        })
    }

    fn create_round(
        &self,
        match_id: MatchId,
        number: u32,
        question_index: usize,
    ) -> BoxFuture<'static, StorageResult<RoundId>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            tables.match_mut(match_id)?;

            let id = Uuid::new_v4();
            tables.rounds.insert(
                id,
                RoundEntity {
                    id,
                    match_id,
                    number,
                    question_index,
                    is_complete: false,
                    leaderboard_applied: false,
                    created_at: SystemTime::now(),
                },
            );
            Ok(id)
        })
    }

    fn record_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            tables.round_mut(answer.round_id)?;
            tables.answers.push(answer);
            Ok(())
        })
    }

    fn round_answers(
        &self,
        round_id: RoundId,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.answers_of_round(round_id)) })
    }

    fn match_answers(
        &self,
        match_id: MatchId,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.inner.lock().await;
            let mut answers: Vec<_> = tables
                .answers
                .iter()
                .filter(|answer| answer.match_id == match_id)
                .cloned()
                .collect();
            answers.sort_by_key(|answer| (answer.round_number, answer.arrival));
            Ok(answers)
        })
    }

    fn refresh_display_names(
        &self,
        round_id: RoundId,
        names: HashMap<ParticipantId, String>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            for answer in tables
                .answers
                .iter_mut()
                .filter(|answer| answer.round_id == round_id)
            {
                if let Some(name) = names.get(&answer.participant_id) {
                    answer.display_name = name.clone();
                }
            }
            for (participant_id, name) in &names {
                if let Some(entry) = tables.leaderboard.get_mut(participant_id) {
                    entry.username = name.clone();
                }
            }
            Ok(())
        })
    }

    fn complete_round(&self, round_id: RoundId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            let round = tables.round_mut(round_id)?;
            if round.is_complete {
                return Ok(false);
            }
            round.is_complete = true;
            Ok(true)
        })
    }

    fn apply_round_to_leaderboard(
        &self,
        round_id: RoundId,
    ) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            let round = tables.round_mut(round_id)?;
            if !round.is_complete || round.leaderboard_applied {
                return Ok(0);
            }
            round.leaderboard_applied = true;

            let answers = tables.answers_of_round(round_id);
            let now = SystemTime::now();
            for answer in &answers {
                tables
                    .leaderboard
                    .entry(answer.participant_id)
                    .or_insert_with(|| {
                        LeaderboardEntryEntity::new(
                            answer.participant_id,
                            answer.display_name.clone(),
                            now,
                        )
                    })
                    .apply_answer(answer);
            }
            Ok(answers.len())
        })
    }

    fn complete_match(&self, match_id: MatchId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            let entity = tables.match_mut(match_id)?;
            if entity.is_complete {
                return Ok(false);
            }
            entity.is_complete = true;
            entity.completed_at = Some(SystemTime::now());
            Ok(true)
        })
    }

    fn award_match_win(
        &self,
        match_id: MatchId,
        participant_id: ParticipantId,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            let entity = tables.match_mut(match_id)?;
            if !entity.is_complete || entity.winner.is_some() {
                return Ok(false);
            }
            entity.winner = Some(participant_id);

            let username = tables
                .answers
                .iter()
                .rev()
                .find(|answer| answer.participant_id == participant_id)
                .map(|answer| answer.display_name.clone())
                .unwrap_or_default();
            tables
                .leaderboard
                .entry(participant_id)
                .or_insert_with(|| {
                    LeaderboardEntryEntity::new(participant_id, username, SystemTime::now())
                })
                .wins += 1;
            Ok(true)
        })
    }

    fn find_match(
        &self,
        match_id: MatchId,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.matches.get(&match_id).cloned()) })
    }

    fn leaderboard_size(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.leaderboard.len() as u64) })
    }

    fn top_leaderboard(
        &self,
        stat: LeaderboardStat,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut entries: Vec<_> = store
                .inner
                .lock()
                .await
                .leaderboard
                .values()
                .cloned()
                .collect();
            stat.rank(&mut entries);
            entries.truncate(limit);
            Ok(entries)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
