use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoAnswerDocument, MongoLeaderboardDocument, MongoMatchDocument, MongoRoundDocument,
        doc_id, leaderboard_pipeline, unfolded_answer_filter,
    },
};
use crate::{
    dao::{
        models::{
            AnswerEntity, LeaderboardEntryEntity, LeaderboardStat, MatchEntity, MatchId,
            RoundEntity, RoundId,
        },
        storage::StorageResult,
        trivia_store::TriviaStore,
    },
    state::trivia::{ChannelId, GuildId, ParticipantId},
};

const MATCH_COLLECTION_NAME: &str = "matches";
const ROUND_COLLECTION_NAME: &str = "rounds";
const ANSWER_COLLECTION_NAME: &str = "answers";
const LEADERBOARD_COLLECTION_NAME: &str = "leaderboard";

/// MongoDB-backed [`TriviaStore`].
#[derive(Clone)]
pub struct MongoTriviaStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoTriviaStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let indexes: [(&'static str, &'static str, Document); 3] = [
            (
                ANSWER_COLLECTION_NAME,
                "answer_round_idx",
                doc! {"round_id": 1, "arrival": 1},
            ),
            (
                ANSWER_COLLECTION_NAME,
                "answer_match_idx",
                doc! {"match_id": 1, "round_number": 1, "arrival": 1},
            ),
            (
                LEADERBOARD_COLLECTION_NAME,
                "leaderboard_score_idx",
                doc! {"score": -1, "first_seen_at": 1},
            ),
        ];

        for (collection, index, keys) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(Some(index.to_owned())).build())
                .build();
            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn matches(&self) -> Collection<MongoMatchDocument> {
        self.database().await.collection(MATCH_COLLECTION_NAME)
    }

    async fn rounds(&self) -> Collection<MongoRoundDocument> {
        self.database().await.collection(ROUND_COLLECTION_NAME)
    }

    async fn answers(&self) -> Collection<MongoAnswerDocument> {
        self.database().await.collection(ANSWER_COLLECTION_NAME)
    }

    async fn leaderboard(&self) -> Collection<MongoLeaderboardDocument> {
        self.database().await.collection(LEADERBOARD_COLLECTION_NAME)
    }

    async fn create_match(
        &self,
        channel_id: ChannelId,
        guild_id: GuildId,
        category: String,
    ) -> MongoResult<MatchId> {
        let entity = MatchEntity {
            id: uuid::Uuid::new_v4(),
            channel_id,
            guild_id,
            category,
            is_complete: false,
            winner: None,
            created_at: SystemTime::now(),
            completed_at: None,
        };
        let id = entity.id;
        let document: MongoMatchDocument = entity.into();
        self.matches()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::WriteMatch { id, source })?;
        Ok(id)
    }

    async fn create_round(
        &self,
        match_id: MatchId,
        number: u32,
        question_index: usize,
    ) -> MongoResult<RoundId> {
        let entity = RoundEntity {
            id: uuid::Uuid::new_v4(),
            match_id,
            number,
            question_index,
            is_complete: false,
            leaderboard_applied: false,
            created_at: SystemTime::now(),
        };
        let id = entity.id;
        let document: MongoRoundDocument = entity.into();
        self.rounds()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::WriteRound { id, source })?;
        Ok(id)
    }

    async fn record_answer(&self, answer: AnswerEntity) -> MongoResult<()> {
        let round_id = answer.round_id;
        let document: MongoAnswerDocument = answer.into();
        self.answers()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::WriteAnswer { round_id, source })?;
        Ok(())
    }

    async fn load_answers(&self, filter: Document, sort: Document) -> MongoResult<Vec<AnswerEntity>> {
        let documents: Vec<MongoAnswerDocument> = self
            .answers()
            .await
            .find(filter)
            .sort(sort)
            .await
            .map_err(|source| MongoDaoError::LoadAnswers { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadAnswers { source })?;

        documents
            .into_iter()
            .map(|document| {
                AnswerEntity::try_from(document).map_err(|source| MongoDaoError::CorruptRecord {
                    what: "answer".into(),
                    source,
                })
            })
            .collect()
    }

    async fn round_answers(&self, round_id: RoundId) -> MongoResult<Vec<AnswerEntity>> {
        self.load_answers(doc! {"round_id": round_id.to_string()}, doc! {"arrival": 1})
            .await
    }

    async fn match_answers(&self, match_id: MatchId) -> MongoResult<Vec<AnswerEntity>> {
        self.load_answers(
            doc! {"match_id": match_id.to_string()},
            doc! {"round_number": 1, "arrival": 1},
        )
        .await
    }

    async fn refresh_display_names(
        &self,
        round_id: RoundId,
        names: HashMap<ParticipantId, String>,
    ) -> MongoResult<()> {
        let answers = self.answers().await;
        let leaderboard = self.leaderboard().await;
        for (participant_id, name) in names {
            answers
                .update_many(
                    doc! {"round_id": round_id.to_string(), "participant_id": participant_id as i64},
                    doc! {"$set": {"display_name": name.clone()}},
                )
                .await
                .map_err(|source| MongoDaoError::WriteAnswer { round_id, source })?;
            leaderboard
                .update_one(
                    doc! {"_id": participant_id as i64},
                    doc! {"$set": {"username": name}},
                )
                .await
                .map_err(|source| MongoDaoError::WriteLeaderboard {
                    participant_id,
                    source,
                })?;
        }
        Ok(())
    }

    async fn round_exists(&self, round_id: RoundId) -> MongoResult<bool> {
        let found = self
            .rounds()
            .await
            .find_one(doc_id(round_id))
            .await
            .map_err(|source| MongoDaoError::WriteRound {
                id: round_id,
                source,
            })?;
        Ok(found.is_some())
    }

    async fn complete_round(&self, round_id: RoundId) -> MongoResult<bool> {
        let mut filter = doc_id(round_id);
        filter.insert("is_complete", false);
        let result = self
            .rounds()
            .await
            .update_one(filter, doc! {"$set": {"is_complete": true}})
            .await
            .map_err(|source| MongoDaoError::WriteRound {
                id: round_id,
                source,
            })?;

        if result.modified_count == 1 {
            return Ok(true);
        }
        if self.round_exists(round_id).await? {
            Ok(false)
        } else {
            Err(MongoDaoError::MissingRecord {
                what: format!("round {round_id}"),
            })
        }
    }

    async fn apply_round_to_leaderboard(&self, round_id: RoundId) -> MongoResult<usize> {
        let round = self
            .rounds()
            .await
            .find_one(doc_id(round_id))
            .await
            .map_err(|source| MongoDaoError::WriteRound {
                id: round_id,
                source,
            })?
            .ok_or_else(|| MongoDaoError::MissingRecord {
                what: format!("round {round_id}"),
            })?;
        if !round.is_complete() {
            return Ok(0);
        }

        // Answers are claimed one by one, so a fold interrupted by a failed
        // upsert resumes with the answers still unclaimed on the next call.
        let answers = self.round_answers(round_id).await?;
        let now = DateTime::now();
        let mut folded = 0;
        for answer in &answers {
            if !self.claim_answer(round_id, answer.participant_id).await? {
                continue;
            }
            if let Err(err) = self.fold_answer(answer, now).await {
                if let Err(release_err) =
                    self.release_answer(round_id, answer.participant_id).await
                {
                    warn!(
                        %round_id,
                        participant_id = answer.participant_id,
                        error = %release_err,
                        "failed to release leaderboard claim"
                    );
                }
                return Err(err);
            }
            folded += 1;
        }

        self.rounds()
            .await
            .update_one(
                doc_id(round_id),
                doc! {"$set": {"leaderboard_applied": true}},
            )
            .await
            .map_err(|source| MongoDaoError::WriteRound {
                id: round_id,
                source,
            })?;

        debug!(%round_id, folded, "round folded into leaderboard");
        Ok(folded)
    }

    /// Mark an answer as folded. Returns `false` when another call already did.
    async fn claim_answer(
        &self,
        round_id: RoundId,
        participant_id: ParticipantId,
    ) -> MongoResult<bool> {
        let result = self
            .answers()
            .await
            .update_one(
                unfolded_answer_filter(round_id, participant_id),
                doc! {"$set": {"leaderboard_folded": true}},
            )
            .await
            .map_err(|source| MongoDaoError::WriteAnswer { round_id, source })?;
        Ok(result.modified_count == 1)
    }

    async fn release_answer(
        &self,
        round_id: RoundId,
        participant_id: ParticipantId,
    ) -> MongoResult<()> {
        self.answers()
            .await
            .update_one(
                doc! {"round_id": round_id.to_string(), "participant_id": participant_id as i64},
                doc! {"$set": {"leaderboard_folded": false}},
            )
            .await
            .map_err(|source| MongoDaoError::WriteAnswer { round_id, source })?;
        Ok(())
    }

    async fn fold_answer(&self, answer: &AnswerEntity, now: DateTime) -> MongoResult<()> {
        let participant_id = answer.participant_id;
        self.leaderboard()
            .await
            .update_one(
                doc! {"_id": participant_id as i64},
                leaderboard_pipeline(answer, now),
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::WriteLeaderboard {
                participant_id,
                source,
            })?;
        Ok(())
    }

    async fn complete_match(&self, match_id: MatchId) -> MongoResult<bool> {
        let mut filter = doc_id(match_id);
        filter.insert("is_complete", false);
        let result = self
            .matches()
            .await
            .update_one(
                filter,
                doc! {"$set": {"is_complete": true, "completed_at": DateTime::now()}},
            )
            .await
            .map_err(|source| MongoDaoError::WriteMatch {
                id: match_id,
                source,
            })?;

        if result.modified_count == 1 {
            return Ok(true);
        }
        match self.find_match(match_id).await? {
            Some(_) => Ok(false),
            None => Err(MongoDaoError::MissingRecord {
                what: format!("match {match_id}"),
            }),
        }
    }

    async fn award_match_win(
        &self,
        match_id: MatchId,
        participant_id: ParticipantId,
    ) -> MongoResult<bool> {
        let mut filter = doc_id(match_id);
        filter.insert("is_complete", true);
        filter.insert("winner", mongodb::bson::Bson::Null);
        let result = self
            .matches()
            .await
            .update_one(filter, doc! {"$set": {"winner": participant_id as i64}})
            .await
            .map_err(|source| MongoDaoError::WriteMatch {
                id: match_id,
                source,
            })?;

        if result.modified_count == 0 {
            return match self.find_match(match_id).await? {
                Some(_) => Ok(false),
                None => Err(MongoDaoError::MissingRecord {
                    what: format!("match {match_id}"),
                }),
            };
        }

        self.leaderboard()
            .await
            .update_one(
                doc! {"_id": participant_id as i64},
                doc! {
                    "$inc": {"wins": 1_i64},
                    "$setOnInsert": {"username": "", "first_seen_at": DateTime::now()},
                },
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::WriteLeaderboard {
                participant_id,
                source,
            })?;
        Ok(true)
    }

    async fn find_match(&self, match_id: MatchId) -> MongoResult<Option<MatchEntity>> {
        let document = self
            .matches()
            .await
            .find_one(doc_id(match_id))
            .await
            .map_err(|source| MongoDaoError::LoadMatch {
                id: match_id,
                source,
            })?;

        document
            .map(|document| {
                MatchEntity::try_from(document).map_err(|source| MongoDaoError::CorruptRecord {
                    what: format!("match {match_id}"),
                    source,
                })
            })
            .transpose()
    }

    async fn leaderboard_size(&self) -> MongoResult<u64> {
        self.leaderboard()
            .await
            .count_documents(doc! {})
            .await
            .map_err(|source| MongoDaoError::LoadLeaderboard { source })
    }

    async fn top_leaderboard(
        &self,
        stat: LeaderboardStat,
        limit: usize,
    ) -> MongoResult<Vec<LeaderboardEntryEntity>> {
        let (filter, sort) = match stat {
            LeaderboardStat::Score => (doc! {}, doc! {"score": -1, "first_seen_at": 1}),
            LeaderboardStat::Wins => (doc! {}, doc! {"wins": -1, "first_seen_at": 1}),
            LeaderboardStat::CorrectAnswers => (
                doc! {},
                doc! {"correct_answers": -1, "first_seen_at": 1},
            ),
            LeaderboardStat::FastestAnswer => (
                doc! {"fastest_answer_ms": {"$ne": null}},
                doc! {"fastest_answer_ms": 1, "first_seen_at": 1},
            ),
            LeaderboardStat::LongestStreak => (
                doc! {},
                doc! {"longest_streak": -1, "first_seen_at": 1},
            ),
        };

        let documents: Vec<MongoLeaderboardDocument> = self
            .leaderboard()
            .await
            .find(filter)
            .sort(sort)
            .limit(limit as i64)
            .await
            .map_err(|source| MongoDaoError::LoadLeaderboard { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadLeaderboard { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl TriviaStore for MongoTriviaStore {
    fn create_match(
        &self,
        channel_id: ChannelId,
        guild_id: GuildId,
        category: String,
    ) -> BoxFuture<'static, StorageResult<MatchId>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .create_match(channel_id, guild_id, category)
                .await
                .map_err(Into::into)
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
            store
                .create_round(match_id, number, question_index)
                .await
                .map_err(Into::into)
        })
    }

    fn record_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.record_answer(answer).await.map_err(Into::into) })
    }

    fn round_answers(
        &self,
        round_id: RoundId,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.round_answers(round_id).await.map_err(Into::into) })
    }

    fn match_answers(
        &self,
        match_id: MatchId,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.match_answers(match_id).await.map_err(Into::into) })
    }

    fn refresh_display_names(
        &self,
        round_id: RoundId,
        names: HashMap<ParticipantId, String>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .refresh_display_names(round_id, names)
                .await
                .map_err(Into::into)
        })
    }

    fn complete_round(&self, round_id: RoundId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.complete_round(round_id).await.map_err(Into::into) })
    }

    fn apply_round_to_leaderboard(
        &self,
        round_id: RoundId,
    ) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .apply_round_to_leaderboard(round_id)
                .await
                .map_err(Into::into)
        })
    }

    fn complete_match(&self, match_id: MatchId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.complete_match(match_id).await.map_err(Into::into) })
    }

    fn award_match_win(
        &self,
        match_id: MatchId,
        participant_id: ParticipantId,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .award_match_win(match_id, participant_id)
                .await
                .map_err(Into::into)
        })
    }

    fn find_match(
        &self,
        match_id: MatchId,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_match(match_id).await.map_err(Into::into) })
    }

    fn leaderboard_size(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.leaderboard_size().await.map_err(Into::into) })
    }

    fn top_leaderboard(
        &self,
        stat: LeaderboardStat,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.top_leaderboard(stat, limit).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
