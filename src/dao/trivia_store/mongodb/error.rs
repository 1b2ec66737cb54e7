use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to write match `{id}`")]
    WriteMatch {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load match `{id}`")]
    LoadMatch {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to write round `{id}`")]
    WriteRound {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to write answer for round `{round_id}`")]
    WriteAnswer {
        round_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load answers")]
    LoadAnswers {
        #[source]
        source: MongoError,
    },
    #[error("failed to update leaderboard row of participant `{participant_id}`")]
    WriteLeaderboard {
        participant_id: u64,
        #[source]
        source: MongoError,
    },
    #[error("failed to query leaderboard")]
    LoadLeaderboard {
        #[source]
        source: MongoError,
    },
    #[error("stored record `{what}` carries a malformed id")]
    CorruptRecord {
        what: String,
        #[source]
        source: uuid::Error,
    },
    #[error("record not found: {what}")]
    MissingRecord { what: String },
}
