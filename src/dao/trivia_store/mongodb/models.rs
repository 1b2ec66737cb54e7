use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{AnswerEntity, LeaderboardEntryEntity, MatchEntity, RoundEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: String,
    channel_id: i64,
    guild_id: i64,
    category: String,
    is_complete: bool,
    #[serde(default)]
    winner: Option<i64>,
    created_at: DateTime,
    #[serde(default)]
    completed_at: Option<DateTime>,
}

impl From<MatchEntity> for MongoMatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id.to_string(),
            channel_id: value.channel_id as i64,
            guild_id: value.guild_id as i64,
            category: value.category,
            is_complete: value.is_complete,
            winner: value.winner.map(|id| id as i64),
            created_at: DateTime::from_system_time(value.created_at),
            completed_at: value.completed_at.map(DateTime::from_system_time),
        }
    }
}

impl TryFrom<MongoMatchDocument> for MatchEntity {
    type Error = uuid::Error;

    fn try_from(value: MongoMatchDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&value.id)?,
            channel_id: value.channel_id as u64,
            guild_id: value.guild_id as u64,
            category: value.category,
            is_complete: value.is_complete,
            winner: value.winner.map(|id| id as u64),
            created_at: value.created_at.to_system_time(),
            completed_at: value.completed_at.map(DateTime::to_system_time),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoundDocument {
    #[serde(rename = "_id")]
    id: String,
    match_id: String,
    number: i64,
    question_index: i64,
    is_complete: bool,
    leaderboard_applied: bool,
    created_at: DateTime,
}

impl MongoRoundDocument {
    pub fn is_complete(&self) -> bool {
        self.is_complete
    }
}

impl From<RoundEntity> for MongoRoundDocument {
    fn from(value: RoundEntity) -> Self {
        Self {
            id: value.id.to_string(),
            match_id: value.match_id.to_string(),
            number: i64::from(value.number),
            question_index: value.question_index as i64,
            is_complete: value.is_complete,
            leaderboard_applied: value.leaderboard_applied,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnswerDocument {
    round_id: String,
    match_id: String,
    round_number: i64,
    arrival: i64,
    participant_id: i64,
    display_name: String,
    is_correct: bool,
    option_index: i32,
    latency_ms: i64,
    points: i64,
    #[serde(default)]
    leaderboard_folded: bool,
}

impl From<AnswerEntity> for MongoAnswerDocument {
    fn from(value: AnswerEntity) -> Self {
        Self {
            round_id: value.round_id.to_string(),
            match_id: value.match_id.to_string(),
            round_number: i64::from(value.round_number),
            arrival: i64::from(value.arrival),
            participant_id: value.participant_id as i64,
            display_name: value.display_name,
            is_correct: value.is_correct,
            option_index: i32::from(value.option_index),
            latency_ms: value.latency_ms as i64,
            points: i64::from(value.points),
            leaderboard_folded: false,
        }
    }
}

impl TryFrom<MongoAnswerDocument> for AnswerEntity {
    type Error = uuid::Error;

    fn try_from(value: MongoAnswerDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            round_id: Uuid::parse_str(&value.round_id)?,
            match_id: Uuid::parse_str(&value.match_id)?,
            round_number: value.round_number as u32,
            arrival: value.arrival as u32,
            participant_id: value.participant_id as u64,
            display_name: value.display_name,
            is_correct: value.is_correct,
            option_index: value.option_index as u8,
            latency_ms: value.latency_ms as u64,
            points: value.points as u32,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoLeaderboardDocument {
    #[serde(rename = "_id")]
    participant_id: i64,
    #[serde(default)]
    username: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    wins: i64,
    #[serde(default)]
    correct_answers: i64,
    #[serde(default)]
    answers_given: i64,
    #[serde(default)]
    fastest_answer_ms: Option<i64>,
    #[serde(default)]
    current_streak: i64,
    #[serde(default)]
    longest_streak: i64,
    first_seen_at: DateTime,
}

impl From<MongoLeaderboardDocument> for LeaderboardEntryEntity {
    fn from(value: MongoLeaderboardDocument) -> Self {
        Self {
            participant_id: value.participant_id as u64,
            username: value.username,
            score: value.score.max(0) as u64,
            wins: value.wins.max(0) as u32,
            correct_answers: value.correct_answers.max(0) as u32,
            answers_given: value.answers_given.max(0) as u32,
            fastest_answer_ms: value.fastest_answer_ms.map(|ms| ms.max(0) as u64),
            current_streak: value.current_streak.max(0) as u32,
            longest_streak: value.longest_streak.max(0) as u32,
            first_seen_at: value.first_seen_at.to_system_time(),
        }
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Filter matching a participant's answer in a round while it is not yet folded
/// into the leaderboard.
pub fn unfolded_answer_filter(round_id: Uuid, participant_id: u64) -> Document {
    doc! {
        "round_id": round_id.to_string(),
        "participant_id": participant_id as i64,
        "leaderboard_folded": {"$ne": true},
    }
}

/// Aggregation pipeline folding one answer into a participant's leaderboard row.
///
/// Runs as a single atomic document update, creating the row when missing.
pub fn leaderboard_pipeline(answer: &AnswerEntity, now: DateTime) -> Vec<Document> {
    let mut set = doc! {
        // Display names are user text; `$literal` keeps `$`-prefixed names from
        // resolving as field paths.
        "username": { "$literal": answer.display_name.clone() },
        "first_seen_at": { "$ifNull": ["$first_seen_at", now] },
        "answers_given": { "$add": [{ "$ifNull": ["$answers_given", 0_i64] }, 1_i64] },
        "wins": { "$ifNull": ["$wins", 0_i64] },
    };

    if answer.is_correct {
        let latency = answer.latency_ms as i64;
        set.insert(
            "score",
            doc! { "$add": [{ "$ifNull": ["$score", 0_i64] }, i64::from(answer.points)] },
        );
        set.insert(
            "correct_answers",
            doc! { "$add": [{ "$ifNull": ["$correct_answers", 0_i64] }, 1_i64] },
        );
        set.insert(
            "fastest_answer_ms",
            doc! { "$min": [{ "$ifNull": ["$fastest_answer_ms", latency] }, latency] },
        );
        set.insert(
            "current_streak",
            doc! { "$add": [{ "$ifNull": ["$current_streak", 0_i64] }, 1_i64] },
        );
    } else {
        set.insert("score", doc! { "$ifNull": ["$score", 0_i64] });
        set.insert("correct_answers", doc! { "$ifNull": ["$correct_answers", 0_i64] });
        set.insert("current_streak", 0_i64);
    }

    vec![
        doc! { "$set": set },
        doc! { "$set": {
            "longest_streak": { "$max": [{ "$ifNull": ["$longest_streak", 0_i64] }, "$current_streak"] }
        } },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(display_name: &str, is_correct: bool) -> AnswerEntity {
        AnswerEntity {
            round_id: Uuid::new_v4(),
            match_id: Uuid::new_v4(),
            round_number: 1,
            arrival: 0,
            participant_id: 7,
            display_name: display_name.to_string(),
            is_correct,
            option_index: 0,
            latency_ms: 1_500,
            points: 24,
        }
    }

    #[test]
    fn usernames_are_written_as_literals() {
        let pipeline = leaderboard_pipeline(&answer("$score", true), DateTime::now());
        let set = pipeline[0].get_document("$set").unwrap();

        assert_eq!(
            set.get_document("username").unwrap(),
            &doc! { "$literal": "$score" }
        );
    }

    #[test]
    fn wrong_answers_reset_the_streak_without_scoring() {
        let pipeline = leaderboard_pipeline(&answer("homer", false), DateTime::now());
        let set = pipeline[0].get_document("$set").unwrap();

        assert_eq!(set.get_i64("current_streak").unwrap(), 0);
        assert!(set.get_document("fastest_answer_ms").is_err());
    }

    #[test]
    fn claims_only_match_unfolded_answers() {
        let round_id = Uuid::new_v4();
        let filter = unfolded_answer_filter(round_id, 7);

        assert_eq!(filter.get_str("round_id").unwrap(), round_id.to_string());
        assert_eq!(filter.get_i64("participant_id").unwrap(), 7);
        assert_eq!(
            filter.get_document("leaderboard_folded").unwrap(),
            &doc! {"$ne": true}
        );
    }

    #[test]
    fn new_answers_start_unfolded() {
        let document: MongoAnswerDocument = answer("homer", true).into();
        assert!(!document.leaderboard_folded);
    }
}
