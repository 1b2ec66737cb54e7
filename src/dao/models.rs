use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::trivia::{ChannelId, GuildId, ParticipantId};

/// Identifier of a persisted match.
pub type MatchId = Uuid;
/// Identifier of a persisted round.
pub type RoundId = Uuid;

/// One played trivia session in a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Primary key of the match.
    pub id: MatchId,
    /// Channel the match was played in.
    pub channel_id: ChannelId,
    /// Guild owning the channel.
    pub guild_id: GuildId,
    /// Category name the questions were drawn from.
    pub category: String,
    /// Set exactly once when the match ends.
    pub is_complete: bool,
    /// Participant credited with the match win, once awarded.
    pub winner: Option<ParticipantId>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Completion timestamp.
    pub completed_at: Option<SystemTime>,
}

/// One asked question inside a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundEntity {
    /// Primary key of the round.
    pub id: RoundId,
    /// Owning match.
    pub match_id: MatchId,
    /// 1-based position of the round inside its match.
    pub number: u32,
    /// Position of the question inside its category bank.
    pub question_index: usize,
    /// Set exactly once, after the answer window closed.
    pub is_complete: bool,
    /// Whether the round's answers were already folded into the leaderboard.
    pub leaderboard_applied: bool,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// One participant's answer to a round. Immutable apart from the display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    /// Round the answer belongs to.
    pub round_id: RoundId,
    /// Match the round belongs to (denormalised for per-match queries).
    pub match_id: MatchId,
    /// Position of the round inside its match.
    pub round_number: u32,
    /// Arrival order of the answer inside its round (0-based).
    pub arrival: u32,
    /// Answering participant.
    pub participant_id: ParticipantId,
    /// Display name recorded for the participant.
    pub display_name: String,
    /// Whether the chosen option was the correct one.
    pub is_correct: bool,
    /// Display index of the chosen option.
    pub option_index: u8,
    /// Milliseconds between the window opening and the reaction.
    pub latency_ms: u64,
    /// Points awarded (zero for wrong answers).
    pub points: u32,
}

/// Cross-match statistics of a participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntryEntity {
    /// Participant the statistics belong to.
    pub participant_id: ParticipantId,
    /// Last known display name.
    pub username: String,
    /// Cumulative points.
    pub score: u64,
    /// Number of matches won.
    pub wins: u32,
    /// Number of correct answers.
    pub correct_answers: u32,
    /// Number of answers given, correct or not.
    pub answers_given: u32,
    /// Fastest correct answer ever recorded.
    pub fastest_answer_ms: Option<u64>,
    /// Current run of consecutive correct answers.
    pub current_streak: u32,
    /// Longest run of consecutive correct answers.
    pub longest_streak: u32,
    /// When the participant first appeared; used to order ties.
    pub first_seen_at: SystemTime,
}

impl LeaderboardEntryEntity {
    /// Fresh entry for a participant seen for the first time.
    pub fn new(participant_id: ParticipantId, username: String, now: SystemTime) -> Self {
        Self {
            participant_id,
            username,
            score: 0,
            wins: 0,
            correct_answers: 0,
            answers_given: 0,
            fastest_answer_ms: None,
            current_streak: 0,
            longest_streak: 0,
            first_seen_at: now,
        }
    }

    /// Fold one answer into the running statistics.
    pub fn apply_answer(&mut self, answer: &AnswerEntity) {
        self.username = answer.display_name.clone();
        self.answers_given += 1;
        if answer.is_correct {
            self.score += u64::from(answer.points);
            self.correct_answers += 1;
            self.fastest_answer_ms = Some(
                self.fastest_answer_ms
                    .map_or(answer.latency_ms, |fastest| fastest.min(answer.latency_ms)),
            );
            self.current_streak += 1;
            self.longest_streak = self.longest_streak.max(self.current_streak);
        } else {
            self.current_streak = 0;
        }
    }
}

/// Statistic a global leaderboard view is ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardStat {
    /// Cumulative points, descending.
    Score,
    /// Matches won, descending.
    Wins,
    /// Correct answers, descending.
    CorrectAnswers,
    /// Fastest correct answer, ascending; participants without one are skipped.
    FastestAnswer,
    /// Longest correct streak, descending.
    LongestStreak,
}

impl LeaderboardStat {
    /// Every view, in the order they are rendered.
    pub const ALL: [LeaderboardStat; 5] = [
        LeaderboardStat::Score,
        LeaderboardStat::Wins,
        LeaderboardStat::CorrectAnswers,
        LeaderboardStat::FastestAnswer,
        LeaderboardStat::LongestStreak,
    ];

    /// Rank `entries` in place: best first, ties broken by first appearance.
    pub fn rank(self, entries: &mut Vec<LeaderboardEntryEntity>) {
        if self == LeaderboardStat::FastestAnswer {
            entries.retain(|entry| entry.fastest_answer_ms.is_some());
        }
        entries.sort_by(|a, b| {
            let primary = match self {
                LeaderboardStat::Score => b.score.cmp(&a.score),
                LeaderboardStat::Wins => b.wins.cmp(&a.wins),
                LeaderboardStat::CorrectAnswers => b.correct_answers.cmp(&a.correct_answers),
                LeaderboardStat::FastestAnswer => a.fastest_answer_ms.cmp(&b.fastest_answer_ms),
                LeaderboardStat::LongestStreak => b.longest_streak.cmp(&a.longest_streak),
            };
            primary.then_with(|| a.first_seen_at.cmp(&b.first_seen_at))
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn answer(correct: bool, latency_ms: u64) -> AnswerEntity {
        AnswerEntity {
            round_id: Uuid::new_v4(),
            match_id: Uuid::new_v4(),
            round_number: 1,
            arrival: 0,
            participant_id: 7,
            display_name: "homer".into(),
            is_correct: correct,
            option_index: 0,
            latency_ms,
            points: if correct { 12 } else { 0 },
        }
    }

    #[test]
    fn streaks_reset_on_wrong_answers() {
        let mut entry = LeaderboardEntryEntity::new(7, "old".into(), SystemTime::UNIX_EPOCH);
        for (correct, latency) in [(true, 900), (true, 400), (false, 100), (true, 700)] {
            entry.apply_answer(&answer(correct, latency));
        }

        assert_eq!(entry.username, "homer");
        assert_eq!(entry.answers_given, 4);
        assert_eq!(entry.correct_answers, 3);
        assert_eq!(entry.score, 36);
        assert_eq!(entry.fastest_answer_ms, Some(400));
        assert_eq!(entry.current_streak, 1);
        assert_eq!(entry.longest_streak, 2);
    }

    #[test]
    fn fastest_view_skips_entries_without_correct_answers_and_orders_ties() {
        let base = SystemTime::UNIX_EPOCH;
        let mut slow = LeaderboardEntryEntity::new(1, "slow".into(), base);
        slow.fastest_answer_ms = Some(3000);
        let mut early = LeaderboardEntryEntity::new(2, "early".into(), base + Duration::from_secs(1));
        early.fastest_answer_ms = Some(1000);
        let mut late = LeaderboardEntryEntity::new(3, "late".into(), base + Duration::from_secs(2));
        late.fastest_answer_ms = Some(1000);
        let never = LeaderboardEntryEntity::new(4, "never".into(), base);

        let mut entries = vec![late, never, slow, early];
        LeaderboardStat::FastestAnswer.rank(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, ["early", "late", "slow"]);
    }
}
