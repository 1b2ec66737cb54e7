//! Match scoreboards and the cross-match leaderboard.

use std::{cmp::Ordering, sync::Arc};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::{
    config::{AppConfig, Category},
    dao::{
        models::{AnswerEntity, LeaderboardEntryEntity, LeaderboardStat, MatchId},
        trivia_store::TriviaStore,
    },
    dto::card::{Card, CardKind},
    error::ServiceError,
    state::trivia::{ChannelId, ParticipantId},
};

/// Rows rendered per ranked view.
const TOP_N: usize = 5;
const EMPTY_VIEW: &str = "---";

/// Per-participant totals over one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantTally {
    pub participant_id: ParticipantId,
    /// Name recorded on the participant's latest answer.
    pub display_name: String,
    pub correct: u32,
    pub answered: u32,
    /// Fastest correct answer in the match.
    pub fastest_ms: Option<u64>,
}

impl ParticipantTally {
    /// Share of correct answers, in percent.
    pub fn accuracy_percent(&self) -> f64 {
        if self.answered == 0 {
            return 0.0;
        }
        f64::from(self.correct) * 100.0 / f64::from(self.answered)
    }

    /// Higher accuracy first, compared exactly.
    fn cmp_accuracy(&self, other: &Self) -> Ordering {
        let ours = u64::from(self.correct) * u64::from(other.answered);
        let theirs = u64::from(other.correct) * u64::from(self.answered);
        theirs.cmp(&ours)
    }
}

/// Ranked views over the answers of one match.
///
/// Every view is a stable sort over participants in order of their first
/// answer in the match, so ties go to whoever answered earliest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    /// By correct answers, descending.
    pub top_scorers: Vec<ParticipantTally>,
    /// By accuracy, descending.
    pub highest_accuracy: Vec<ParticipantTally>,
    /// By fastest correct answer, ascending; only participants with one.
    pub fastest_answers: Vec<ParticipantTally>,
}

impl MatchSummary {
    /// Top scorer credited with the match win, when they answered anything correctly.
    pub fn winner(&self) -> Option<&ParticipantTally> {
        self.top_scorers.first().filter(|tally| tally.correct > 0)
    }
}

/// Rank the answers of a match. `None` when nobody answered.
pub fn summarize_match(answers: &[AnswerEntity]) -> Option<MatchSummary> {
    let mut tallies: IndexMap<ParticipantId, ParticipantTally> = IndexMap::new();
    for answer in answers {
        let tally = tallies
            .entry(answer.participant_id)
            .or_insert_with(|| ParticipantTally {
                participant_id: answer.participant_id,
                display_name: answer.display_name.clone(),
                correct: 0,
                answered: 0,
                fastest_ms: None,
            });
        tally.display_name.clone_from(&answer.display_name);
        tally.answered += 1;
        if answer.is_correct {
            tally.correct += 1;
            tally.fastest_ms = Some(
                tally
                    .fastest_ms
                    .map_or(answer.latency_ms, |fastest| fastest.min(answer.latency_ms)),
            );
        }
    }

    if tallies.is_empty() {
        return None;
    }

    let participants: Vec<ParticipantTally> = tallies.into_values().collect();

    let mut top_scorers = participants.clone();
    top_scorers.sort_by(|a, b| b.correct.cmp(&a.correct));

    let mut highest_accuracy = participants.clone();
    highest_accuracy.sort_by(ParticipantTally::cmp_accuracy);

    let mut fastest_answers: Vec<ParticipantTally> = participants
        .into_iter()
        .filter(|tally| tally.fastest_ms.is_some())
        .collect();
    fastest_answers.sort_by_key(|tally| tally.fastest_ms);

    Some(MatchSummary {
        top_scorers,
        highest_accuracy,
        fastest_answers,
    })
}

/// Summarise a completed match and credit its winner on the global leaderboard.
pub async fn finalize_match(
    store: &Arc<dyn TriviaStore>,
    match_id: MatchId,
) -> Result<Option<MatchSummary>, ServiceError> {
    let answers = store.match_answers(match_id).await?;
    let Some(summary) = summarize_match(&answers) else {
        info!(%match_id, "match ended without answers; scoreboard suppressed");
        return Ok(None);
    };

    if let Some(winner) = summary.winner() {
        let awarded = store
            .award_match_win(match_id, winner.participant_id)
            .await?;
        info!(
            %match_id,
            participant_id = winner.participant_id,
            correct = winner.correct,
            awarded,
            "match winner credited"
        );
    }

    Ok(Some(summary))
}

/// End-of-match scoreboard card.
pub fn scoreboard_card(
    config: &AppConfig,
    category: &Category,
    channel_id: ChannelId,
    match_id: MatchId,
    summary: &MatchSummary,
) -> Card {
    let mut card = Card::new(CardKind::Scoreboard)
        .in_channel(channel_id)
        .with_match(match_id)
        .with_author("Trivia Scoreboard", config.scoreboard_icon_url())
        .with_color(category.color);

    if let Some(top) = summary.top_scorers.first() {
        card = card.with_description(format!(
            "**Congratulations to the top scorer, {} :trophy:**",
            top.display_name
        ));
    }

    card.with_field(
        "*:medal:Correct Answers*",
        render_rows(&summary.top_scorers, |tally| tally.correct.to_string()),
    )
    .with_field(
        "*:bow_and_arrow: Highest Accuracy*",
        render_rows(&summary.highest_accuracy, |tally| {
            format_percent(tally.accuracy_percent())
        }),
    )
    .with_field(
        "*:point_up: Fastest Answers*",
        render_rows(&summary.fastest_answers, |tally| {
            tally.fastest_ms.map(format_seconds).unwrap_or_default()
        }),
    )
}

/// Global leaderboard card, or `None` while nobody has a leaderboard row.
pub async fn global_leaderboard(
    store: &Arc<dyn TriviaStore>,
    config: &AppConfig,
) -> Result<Option<Card>, ServiceError> {
    let size = store.leaderboard_size().await?;
    if size == 0 {
        debug!("leaderboard requested while empty");
        return Ok(None);
    }

    let mut card = Card::new(CardKind::Leaderboard)
        .with_author("Trivia Leaderboard", config.scoreboard_icon_url());
    for stat in LeaderboardStat::ALL {
        let rows = store.top_leaderboard(stat, TOP_N).await?;
        card = card.with_field(stat_title(stat), render_entries(stat, &rows));
    }
    Ok(Some(card))
}

fn stat_title(stat: LeaderboardStat) -> &'static str {
    match stat {
        LeaderboardStat::Score => ":trophy: High Scores",
        LeaderboardStat::Wins => ":first_place: Wins",
        LeaderboardStat::CorrectAnswers => ":white_check_mark:  Correct Answers",
        LeaderboardStat::FastestAnswer => ":point_up: Fastest Answers",
        LeaderboardStat::LongestStreak => ":chart_with_upwards_trend: Longest Streak",
    }
}

fn render_entries(stat: LeaderboardStat, rows: &[LeaderboardEntryEntity]) -> String {
    if rows.is_empty() {
        return EMPTY_VIEW.to_string();
    }
    rows.iter()
        .take(TOP_N)
        .map(|row| {
            let value = match stat {
                LeaderboardStat::Score => row.score.to_string(),
                LeaderboardStat::Wins => row.wins.to_string(),
                LeaderboardStat::CorrectAnswers => row.correct_answers.to_string(),
                LeaderboardStat::FastestAnswer => {
                    row.fastest_answer_ms.map(format_seconds).unwrap_or_default()
                }
                LeaderboardStat::LongestStreak => row.longest_streak.to_string(),
            };
            format!("**{}**: {}\n", row.username, value)
        })
        .collect()
}

fn render_rows<F>(tallies: &[ParticipantTally], value: F) -> String
where
    F: Fn(&ParticipantTally) -> String,
{
    if tallies.is_empty() {
        return EMPTY_VIEW.to_string();
    }
    tallies
        .iter()
        .take(TOP_N)
        .map(|tally| format!("**{}**: {}\n", tally.display_name, value(tally)))
        .collect()
}

fn format_percent(percent: f64) -> String {
    if percent.fract() == 0.0 {
        format!("{percent:.0}%")
    } else {
        format!("{percent:.1}%")
    }
}

fn format_seconds(ms: u64) -> String {
    format!("{:.3}s", ms as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::dao::trivia_store::InMemoryTriviaStore;

    fn answer(
        round_number: u32,
        participant_id: ParticipantId,
        is_correct: bool,
        latency_ms: u64,
    ) -> AnswerEntity {
        AnswerEntity {
            round_id: Uuid::new_v4(),
            match_id: Uuid::nil(),
            round_number,
            arrival: 0,
            participant_id,
            display_name: format!("player-{participant_id}"),
            is_correct,
            option_index: 0,
            latency_ms,
            points: if is_correct { 10 } else { 0 },
        }
    }

    fn names(tallies: &[ParticipantTally]) -> Vec<ParticipantId> {
        tallies.iter().map(|tally| tally.participant_id).collect()
    }

    #[test]
    fn nobody_answering_suppresses_the_summary() {
        assert_eq!(summarize_match(&[]), None);
    }

    #[test]
    fn a_single_correct_answer_makes_a_sole_top_scorer() {
        let summary = summarize_match(&[answer(1, 7, true, 2_500)]).unwrap();

        assert_eq!(names(&summary.top_scorers), [7]);
        assert_eq!(summary.winner().map(|w| w.participant_id), Some(7));
        assert_eq!(summary.highest_accuracy[0].accuracy_percent(), 100.0);
        assert_eq!(summary.fastest_answers[0].fastest_ms, Some(2_500));

        let config = AppConfig::default();
        let category = config.category("simpsons").unwrap();
        let card = scoreboard_card(&config, category, 10, Uuid::nil(), &summary);
        assert_eq!(
            card.description.as_deref(),
            Some("**Congratulations to the top scorer, player-7 :trophy:**")
        );
        assert_eq!(card.fields[0].value, "**player-7**: 1\n");
        assert_eq!(card.fields[1].value, "**player-7**: 100%\n");
        assert_eq!(card.fields[2].value, "**player-7**: 2.500s\n");
    }

    #[test]
    fn views_rank_independently_and_ties_keep_first_answer_order() {
        let answers = vec![
            answer(1, 1, false, 900),
            answer(1, 2, true, 4_000),
            answer(1, 3, true, 1_200),
            answer(2, 1, true, 3_000),
            answer(2, 2, true, 2_000),
            answer(2, 3, false, 500),
            answer(3, 2, false, 800),
        ];
        let summary = summarize_match(&answers).unwrap();

        // 1: 1/2, 2: 2/3, 3: 1/2
        assert_eq!(names(&summary.top_scorers), [2, 1, 3]);
        assert_eq!(names(&summary.highest_accuracy), [2, 1, 3]);
        assert_eq!(names(&summary.fastest_answers), [3, 2, 1]);
        assert_eq!(summary.winner().map(|w| w.participant_id), Some(2));

        let config = AppConfig::default();
        let category = config.category("simpsons").unwrap();
        let card = scoreboard_card(&config, category, 10, Uuid::nil(), &summary);
        assert_eq!(
            card.fields[1].value,
            "**player-2**: 66.7%\n**player-1**: 50%\n**player-3**: 50%\n"
        );
    }

    #[test]
    fn a_match_without_correct_answers_has_no_winner() {
        let summary =
            summarize_match(&[answer(1, 1, false, 100), answer(1, 2, false, 200)]).unwrap();
        assert!(summary.winner().is_none());
        assert!(summary.fastest_answers.is_empty());

        let config = AppConfig::default();
        let category = config.category("futurama").unwrap();
        let card = scoreboard_card(&config, category, 10, Uuid::nil(), &summary);
        assert_eq!(card.fields[2].value, "---");
    }

    #[tokio::test]
    async fn empty_global_leaderboard_renders_nothing() {
        let store: Arc<dyn TriviaStore> = Arc::new(InMemoryTriviaStore::new());
        let card = global_leaderboard(&store, &AppConfig::default())
            .await
            .unwrap();
        assert!(card.is_none());
    }

    #[tokio::test]
    async fn global_leaderboard_lists_every_view() {
        let memory = InMemoryTriviaStore::new();
        let store: Arc<dyn TriviaStore> = Arc::new(memory.clone());
        let match_id = store.create_match(10, 1, "simpsons".into()).await.unwrap();
        let round_id = store.create_round(match_id, 1, 0).await.unwrap();
        for (arrival, (participant_id, is_correct)) in [(1, true), (2, false)].into_iter().enumerate()
        {
            store
                .record_answer(AnswerEntity {
                    round_id,
                    match_id,
                    arrival: arrival as u32,
                    ..answer(1, participant_id, is_correct, 1_500)
                })
                .await
                .unwrap();
        }
        store.complete_round(round_id).await.unwrap();
        store.apply_round_to_leaderboard(round_id).await.unwrap();
        store.complete_match(match_id).await.unwrap();

        let summary = finalize_match(&store, match_id).await.unwrap().unwrap();
        assert_eq!(summary.winner().map(|w| w.participant_id), Some(1));
        assert_eq!(memory.leaderboard_entry(1).await.unwrap().wins, 1);

        let card = global_leaderboard(&store, &AppConfig::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.kind, CardKind::Leaderboard);
        assert!(card.channel_id.is_none());
        let titles: Vec<_> = card.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            titles,
            [
                ":trophy: High Scores",
                ":first_place: Wins",
                ":white_check_mark:  Correct Answers",
                ":point_up: Fastest Answers",
                ":chart_with_upwards_trend: Longest Streak",
            ]
        );
        assert_eq!(card.fields[0].value, "**player-1**: 10\n**player-2**: 0\n");
        assert_eq!(card.fields[1].value, "**player-1**: 1\n**player-2**: 0\n");
        assert_eq!(card.fields[3].value, "**player-1**: 1.500s\n");
    }
}
