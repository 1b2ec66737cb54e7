use std::{collections::HashMap, sync::Arc};

use futures::StreamExt;
use rand::Rng;
use tracing::{debug, info};

use crate::{
    config::Category,
    dao::{
        models::{AnswerEntity, MatchId, RoundId},
        trivia_store::TriviaStore,
    },
    dto::card::{Card, CardKind},
    error::ServiceError,
    services::card_events,
    state::{
        SharedState,
        answer_window::AnswerWindow,
        state_machine::{FinishReason, SessionEvent},
        trivia::{AnswerSymbol, ChannelRef, ParticipantId, Question, ShuffledOptions},
    },
};

/// Points every correct answer earns before the speed bonus.
const BASE_POINTS: u32 = 10;

/// Everything a round needs to know about the match it belongs to.
#[derive(Clone)]
pub struct RoundContext {
    pub state: SharedState,
    pub store: Arc<dyn TriviaStore>,
    pub channel: ChannelRef,
    pub category: Category,
    pub match_id: MatchId,
}

/// Result statement appended to the reveal card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Nobody answered; the session stops.
    NoAnswers,
    /// Answers came in but none was correct.
    NoCorrectAnswers,
    /// A single participant answered, correctly.
    SoleCorrect,
    /// Number of correct answers with the names of those who gave them.
    Tally {
        /// Correct participants in arrival order.
        roster: Vec<String>,
    },
}

impl Verdict {
    fn from_answers(answers: &[RecordedAnswer]) -> Self {
        let roster: Vec<String> = answers
            .iter()
            .filter(|answer| answer.is_correct)
            .map(|answer| answer.display_name.clone())
            .collect();

        match (answers.len(), roster.len()) {
            (0, _) => Verdict::NoAnswers,
            (_, 0) => Verdict::NoCorrectAnswers,
            (1, 1) => Verdict::SoleCorrect,
            _ => Verdict::Tally { roster },
        }
    }

    /// Markdown statement shown under the revealed answer.
    pub fn render(&self) -> String {
        match self {
            Verdict::NoAnswers => "⛔ **No answers given! Trivia has ended.**".to_string(),
            Verdict::NoCorrectAnswers => "**No correct answers!**".to_string(),
            Verdict::SoleCorrect => "**Correct!**".to_string(),
            Verdict::Tally { roster } => {
                let plural = if roster.len() == 1 { "" } else { "s" };
                let mut text = format!("**{} correct answer{plural}!**", roster.len());
                for name in roster {
                    text.push('\n');
                    text.push_str(name);
                }
                text
            }
        }
    }
}

/// Summary of a played round.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub round_id: RoundId,
    pub number: u32,
    pub answers: usize,
    pub correct: usize,
    pub correct_symbol: AnswerSymbol,
    pub verdict: Verdict,
}

#[derive(Debug, Clone)]
struct RecordedAnswer {
    participant_id: ParticipantId,
    display_name: String,
    is_correct: bool,
}

/// Ask one question: post it, collect answers for the whole window, persist
/// and fold the round, then reveal the answer.
///
/// The session must already be in the collecting phase for `number`.
pub async fn play_round<R: Rng + ?Sized>(
    ctx: &RoundContext,
    number: u32,
    question_index: usize,
    question: &Question,
    rng: &mut R,
) -> Result<RoundOutcome, ServiceError> {
    let options = ShuffledOptions::shuffle_with(question, rng);
    let channel_id = ctx.channel.channel_id;
    let config = ctx.state.config();

    let round_id = ctx
        .store
        .create_round(ctx.match_id, number, question_index)
        .await?;

    let receiver = ctx.state.reactions().open(channel_id);
    let window = AnswerWindow::open(
        receiver,
        channel_id,
        ctx.channel.guild_id,
        config.bot_user_id(),
        config.answer_window(),
    );
    card_events::post_card(&ctx.state, &question_card(ctx, number, question, &options));
    info!(
        channel_id,
        match_id = %ctx.match_id,
        %round_id,
        round = number,
        question_index,
        "answer window opened"
    );

    let collected = collect_answers(ctx, round_id, number, &options, window).await;
    ctx.state.reactions().close(channel_id);
    let mut answers = collected?;
    ctx.state
        .sessions()
        .apply(channel_id, SessionEvent::WindowClosed)?;

    let mut names = HashMap::with_capacity(answers.len());
    for answer in &mut answers {
        if let Some((_, current)) = ctx.state.members().remove(&answer.participant_id) {
            answer.display_name = current;
        }
        names.insert(answer.participant_id, answer.display_name.clone());
    }
    if !names.is_empty() {
        ctx.store.refresh_display_names(round_id, names).await?;
    }

    ctx.store.complete_round(round_id).await?;
    let folded = ctx.store.apply_round_to_leaderboard(round_id).await?;

    let verdict = Verdict::from_answers(&answers);
    let correct = answers.iter().filter(|answer| answer.is_correct).count();
    if verdict == Verdict::NoAnswers
        && ctx
            .state
            .sessions()
            .request_stop(channel_id, FinishReason::NoAnswers)
    {
        info!(channel_id, match_id = %ctx.match_id, "no answers given; stopping session");
    }

    card_events::post_card(
        &ctx.state,
        &reveal_card(ctx, number, question, &options, &verdict),
    );
    ctx.state
        .sessions()
        .apply(channel_id, SessionEvent::RoundRevealed)?;

    info!(
        channel_id,
        %round_id,
        round = number,
        answers = answers.len(),
        correct,
        folded,
        "round complete"
    );

    Ok(RoundOutcome {
        round_id,
        number,
        answers: answers.len(),
        correct,
        correct_symbol: options.correct_symbol(),
        verdict,
    })
}

async fn collect_answers(
    ctx: &RoundContext,
    round_id: RoundId,
    number: u32,
    options: &ShuffledOptions,
    window: AnswerWindow,
) -> Result<Vec<RecordedAnswer>, ServiceError> {
    let window_len = ctx.state.config().answer_window();
    let stream = window.into_stream();
    futures::pin_mut!(stream);

    let mut recorded = Vec::new();
    while let Some(answer) = stream.next().await {
        let is_correct = options.is_correct(answer.symbol);
        let points = if is_correct {
            let remaining = window_len.saturating_sub(answer.latency).as_secs();
            BASE_POINTS + u32::try_from(remaining).unwrap_or(u32::MAX - BASE_POINTS)
        } else {
            0
        };

        ctx.store
            .record_answer(AnswerEntity {
                round_id,
                match_id: ctx.match_id,
                round_number: number,
                arrival: answer.arrival,
                participant_id: answer.participant_id,
                display_name: answer.display_name.clone(),
                is_correct,
                option_index: answer.symbol.index() as u8,
                latency_ms: u64::try_from(answer.latency.as_millis()).unwrap_or(u64::MAX),
                points,
            })
            .await?;
        debug!(
            %round_id,
            participant_id = answer.participant_id,
            is_correct,
            latency_ms = answer.latency.as_millis() as u64,
            "answer recorded"
        );

        recorded.push(RecordedAnswer {
            participant_id: answer.participant_id,
            display_name: answer.display_name,
            is_correct,
        });
    }

    Ok(recorded)
}

fn question_card(
    ctx: &RoundContext,
    number: u32,
    question: &Question,
    options: &ShuffledOptions,
) -> Card {
    let config = ctx.state.config();
    Card::new(CardKind::Question)
        .in_channel(ctx.channel.channel_id)
        .with_match(ctx.match_id)
        .with_round(number)
        .with_title(question.prompt.clone())
        .with_description(format!("{} \n\nReact below to answer!", options.render()))
        .with_color(ctx.category.color)
        .with_thumbnail(ctx.category.thumbnail_url.clone())
        .with_reactions(
            AnswerSymbol::ALL
                .iter()
                .map(|symbol| symbol.emoji().to_string())
                .collect(),
        )
        .with_timing(
            Some(config.answer_window().as_secs()),
            config.card_lifetime().as_secs(),
        )
}

fn reveal_card(
    ctx: &RoundContext,
    number: u32,
    question: &Question,
    options: &ShuffledOptions,
    verdict: &Verdict,
) -> Card {
    let description = format!(
        "**{}:** {}\n**Source:** <{}> \n\n{}",
        options.correct_symbol().label(),
        options.correct_text(),
        question.source,
        verdict.render()
    );
    Card::new(CardKind::Reveal)
        .in_channel(ctx.channel.channel_id)
        .with_match(ctx.match_id)
        .with_round(number)
        .with_title(question.prompt.clone())
        .with_description(description)
        .with_color(ctx.category.color)
        .with_timing(None, ctx.state.config().card_lifetime().as_secs())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{SeedableRng, rngs::StdRng};
    use tokio::{sync::broadcast, time::Instant};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::trivia_store::InMemoryTriviaStore,
        dto::sse::ServerEvent,
        state::{AppState, answer_window::ReactionEvent, state_machine::SessionPhase},
    };

    const CHANNEL: ChannelRef = ChannelRef {
        channel_id: 10,
        guild_id: 1,
    };

    struct Harness {
        ctx: RoundContext,
        store: Arc<InMemoryTriviaStore>,
        cards: broadcast::Receiver<ServerEvent>,
    }

    async fn harness() -> Harness {
        let state = AppState::new(AppConfig::default());
        let store = Arc::new(InMemoryTriviaStore::new());
        state.install_store(store.clone()).await;
        let match_id = store
            .create_match(CHANNEL.channel_id, CHANNEL.guild_id, "simpsons".into())
            .await
            .unwrap();

        state.sessions().try_register(CHANNEL, "simpsons");
        state
            .sessions()
            .apply(CHANNEL.channel_id, SessionEvent::MatchCreated)
            .unwrap();
        state
            .sessions()
            .apply(CHANNEL.channel_id, SessionEvent::RoundOpened { round: 1 })
            .unwrap();

        let category = state.config().category("simpsons").unwrap().clone();
        let cards = state.cards().subscribe();
        Harness {
            ctx: RoundContext {
                state,
                store: store.clone(),
                channel: CHANNEL,
                category,
                match_id,
            },
            store,
            cards,
        }
    }

    fn question() -> Question {
        Question {
            prompt: "Who runs the Kwik-E-Mart?".into(),
            correct: "Apu".into(),
            distractors: ["Moe".into(), "Otto".into()],
            source: "https://simpsons.fandom.com/wiki/Apu".into(),
        }
    }

    fn reaction(actor_id: ParticipantId, symbol: AnswerSymbol) -> ReactionEvent {
        ReactionEvent {
            channel_id: CHANNEL.channel_id,
            guild_id: CHANNEL.guild_id,
            actor_id,
            actor_name: format!("player-{actor_id}"),
            actor_is_bot: false,
            emoji: symbol.emoji().into(),
            received_at: Instant::now(),
        }
    }

    fn wrong_symbol(correct: AnswerSymbol) -> AnswerSymbol {
        AnswerSymbol::ALL
            .into_iter()
            .find(|symbol| *symbol != correct)
            .unwrap()
    }

    async fn next_card(cards: &mut broadcast::Receiver<ServerEvent>) -> serde_json::Value {
        let event = cards.recv().await.unwrap();
        serde_json::from_str(&event.data).unwrap()
    }

    /// Spawn the round and wait until its question card is posted.
    async fn start_round(
        harness: &mut Harness,
        seed: u64,
    ) -> (
        AnswerSymbol,
        tokio::task::JoinHandle<Result<RoundOutcome, ServiceError>>,
    ) {
        let q = question();
        let rng = StdRng::seed_from_u64(seed);
        let correct = ShuffledOptions::shuffle_with(&q, &mut rng.clone()).correct_symbol();

        let ctx = harness.ctx.clone();
        let handle = tokio::spawn(async move {
            let mut rng = rng;
            play_round(&ctx, 1, 0, &q, &mut rng).await
        });

        let card = next_card(&mut harness.cards).await;
        assert_eq!(card["kind"], "question");
        assert_eq!(card["countdown_secs"], 16);
        assert_eq!(card["delete_after_secs"], 19);
        assert_eq!(card["reactions"], serde_json::json!(["🇦", "🇧", "🇨"]));
        (correct, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn one_correct_and_one_wrong_answer_are_recorded_and_tallied() {
        let mut harness = harness().await;
        let (correct, handle) = start_round(&mut harness, 11).await;

        tokio::time::advance(Duration::from_secs(3)).await;
        harness.ctx.state.reactions().dispatch(reaction(1, correct));
        tokio::time::advance(Duration::from_secs(1)).await;
        harness
            .ctx
            .state
            .reactions()
            .dispatch(reaction(2, wrong_symbol(correct)));

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.answers, 2);
        assert_eq!(outcome.correct, 1);
        assert_eq!(
            outcome.verdict,
            Verdict::Tally {
                roster: vec!["player-1".into()]
            }
        );

        let answers = harness.store.round_answers(outcome.round_id).await.unwrap();
        assert_eq!(answers.len(), 2);
        assert!(answers[0].is_correct);
        assert_eq!(answers[0].latency_ms, 3_000);
        assert_eq!(answers[0].points, 23);
        assert!(!answers[1].is_correct);
        assert_eq!(answers[1].points, 0);

        let round = harness.store.round(outcome.round_id).await.unwrap();
        assert!(round.is_complete);
        assert!(round.leaderboard_applied);

        let reveal = next_card(&mut harness.cards).await;
        assert_eq!(reveal["kind"], "reveal");
        let description = reveal["description"].as_str().unwrap();
        assert!(description.starts_with(&format!("**{}:** Apu\n", correct.label())));
        assert!(description.contains("**Source:** <https://simpsons.fandom.com/wiki/Apu>"));
        assert!(description.ends_with("**1 correct answer!**\nplayer-1"));

        assert!(harness.ctx.state.sessions().is_active(CHANNEL.channel_id));
        assert_eq!(
            harness
                .ctx
                .state
                .sessions()
                .snapshot(CHANNEL.channel_id)
                .unwrap()
                .machine
                .phase,
            SessionPhase::AwaitingRound
        );
        assert!(!harness.ctx.state.reactions().is_open(CHANNEL.channel_id));
    }

    #[tokio::test(start_paused = true)]
    async fn several_correct_answers_are_counted_and_listed_in_arrival_order() {
        let mut harness = harness().await;
        let (correct, handle) = start_round(&mut harness, 13).await;

        let reactions = harness.ctx.state.reactions();
        tokio::time::advance(Duration::from_secs(1)).await;
        reactions.dispatch(reaction(3, correct));
        tokio::time::advance(Duration::from_secs(1)).await;
        reactions.dispatch(reaction(4, wrong_symbol(correct)));
        tokio::time::advance(Duration::from_secs(1)).await;
        reactions.dispatch(reaction(5, correct));

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.answers, 3);
        assert_eq!(outcome.correct, 2);
        assert_eq!(
            outcome.verdict,
            Verdict::Tally {
                roster: vec!["player-3".into(), "player-5".into()]
            }
        );

        let reveal = next_card(&mut harness.cards).await;
        let description = reveal["description"].as_str().unwrap();
        assert!(description.ends_with("**2 correct answers!**\nplayer-3\nplayer-5"));
        assert!(!description.contains("player-4"));
    }

    #[tokio::test(start_paused = true)]
    async fn a_round_without_answers_stops_the_session() {
        let mut harness = harness().await;
        let started = Instant::now();
        let (_, handle) = start_round(&mut harness, 3).await;

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.answers, 0);
        assert_eq!(outcome.verdict, Verdict::NoAnswers);
        assert!(started.elapsed() >= Duration::from_secs(16));
        assert!(harness.store.round(outcome.round_id).await.unwrap().is_complete);

        let reveal = next_card(&mut harness.cards).await;
        assert!(
            reveal["description"]
                .as_str()
                .unwrap()
                .ends_with("⛔ **No answers given! Trivia has ended.**")
        );
        assert!(!harness.ctx.state.sessions().is_active(CHANNEL.channel_id));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_reactions_keep_the_first_answer_only() {
        let mut harness = harness().await;
        let (correct, handle) = start_round(&mut harness, 5).await;

        tokio::time::advance(Duration::from_secs(2)).await;
        let reactions = harness.ctx.state.reactions();
        reactions.dispatch(reaction(1, wrong_symbol(correct)));
        reactions.dispatch(reaction(1, correct));
        reactions.dispatch(reaction(1, correct));

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.answers, 1);
        assert_eq!(outcome.verdict, Verdict::NoCorrectAnswers);

        let answers = harness.store.round_answers(outcome.round_id).await.unwrap();
        assert_eq!(answers.len(), 1);
        assert!(!answers[0].is_correct);
        assert_eq!(
            answers[0].option_index as usize,
            wrong_symbol(correct).index()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn a_single_correct_answer_is_announced_and_names_are_refreshed() {
        let mut harness = harness().await;
        let (correct, handle) = start_round(&mut harness, 8).await;

        harness
            .ctx
            .state
            .members()
            .insert(1, "Max Power".to_string());
        harness.ctx.state.reactions().dispatch(reaction(1, correct));

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.verdict, Verdict::SoleCorrect);

        let answers = harness.store.round_answers(outcome.round_id).await.unwrap();
        assert_eq!(answers[0].display_name, "Max Power");
        assert_eq!(answers[0].points, 26);
        let entry = harness.store.leaderboard_entry(1).await.unwrap();
        assert_eq!(entry.username, "Max Power");
        assert_eq!(entry.score, 26);
        assert!(harness.ctx.state.members().get(&1).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_mid_round_lets_the_window_finish() {
        let mut harness = harness().await;
        let (correct, handle) = start_round(&mut harness, 9).await;

        let sessions = harness.ctx.state.sessions();
        assert!(sessions.request_stop(CHANNEL.channel_id, FinishReason::ForceStopped));
        tokio::time::advance(Duration::from_secs(5)).await;
        harness.ctx.state.reactions().dispatch(reaction(4, correct));

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.answers, 1);
        assert!(harness.store.round(outcome.round_id).await.unwrap().is_complete);
        assert!(!sessions.is_active(CHANNEL.channel_id));
    }
}
