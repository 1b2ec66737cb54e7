use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Chat channel identifier (platform snowflake).
pub type ChannelId = u64;
/// Chat guild / server identifier (platform snowflake).
pub type GuildId = u64;
/// Chat user identifier (platform snowflake).
pub type ParticipantId = u64;

/// Channel a trivia session is bound to, together with its owning guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct ChannelRef {
    /// Channel where questions are posted and reactions are collected.
    pub channel_id: ChannelId,
    /// Guild owning the channel; reactions from other guilds are rejected.
    pub guild_id: GuildId,
}

/// One of the three recognised answer reactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AnswerSymbol {
    /// First option, regional indicator A.
    A,
    /// Second option, regional indicator B.
    B,
    /// Third option, regional indicator C.
    C,
}

impl AnswerSymbol {
    /// Every symbol in display order.
    pub const ALL: [AnswerSymbol; 3] = [AnswerSymbol::A, AnswerSymbol::B, AnswerSymbol::C];

    /// Map a reaction emoji onto a symbol; anything else is not an answer.
    pub fn from_emoji(emoji: &str) -> Option<Self> {
        match emoji {
            "🇦" => Some(Self::A),
            "🇧" => Some(Self::B),
            "🇨" => Some(Self::C),
            _ => None,
        }
    }

    /// Symbol shown next to the option at `index` (0-based).
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Reaction emoji the adapter attaches to question cards.
    pub fn emoji(self) -> &'static str {
        match self {
            Self::A => "🇦",
            Self::B => "🇧",
            Self::C => "🇨",
        }
    }

    /// Display position of the option this symbol selects.
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
        }
    }

    /// Letter label used in rendered cards.
    pub fn label(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
        }
    }
}

/// Immutable question loaded from a category question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Prompt shown as the card title.
    pub prompt: String,
    /// The single correct option.
    pub correct: String,
    /// Wrong options (exactly two).
    pub distractors: [String; 2],
    /// Citation revealed with the answer.
    pub source: String,
}

/// Answer options of a question in the order they are displayed for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffledOptions {
    options: Vec<String>,
    correct_index: usize,
}

impl ShuffledOptions {
    /// Shuffle the correct answer together with its distractors.
    ///
    /// The correct text is captured before shuffling and located again
    /// afterwards, so the returned index always points back at it.
    pub fn shuffle_with<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> Self {
        let correct = question.correct.clone();
        let mut options = Vec::with_capacity(AnswerSymbol::ALL.len());
        options.push(correct.clone());
        options.extend(question.distractors.iter().cloned());
        options.shuffle(rng);

        let correct_index = options
            .iter()
            .position(|option| *option == correct)
            .unwrap_or_default();

        Self {
            options,
            correct_index,
        }
    }

    /// Options in display order.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Display index of the correct option.
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    /// Symbol a participant must react with to answer correctly.
    pub fn correct_symbol(&self) -> AnswerSymbol {
        AnswerSymbol::from_index(self.correct_index).unwrap_or(AnswerSymbol::A)
    }

    /// Text of the correct option.
    pub fn correct_text(&self) -> &str {
        &self.options[self.correct_index]
    }

    /// Whether `symbol` selects the correct option.
    pub fn is_correct(&self, symbol: AnswerSymbol) -> bool {
        symbol.index() == self.correct_index
    }

    /// Option list rendered as `**A:** text` lines.
    pub fn render(&self) -> String {
        self.options
            .iter()
            .zip(AnswerSymbol::ALL)
            .map(|(option, symbol)| format!("**{}:** {}", symbol.label(), option))
            .collect::<Vec<_>>()
            .join(" \n")
    }
}

/// Pre-shuffled, non-repeating sequence of questions for one match.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<(usize, Question)>,
}

impl Deck {
    /// Shuffle the full question bank; each entry keeps its position in the bank.
    pub fn shuffled_with<R: Rng + ?Sized>(questions: Vec<Question>, rng: &mut R) -> Self {
        let mut cards: Vec<(usize, Question)> = questions.into_iter().enumerate().collect();
        if cards.len() > 1 {
            cards.shuffle(rng);
        }
        Self { cards }
    }

    /// Shuffle using the thread-local generator.
    pub fn shuffled(questions: Vec<Question>) -> Self {
        Self::shuffled_with(questions, &mut rand::rng())
    }

    /// Draw the next question together with its bank index.
    pub fn draw(&mut self) -> Option<(usize, Question)> {
        self.cards.pop()
    }

    /// Number of questions not drawn yet.
    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    /// Whether the deck is exhausted.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn question(n: usize) -> Question {
        Question {
            prompt: format!("Question {n}?"),
            correct: format!("right {n}"),
            distractors: [format!("wrong {n}a"), format!("wrong {n}b")],
            source: format!("https://example.org/{n}"),
        }
    }

    #[test]
    fn shuffled_options_always_locate_the_correct_answer() {
        let q = question(1);
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = ShuffledOptions::shuffle_with(&q, &mut rng);

            assert_eq!(shuffled.options().len(), 3);
            assert_eq!(shuffled.correct_text(), q.correct);
            assert_eq!(
                shuffled
                    .options()
                    .iter()
                    .filter(|option| **option == q.correct)
                    .count(),
                1
            );
            assert!(shuffled.is_correct(shuffled.correct_symbol()));
        }
    }

    #[test]
    fn shuffle_eventually_moves_the_correct_answer() {
        let q = question(2);
        let positions: HashSet<usize> = (0..64)
            .map(|seed| {
                ShuffledOptions::shuffle_with(&q, &mut StdRng::seed_from_u64(seed)).correct_index()
            })
            .collect();
        assert_eq!(positions.len(), 3);
    }

    #[test]
    fn render_lists_options_with_labels() {
        let q = question(3);
        let shuffled = ShuffledOptions::shuffle_with(&q, &mut StdRng::seed_from_u64(7));
        let rendered = shuffled.render();
        assert!(rendered.starts_with("**A:** "));
        assert!(rendered.contains("**B:** "));
        assert!(rendered.contains("**C:** "));
        assert!(rendered.contains(&q.correct));
    }

    #[test]
    fn symbols_round_trip_through_emoji_and_index() {
        for symbol in AnswerSymbol::ALL {
            assert_eq!(AnswerSymbol::from_emoji(symbol.emoji()), Some(symbol));
            assert_eq!(AnswerSymbol::from_index(symbol.index()), Some(symbol));
        }
        assert_eq!(AnswerSymbol::from_emoji("👍"), None);
        assert_eq!(AnswerSymbol::from_emoji("A"), None);
        assert_eq!(AnswerSymbol::from_index(3), None);
    }

    #[test]
    fn deck_draws_every_question_once() {
        let questions: Vec<Question> = (0..10).map(question).collect();
        let mut deck = Deck::shuffled_with(questions.clone(), &mut StdRng::seed_from_u64(3));
        assert_eq!(deck.remaining(), 10);

        let mut seen = HashSet::new();
        while let Some((index, q)) = deck.draw() {
            assert_eq!(questions[index], q);
            assert!(seen.insert(index), "question {index} drawn twice");
        }
        assert_eq!(seen.len(), 10);
        assert!(deck.is_empty());
    }
}
