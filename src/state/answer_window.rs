use std::{collections::HashSet, time::Duration};

use dashmap::DashMap;
use futures::Stream;
use tokio::{
    sync::mpsc,
    time::{Instant, sleep_until, timeout_at},
};
use tracing::debug;

use crate::state::trivia::{AnswerSymbol, ChannelId, GuildId, ParticipantId};

/// Raw reaction forwarded by the chat adapter.
#[derive(Debug, Clone)]
pub struct ReactionEvent {
    /// Channel the reacted message lives in.
    pub channel_id: ChannelId,
    /// Guild the channel belongs to.
    pub guild_id: GuildId,
    /// Reacting user.
    pub actor_id: ParticipantId,
    /// Display name of the reacting user at reaction time.
    pub actor_name: String,
    /// Whether the platform flags the actor as a bot account.
    pub actor_is_bot: bool,
    /// Reaction emoji as sent by the platform.
    pub emoji: String,
    /// When the engine received the reaction.
    pub received_at: Instant,
}

/// First valid answer of one participant inside a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedAnswer {
    /// Answering participant.
    pub participant_id: ParticipantId,
    /// Display name carried by the reaction.
    pub display_name: String,
    /// Chosen option.
    pub symbol: AnswerSymbol,
    /// Time between the window opening and the reaction.
    pub latency: Duration,
    /// 0-based arrival order among accepted answers.
    pub arrival: u32,
}

/// Routes adapter reactions to the answer window open in their channel.
#[derive(Default)]
pub struct ReactionRouter {
    windows: DashMap<ChannelId, mpsc::UnboundedSender<ReactionEvent>>,
}

impl ReactionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start routing reactions of `channel_id` to the returned receiver.
    pub fn open(&self, channel_id: ChannelId) -> mpsc::UnboundedReceiver<ReactionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.windows.insert(channel_id, tx);
        rx
    }

    /// Stop routing reactions of `channel_id`; later reactions are dropped.
    pub fn close(&self, channel_id: ChannelId) {
        self.windows.remove(&channel_id);
    }

    /// Forward a reaction to its channel's window. Returns `false` when no
    /// window is listening.
    pub fn dispatch(&self, event: ReactionEvent) -> bool {
        let Some(tx) = self
            .windows
            .get(&event.channel_id)
            .map(|entry| entry.value().clone())
        else {
            debug!(
                channel_id = event.channel_id,
                "reaction dropped: no open answer window"
            );
            return false;
        };
        tx.send(event).is_ok()
    }

    /// Whether a window is currently listening in `channel_id`.
    pub fn is_open(&self, channel_id: ChannelId) -> bool {
        self.windows.contains_key(&channel_id)
    }
}

/// Bounded wait over one round's reactions.
///
/// Yields each participant's first valid answer in arrival order and ends
/// exactly at the deadline, never earlier.
pub struct AnswerWindow {
    receiver: mpsc::UnboundedReceiver<ReactionEvent>,
    opened_at: Instant,
    deadline: Instant,
    channel_id: ChannelId,
    guild_id: GuildId,
    bot_user_id: Option<ParticipantId>,
    answered: HashSet<ParticipantId>,
}

impl AnswerWindow {
    /// Open a window of `duration` starting now.
    pub fn open(
        receiver: mpsc::UnboundedReceiver<ReactionEvent>,
        channel_id: ChannelId,
        guild_id: GuildId,
        bot_user_id: Option<ParticipantId>,
        duration: Duration,
    ) -> Self {
        let opened_at = Instant::now();
        Self {
            receiver,
            opened_at,
            deadline: opened_at + duration,
            channel_id,
            guild_id,
            bot_user_id,
            answered: HashSet::new(),
        }
    }

    /// Wait for the next accepted answer, or `None` once the deadline passed.
    pub async fn next_answer(&mut self) -> Option<AcceptedAnswer> {
        loop {
            match timeout_at(self.deadline, self.receiver.recv()).await {
                Ok(Some(event)) => {
                    if let Some(answer) = self.accept(event) {
                        return Some(answer);
                    }
                }
                Ok(None) => {
                    sleep_until(self.deadline).await;
                    return None;
                }
                Err(_) => return None,
            }
        }
    }

    /// Consume the window as a finite stream of accepted answers.
    pub fn into_stream(mut self) -> impl Stream<Item = AcceptedAnswer> {
        async_stream::stream! {
            while let Some(answer) = self.next_answer().await {
                yield answer;
            }
        }
    }

    fn accept(&mut self, event: ReactionEvent) -> Option<AcceptedAnswer> {
        if event.actor_is_bot || Some(event.actor_id) == self.bot_user_id {
            debug!(actor_id = event.actor_id, "reaction ignored: bot actor");
            return None;
        }
        if event.channel_id != self.channel_id || event.guild_id != self.guild_id {
            debug!(
                channel_id = event.channel_id,
                guild_id = event.guild_id,
                "reaction ignored: foreign context"
            );
            return None;
        }
        if event.received_at >= self.deadline {
            return None;
        }
        let symbol = AnswerSymbol::from_emoji(&event.emoji)?;
        if !self.answered.insert(event.actor_id) {
            debug!(
                participant_id = event.actor_id,
                "reaction ignored: participant already answered"
            );
            return None;
        }

        Some(AcceptedAnswer {
            participant_id: event.actor_id,
            display_name: event.actor_name,
            symbol,
            latency: event.received_at.saturating_duration_since(self.opened_at),
            arrival: (self.answered.len() - 1) as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    const CHANNEL: ChannelId = 10;
    const GUILD: GuildId = 1;
    const BOT: ParticipantId = 999;

    fn reaction(actor_id: ParticipantId, emoji: &str) -> ReactionEvent {
        ReactionEvent {
            channel_id: CHANNEL,
            guild_id: GUILD,
            actor_id,
            actor_name: format!("user-{actor_id}"),
            actor_is_bot: false,
            emoji: emoji.into(),
            received_at: Instant::now(),
        }
    }

    fn window(router: &ReactionRouter) -> AnswerWindow {
        AnswerWindow::open(
            router.open(CHANNEL),
            CHANNEL,
            GUILD,
            Some(BOT),
            Duration::from_secs(16),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_reaction_per_participant_wins() {
        let router = ReactionRouter::new();
        let window = window(&router);

        tokio::time::advance(Duration::from_secs(2)).await;
        router.dispatch(reaction(1, "🇧"));
        router.dispatch(reaction(1, "🇦"));
        tokio::time::advance(Duration::from_secs(1)).await;
        router.dispatch(reaction(2, "🇨"));

        let answers: Vec<_> = window.into_stream().collect().await;
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].participant_id, 1);
        assert_eq!(answers[0].symbol, AnswerSymbol::B);
        assert_eq!(answers[0].latency, Duration::from_secs(2));
        assert_eq!(answers[0].arrival, 0);
        assert_eq!(answers[1].participant_id, 2);
        assert_eq!(answers[1].latency, Duration::from_secs(3));
        assert_eq!(answers[1].arrival, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bots_foreign_guilds_and_unknown_symbols_are_filtered() {
        let router = ReactionRouter::new();
        let window = window(&router);

        router.dispatch(reaction(BOT, "🇦"));
        let mut flagged = reaction(5, "🇦");
        flagged.actor_is_bot = true;
        router.dispatch(flagged);
        let mut foreign = reaction(6, "🇦");
        foreign.guild_id = GUILD + 1;
        router.dispatch(foreign);
        router.dispatch(reaction(7, "👍"));
        router.dispatch(reaction(7, "🇦"));

        let answers: Vec<_> = window.into_stream().collect().await;
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].participant_id, 7);
        assert_eq!(answers[0].symbol, AnswerSymbol::A);
    }

    #[tokio::test(start_paused = true)]
    async fn window_runs_its_full_duration_without_answers() {
        let router = ReactionRouter::new();
        let mut window = window(&router);
        let start = Instant::now();

        assert!(window.next_answer().await.is_none());
        assert_eq!(start.elapsed(), Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn window_keeps_running_when_the_router_closes_early() {
        let router = ReactionRouter::new();
        let mut window = window(&router);
        let start = Instant::now();

        router.close(CHANNEL);
        assert!(!router.dispatch(reaction(1, "🇦")));
        assert!(window.next_answer().await.is_none());
        assert_eq!(start.elapsed(), Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn reactions_after_the_deadline_are_ignored() {
        let router = ReactionRouter::new();
        let mut window = window(&router);

        tokio::time::advance(Duration::from_secs(17)).await;
        router.dispatch(reaction(1, "🇦"));
        assert!(window.next_answer().await.is_none());
    }
}
