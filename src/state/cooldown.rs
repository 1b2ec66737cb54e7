use std::{collections::VecDeque, time::Duration};

use dashmap::DashMap;
use tokio::time::Instant;

use crate::{
    config::{CooldownConfig, CooldownRule},
    state::trivia::ChannelId,
};

/// Command groups sharing one rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBucket {
    /// Every trivia start command, whatever the category.
    Start,
    /// The informational stop command.
    Stop,
}

/// Sliding-window rate limits applied per channel and bucket.
#[derive(Default)]
pub struct CommandCooldowns {
    hits: DashMap<(ChannelId, CommandBucket), VecDeque<Instant>>,
}

impl CommandCooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one use of `bucket` in `channel_id`, or return how long to wait
    /// when `rule` is exhausted.
    pub fn check(
        &self,
        channel_id: ChannelId,
        bucket: CommandBucket,
        rule: CooldownRule,
    ) -> Result<(), Duration> {
        let now = Instant::now();
        let mut hits = self.hits.entry((channel_id, bucket)).or_default();

        while hits
            .front()
            .is_some_and(|hit| now.saturating_duration_since(*hit) >= rule.per)
        {
            hits.pop_front();
        }

        if hits.len() >= rule.uses as usize {
            let oldest = hits.front().copied().unwrap_or(now);
            return Err((oldest + rule.per).saturating_duration_since(now));
        }

        hits.push_back(now);
        Ok(())
    }

    /// Drop channels whose recorded uses all fell out of their window.
    pub fn prune(&self, rules: CooldownConfig) {
        let now = Instant::now();
        self.hits.retain(|(_, bucket), hits| {
            let per = match bucket {
                CommandBucket::Start => rules.start.per,
                CommandBucket::Stop => rules.stop.per,
            };
            hits.back()
                .is_some_and(|hit| now.saturating_duration_since(*hit) < per)
        });
    }

    /// Number of tracked channel and bucket pairs.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether no channel is tracked.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}
