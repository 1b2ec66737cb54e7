use std::time::SystemTime;

use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;

use crate::{
    dao::models::MatchId,
    state::{
        state_machine::{
            FinishReason, InvalidTransition, SessionEvent, SessionPhase, SessionStateMachine,
            Snapshot,
        },
        trivia::{ChannelId, ChannelRef},
    },
};

/// Bookkeeping kept for every channel with a running session task.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Channel and guild the session plays in.
    pub channel: ChannelRef,
    /// Key of the category being played.
    pub category_key: String,
    /// Persisted match, once created.
    pub match_id: Option<MatchId>,
    /// Lifecycle of the session.
    pub machine: SessionStateMachine,
    /// When the session was registered.
    pub started_at: SystemTime,
}

/// Point-in-time view of a session, detached from the registry lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Channel and guild the session plays in.
    pub channel: ChannelRef,
    /// Key of the category being played.
    pub category_key: String,
    /// Persisted match, once created.
    pub match_id: Option<MatchId>,
    /// State machine snapshot.
    pub machine: Snapshot,
    /// When the session was registered.
    pub started_at: SystemTime,
}

/// Failure to drive a registered session.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no session registered for channel {0}")]
    NotRegistered(ChannelId),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Sessions keyed by channel. An entry lives from a successful start until the
/// session task exits, so at most one match runs per channel.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<ChannelId, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for `channel`. Returns `false` when one already exists.
    pub fn try_register(&self, channel: ChannelRef, category_key: &str) -> bool {
        match self.sessions.entry(channel.channel_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(SessionEntry {
                    channel,
                    category_key: category_key.to_owned(),
                    match_id: None,
                    machine: SessionStateMachine::new(),
                    started_at: SystemTime::now(),
                });
                true
            }
        }
    }

    /// Whether a session task currently owns the channel, stopping or not.
    pub fn is_registered(&self, channel_id: ChannelId) -> bool {
        self.sessions.contains_key(&channel_id)
    }

    /// Whether the channel's session still accepts new rounds.
    pub fn is_active(&self, channel_id: ChannelId) -> bool {
        self.sessions
            .get(&channel_id)
            .is_some_and(|entry| entry.machine.is_active())
    }

    /// Latch a stop request on the channel's session. Returns `true` only for
    /// the call that deactivated it.
    pub fn request_stop(&self, channel_id: ChannelId, reason: FinishReason) -> bool {
        self.sessions
            .get_mut(&channel_id)
            .is_some_and(|mut entry| entry.machine.request_stop(reason))
    }

    /// Apply a lifecycle event to the channel's session.
    pub fn apply(
        &self,
        channel_id: ChannelId,
        event: SessionEvent,
    ) -> Result<SessionPhase, RegistryError> {
        let mut entry = self
            .sessions
            .get_mut(&channel_id)
            .ok_or(RegistryError::NotRegistered(channel_id))?;
        Ok(entry.machine.apply(event)?)
    }

    /// Attach the persisted match to the channel's session.
    pub fn set_match(&self, channel_id: ChannelId, match_id: MatchId) {
        if let Some(mut entry) = self.sessions.get_mut(&channel_id) {
            entry.match_id = Some(match_id);
        }
    }

    /// Release the channel.
    pub fn remove(&self, channel_id: ChannelId) -> Option<SessionEntry> {
        self.sessions.remove(&channel_id).map(|(_, entry)| entry)
    }

    pub fn snapshot(&self, channel_id: ChannelId) -> Option<SessionSnapshot> {
        self.sessions.get(&channel_id).map(|entry| SessionSnapshot {
            channel: entry.channel,
            category_key: entry.category_key.clone(),
            match_id: entry.match_id,
            machine: entry.machine.snapshot(),
            started_at: entry.started_at,
        })
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNEL: ChannelRef = ChannelRef {
        channel_id: 10,
        guild_id: 1,
    };

    #[test]
    fn second_registration_on_the_same_channel_is_refused() {
        let registry = SessionRegistry::new();
        assert!(registry.try_register(CHANNEL, "simpsons"));
        assert!(!registry.try_register(CHANNEL, "futurama"));
        assert!(registry.try_register(
            ChannelRef {
                channel_id: 11,
                guild_id: 1
            },
            "futurama"
        ));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.snapshot(CHANNEL.channel_id).unwrap().category_key,
            "simpsons"
        );
    }

    #[test]
    fn stop_deactivates_but_keeps_the_channel_registered() {
        let registry = SessionRegistry::new();
        registry.try_register(CHANNEL, "simpsons");
        registry
            .apply(CHANNEL.channel_id, SessionEvent::MatchCreated)
            .unwrap();

        assert!(registry.is_active(CHANNEL.channel_id));
        assert!(registry.request_stop(CHANNEL.channel_id, FinishReason::ForceStopped));
        assert!(!registry.request_stop(CHANNEL.channel_id, FinishReason::ForceStopped));
        assert!(!registry.is_active(CHANNEL.channel_id));
        assert!(registry.is_registered(CHANNEL.channel_id));
        assert!(!registry.try_register(CHANNEL, "simpsons"));

        registry.remove(CHANNEL.channel_id);
        assert!(!registry.is_registered(CHANNEL.channel_id));
        assert!(registry.try_register(CHANNEL, "simpsons"));
    }

    #[test]
    fn stop_on_unknown_channel_is_a_no_op() {
        let registry = SessionRegistry::new();
        assert!(!registry.request_stop(99, FinishReason::ForceStopped));
        assert!(registry.is_empty());
    }

    #[test]
    fn events_on_unknown_channel_are_rejected() {
        let registry = SessionRegistry::new();
        let err = registry
            .apply(99, SessionEvent::MatchCreated)
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotRegistered(99)));
    }
}
