use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Why a session left the running phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Every question of the category was asked.
    DeckExhausted,
    /// A round closed without a single answer.
    NoAnswers,
    /// A guild manager stopped the session.
    ForceStopped,
    /// A storage or presentation failure aborted the session.
    Failed,
}

/// Lifecycle phases of one channel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Registered; the match record is being created.
    Starting,
    /// Between rounds, about to draw the next question.
    AwaitingRound,
    /// The answer window of `round` is open.
    Collecting {
        /// 1-based round number.
        round: u32,
    },
    /// The window of `round` closed; results are being persisted and revealed.
    Revealing {
        /// 1-based round number.
        round: u32,
    },
    /// Terminal phase.
    Finished(FinishReason),
}

impl SessionPhase {
    /// Short label used by the status endpoint and logs.
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Starting => "starting",
            SessionPhase::AwaitingRound => "awaiting_round",
            SessionPhase::Collecting { .. } => "collecting",
            SessionPhase::Revealing { .. } => "revealing",
            SessionPhase::Finished(_) => "finished",
        }
    }

    /// Round currently being played, if any.
    pub fn round(&self) -> Option<u32> {
        match self {
            SessionPhase::Collecting { round } | SessionPhase::Revealing { round } => Some(*round),
            _ => None,
        }
    }
}

/// Events driving a [`SessionStateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The match record exists; rounds may start.
    MatchCreated,
    /// The answer window of `round` opened.
    RoundOpened {
        /// 1-based round number.
        round: u32,
    },
    /// The answer window elapsed.
    WindowClosed,
    /// The reveal card was posted and the round persisted.
    RoundRevealed,
    /// Leave the session between rounds, for the latched stop reason or deck exhaustion.
    Finish,
    /// Abort the session from any live phase.
    Fail,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase.
    pub phase: SessionPhase,
    /// Incremented on every applied transition.
    pub version: usize,
    /// Stop reason latched while the current round finishes.
    pub stop_requested: Option<FinishReason>,
}

/// Per-channel session lifecycle.
///
/// Stopping is cooperative: [`request_stop`](Self::request_stop) only latches a
/// reason, the open window keeps running, and the next [`SessionEvent::RoundOpened`]
/// is refused so the session task winds down through [`SessionEvent::Finish`].
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    version: usize,
    stop_requested: Option<FinishReason>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Starting,
            version: 0,
            stop_requested: None,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine in the starting phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether the session still accepts new rounds.
    pub fn is_active(&self) -> bool {
        self.stop_requested.is_none() && !matches!(self.phase, SessionPhase::Finished(_))
    }

    /// Reason latched by [`request_stop`](Self::request_stop), if any.
    pub fn stop_requested(&self) -> Option<FinishReason> {
        self.stop_requested
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            stop_requested: self.stop_requested,
        }
    }

    /// Latch a stop request. Returns `false` when the session was already
    /// stopping or finished, leaving the first reason in place.
    pub fn request_stop(&mut self, reason: FinishReason) -> bool {
        if !self.is_active() {
            return false;
        }
        self.stop_requested = Some(reason);
        true
    }

    /// Apply `event`, returning the new phase.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::Starting, SessionEvent::MatchCreated) => SessionPhase::AwaitingRound,
            (SessionPhase::AwaitingRound, SessionEvent::RoundOpened { round })
                if self.stop_requested.is_none() =>
            {
                SessionPhase::Collecting { round }
            }
            (SessionPhase::Collecting { round }, SessionEvent::WindowClosed) => {
                SessionPhase::Revealing { round }
            }
            (SessionPhase::Revealing { .. }, SessionEvent::RoundRevealed) => {
                SessionPhase::AwaitingRound
            }
            (SessionPhase::AwaitingRound, SessionEvent::Finish) => SessionPhase::Finished(
                self.stop_requested.unwrap_or(FinishReason::DeckExhausted),
            ),
            (SessionPhase::Finished(_), SessionEvent::Fail) => {
                return Err(InvalidTransition {
                    from: self.phase,
                    event,
                });
            }
            (_, SessionEvent::Fail) => SessionPhase::Finished(FinishReason::Failed),
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_round(sm: &mut SessionStateMachine, round: u32) {
        assert_eq!(
            sm.apply(SessionEvent::RoundOpened { round }).unwrap(),
            SessionPhase::Collecting { round }
        );
        assert_eq!(
            sm.apply(SessionEvent::WindowClosed).unwrap(),
            SessionPhase::Revealing { round }
        );
        assert_eq!(
            sm.apply(SessionEvent::RoundRevealed).unwrap(),
            SessionPhase::AwaitingRound
        );
    }

    #[test]
    fn initial_state_is_starting() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.phase(), SessionPhase::Starting);
        assert!(sm.is_active());
        assert_eq!(sm.snapshot().version, 0);
    }

    #[test]
    fn full_happy_path_until_deck_exhausted() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionEvent::MatchCreated).unwrap();
        play_round(&mut sm, 1);
        play_round(&mut sm, 2);

        assert_eq!(
            sm.apply(SessionEvent::Finish).unwrap(),
            SessionPhase::Finished(FinishReason::DeckExhausted)
        );
        assert!(!sm.is_active());
        assert_eq!(sm.snapshot().version, 8);
    }

    #[test]
    fn stop_mid_round_lets_the_window_finish_but_blocks_the_next_round() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionEvent::MatchCreated).unwrap();
        sm.apply(SessionEvent::RoundOpened { round: 1 }).unwrap();

        assert!(sm.request_stop(FinishReason::ForceStopped));
        assert!(!sm.is_active());

        sm.apply(SessionEvent::WindowClosed).unwrap();
        sm.apply(SessionEvent::RoundRevealed).unwrap();

        let err = sm.apply(SessionEvent::RoundOpened { round: 2 }).unwrap_err();
        assert_eq!(err.from, SessionPhase::AwaitingRound);
        assert_eq!(
            sm.apply(SessionEvent::Finish).unwrap(),
            SessionPhase::Finished(FinishReason::ForceStopped)
        );
    }

    #[test]
    fn request_stop_keeps_the_first_reason() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionEvent::MatchCreated).unwrap();

        assert!(sm.request_stop(FinishReason::NoAnswers));
        assert!(!sm.request_stop(FinishReason::ForceStopped));
        assert_eq!(sm.stop_requested(), Some(FinishReason::NoAnswers));
    }

    #[test]
    fn finish_is_refused_while_a_round_is_open() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionEvent::MatchCreated).unwrap();
        sm.apply(SessionEvent::RoundOpened { round: 1 }).unwrap();

        let err = sm.apply(SessionEvent::Finish).unwrap_err();
        assert_eq!(err.from, SessionPhase::Collecting { round: 1 });
        assert_eq!(err.event, SessionEvent::Finish);
    }

    #[test]
    fn fail_is_legal_from_any_live_phase_only() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionEvent::MatchCreated).unwrap();
        sm.apply(SessionEvent::RoundOpened { round: 1 }).unwrap();
        assert_eq!(
            sm.apply(SessionEvent::Fail).unwrap(),
            SessionPhase::Finished(FinishReason::Failed)
        );
        assert!(sm.apply(SessionEvent::Fail).is_err());
        assert!(!sm.request_stop(FinishReason::ForceStopped));
    }
}
