pub mod answer_window;
pub mod cooldown;
pub mod registry;
mod sse;
pub mod state_machine;
pub mod trivia;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, watch};

use crate::{
    config::AppConfig,
    dao::trivia_store::TriviaStore,
    error::ServiceError,
    state::{
        answer_window::ReactionRouter, cooldown::CommandCooldowns, registry::SessionRegistry,
        trivia::ParticipantId,
    },
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

const CARD_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
/// Handle used to push frames to a connected chat adapter.
pub struct AdapterConnection {
    /// Name announced in the adapter's `hello` frame.
    pub name: String,
    /// Outbound frame queue drained by the connection's writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state storing sessions, connections and the store handle.
pub struct AppState {
    config: AppConfig,
    store: RwLock<Option<Arc<dyn TriviaStore>>>,
    degraded: watch::Sender<bool>,
    sessions: SessionRegistry,
    reactions: ReactionRouter,
    members: DashMap<ParticipantId, String>,
    cooldowns: CommandCooldowns,
    adapters: DashMap<String, AdapterConnection>,
    cards: SseHub,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            store: RwLock::new(None),
            degraded: degraded_tx,
            sessions: SessionRegistry::new(),
            reactions: ReactionRouter::new(),
            members: DashMap::new(),
            cooldowns: CommandCooldowns::new(),
            adapters: DashMap::new(),
            cards: SseHub::new(CARD_CHANNEL_CAPACITY),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn TriviaStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] when none is installed or
    /// the installed one failed its last health check.
    pub async fn require_store(&self) -> Result<Arc<dyn TriviaStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn TriviaStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.set_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.set_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update the degraded flag. Returns `true` when the value changed.
    pub fn set_degraded(&self, value: bool) -> bool {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        })
    }

    /// Channel sessions.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Reaction routing towards open answer windows.
    pub fn reactions(&self) -> &ReactionRouter {
        &self.reactions
    }

    /// Latest display name reported by the adapter for each participant.
    pub fn members(&self) -> &DashMap<ParticipantId, String> {
        &self.members
    }

    /// Per-channel command rate limits.
    pub fn cooldowns(&self) -> &CommandCooldowns {
        &self.cooldowns
    }

    /// Connected chat adapters keyed by connection name.
    pub fn adapters(&self) -> &DashMap<String, AdapterConnection> {
        &self.adapters
    }

    /// Broadcast hub carrying presentation cards.
    pub fn cards(&self) -> &SseHub {
        &self.cards
    }
}
