// Lobby orchestration for spawning and managing session tasks.

use crate::domain::Catalogs;
use crate::domain::tuning::GameTuning;
use crate::use_cases::game::session_task;
use crate::use_cases::replication::{SessionReplicas, spawn_forwarders};
use crate::use_cases::session::Session;
use crate::use_cases::types::{Envelope, SessionEvent, StateUpdate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, RwLock, broadcast, mpsc};
use tracing::info;

/// Shared configuration for spawning lobby sessions.
#[derive(Debug, Clone)]
pub struct LobbySettings {
    /// Capacity for inbound participant events.
    pub input_channel_capacity: usize,
    /// Capacity for one-shot notifications.
    pub notify_broadcast_capacity: usize,
    /// Capacity for replicated state updates.
    pub state_broadcast_capacity: usize,
    /// Fixed tick interval for the session loop.
    pub tick_interval: Duration,
    /// Gameplay tuning applied to every new session.
    pub tuning: GameTuning,
    /// Validated enemy, upgrade and weapon content.
    pub catalogs: Catalogs,
    /// Base seed for session randomness; `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

/// Errors returned by lobby registry operations.
#[derive(Debug)]
pub enum LobbyError {
    /// Lobby already exists and cannot be re-created.
    AlreadyExists,
}

/// Per-lobby channels into and out of its session task.
#[derive(Debug, Clone)]
pub struct LobbyHandle {
    /// Identifier clients use to target this lobby.
    pub lobby_id: Arc<str>,
    /// Sender for events into the session task.
    pub input_tx: mpsc::Sender<SessionEvent>,
    /// Broadcast sender for one-shot notifications.
    pub notify_tx: broadcast::Sender<Envelope>,
    /// Broadcast sender for replicated value changes.
    pub state_tx: broadcast::Sender<StateUpdate>,
    /// Latest replicated values for join snapshots and lag recovery.
    pub replicas: SessionReplicas,
    /// Stops the session task when the lobby is removed or recycled.
    shutdown: Arc<Notify>,
}

#[derive(Debug)]
struct LobbyEntry {
    handle: LobbyHandle,
    connections: usize,
    /// Pinned lobbies are never removed; they get a fresh session when emptied.
    pinned: bool,
}

/// Thread-safe registry for active lobbies.
#[derive(Debug)]
pub struct LobbyRegistry {
    /// Global settings applied to newly created lobbies.
    settings: LobbySettings,
    /// Map of lobby id to active entry.
    lobbies: RwLock<HashMap<String, LobbyEntry>>,
    /// Sessions started so far; offsets the configured seed per session.
    sessions_started: AtomicU64,
}

impl LobbyRegistry {
    /// Creates a new registry with the provided settings.
    pub fn new(settings: LobbySettings) -> Self {
        Self {
            settings,
            lobbies: RwLock::new(HashMap::new()),
            sessions_started: AtomicU64::new(0),
        }
    }

    /// Creates a new lobby and spawns its session task.
    pub async fn create_lobby(
        &self,
        lobby_id: String,
        pinned: bool,
    ) -> Result<LobbyHandle, LobbyError> {
        let mut lobbies = self.lobbies.write().await;
        if lobbies.contains_key(&lobby_id) {
            return Err(LobbyError::AlreadyExists);
        }

        let handle = self.spawn_session(&lobby_id);
        info!(lobby_id = %lobby_id, pinned, "lobby created");
        lobbies.insert(
            lobby_id,
            LobbyEntry {
                handle: handle.clone(),
                connections: 0,
                pinned,
            },
        );
        Ok(handle)
    }

    /// Returns a lobby handle for the provided id, if it exists.
    pub async fn get_lobby(&self, lobby_id: &str) -> Option<LobbyHandle> {
        let lobbies = self.lobbies.read().await;
        lobbies.get(lobby_id).map(|entry| entry.handle.clone())
    }

    /// Counts a new connection and returns the lobby's current handle.
    pub async fn register_connection(&self, lobby_id: &str) -> Option<LobbyHandle> {
        let mut lobbies = self.lobbies.write().await;
        let entry = lobbies.get_mut(lobby_id)?;
        entry.connections += 1;
        Some(entry.handle.clone())
    }

    /// Drops a connection. The last one out removes the lobby, or recycles it when pinned.
    pub async fn register_disconnect(&self, lobby_id: &str) {
        let mut lobbies = self.lobbies.write().await;
        let Some(entry) = lobbies.get_mut(lobby_id) else {
            return;
        };
        entry.connections = entry.connections.saturating_sub(1);
        if entry.connections > 0 {
            return;
        }

        entry.handle.shutdown.notify_one();
        if entry.pinned {
            entry.handle = self.spawn_session(lobby_id);
            info!(lobby_id, "pinned lobby emptied; fresh session started");
        } else {
            lobbies.remove(lobby_id);
            info!(lobby_id, "lobby emptied and removed");
        }
    }

    fn spawn_session(&self, lobby_id: &str) -> LobbyHandle {
        let settings = &self.settings;
        let started = self.sessions_started.fetch_add(1, Ordering::Relaxed);
        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(started)),
            None => StdRng::from_entropy(),
        };

        // Channel wiring for the lobby session loop.
        let (input_tx, input_rx) = mpsc::channel::<SessionEvent>(settings.input_channel_capacity);
        let (notify_tx, _notify_rx) =
            broadcast::channel::<Envelope>(settings.notify_broadcast_capacity);
        let (state_tx, _state_rx) =
            broadcast::channel::<StateUpdate>(settings.state_broadcast_capacity);

        let session = Session::new(settings.tuning, &settings.catalogs, rng, notify_tx.clone());
        let replicas = session.replicas();
        spawn_forwarders(&replicas, state_tx.clone());

        // Spawn the authoritative session loop for this lobby.
        let shutdown = Arc::new(Notify::new());
        tokio::spawn(session_task(
            session,
            input_rx,
            settings.tick_interval,
            shutdown.clone(),
        ));

        LobbyHandle {
            lobby_id: Arc::from(lobby_id),
            input_tx,
            notify_tx,
            state_tx,
            replicas,
            shutdown,
        }
    }
}
