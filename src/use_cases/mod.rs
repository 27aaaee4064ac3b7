// Use cases layer: application workflows for the session server.

pub mod game;
pub mod lobby;
pub mod replication;
pub mod session;
pub mod types;

pub use lobby::{LobbyError, LobbyHandle, LobbyRegistry, LobbySettings};
pub use replication::SessionReplicas;
pub use session::Session;
pub use types::{
    Audience, DespawnReason, EnemyId, EnemyView, Envelope, LoadoutView, Notification,
    SessionEvent, SessionPhase, StateUpdate, StateValue, UpgradeOption,
};
