// Domain layer: gameplay rules and replicated session state.

pub mod bounds;
pub mod catalog;
pub mod errors;
pub mod lives;
pub mod loadout;
pub mod participant;
pub mod replicated;
pub mod spawn;
pub mod timers;
pub mod tuning;
pub mod upgrades;
pub mod waves;

pub use bounds::BoundsMonitor;
pub use catalog::{
    CatalogError, Catalogs, EnemyKind, MovementKind, Rarity, ShootPattern, UpgradeDef,
    UpgradeEffect, WeaponConfig,
};
pub use errors::{KillRejected, RosterError, SelectionRejected, WaveError};
pub use lives::{LifeLost, LivesAuthority, LivesReplicas};
pub use loadout::Loadout;
pub use participant::{Participant, ParticipantId, ReadyChange, Roster, Slot};
pub use replicated::{Mirror, ReplicaHandle, Replicated, ValueChange, Versioned};
pub use spawn::{Position, SpawnDirector, SpawnPlan};
pub use timers::{PauseReason, SimClock, TimerId, TimerQueue};
pub use upgrades::{UpgradeGate, UpgradeReplicas};
pub use waves::{KillRecorded, WaveReplicas, WaveScheduler, WaveState, WaveStep};
