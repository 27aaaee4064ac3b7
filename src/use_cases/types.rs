// Use-case level inputs/outputs for the session loop.

use crate::domain::{MovementKind, ParticipantId, Position, Rarity, ShootPattern, Slot};

pub type EnemyId = u64;

/// Inbound events, already decoded by the network layer. The session validates
/// each one against its current state before applying it.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Join {
        participant_id: ParticipantId,
    },
    Leave {
        participant_id: ParticipantId,
    },
    Ready {
        participant_id: ParticipantId,
        display_name: String,
    },
    Move {
        participant_id: ParticipantId,
        position: Position,
    },
    SelectUpgrade {
        participant_id: ParticipantId,
        index: usize,
    },
    EnemyKilled {
        participant_id: ParticipantId,
        enemy_id: EnemyId,
    },
    /// Contact damage. With an enemy id the enemy dies on impact.
    PlayerHit {
        participant_id: ParticipantId,
        enemy_id: Option<EnemyId>,
    },
    LeftBounds {
        participant_id: ParticipantId,
    },
    ReturnedToBounds {
        participant_id: ParticipantId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    WaitingForPlayers,
    FoundPlayers,
    StartingGame,
    Playing,
    GameOver,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::WaitingForPlayers => "waiting_for_players",
            SessionPhase::FoundPlayers => "found_players",
            SessionPhase::StartingGame => "starting_game",
            SessionPhase::Playing => "playing",
            SessionPhase::GameOver => "game_over",
        }
    }

    pub fn is_lobby(self) -> bool {
        matches!(
            self,
            SessionPhase::WaitingForPlayers
                | SessionPhase::FoundPlayers
                | SessionPhase::StartingGame
        )
    }
}

/// Payload of a replicated value change.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Bool(bool),
    Count(u32),
    Scale(f32),
    Text(String),
    List(Vec<String>),
    Enemies(Vec<EnemyView>),
}

/// One replicated value as it should be shown to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub field: &'static str,
    /// Set for per-slot values (lives, names, upgrade choices).
    pub slot: Option<Slot>,
    pub seq: u64,
    pub value: StateValue,
}

/// A live enemy as observers need it to instantiate and report it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnemyView {
    pub enemy_id: EnemyId,
    pub kind: String,
    pub rarity: Rarity,
    pub movement: MovementKind,
    pub move_speed: f32,
    pub chase_range: f32,
    pub max_health: u32,
    /// Where the enemy was spawned.
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DespawnReason {
    Killed,
    Contact,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeOption {
    pub name: String,
    pub description: String,
}

/// Loadout numbers pushed to the owning participant after an upgrade.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadoutView {
    pub move_speed: f32,
    pub fire_interval: f32,
    pub damage: u32,
    pub weapon: String,
    pub pattern: ShootPattern,
    pub bullet_speed: f32,
    pub bullet_lifetime: f32,
    pub piercing: bool,
}

/// One-shot messages; unlike replicated values they are not resent on reconnect.
/// Spawns and despawns are also reflected in the replicated enemy list.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ReadyChanged {
        slot: Slot,
        ready: bool,
        display_name: String,
    },
    MatchStarted,
    EnemySpawned(EnemyView),
    EnemyDespawned {
        enemy_id: EnemyId,
        reason: DespawnReason,
    },
    ShowUpgradePanel {
        options: Vec<UpgradeOption>,
    },
    HideUpgradePanel,
    LoadoutChanged(LoadoutView),
    BoundsWarning {
        visible: bool,
        seconds_left: f32,
    },
    GameOver {
        final_score: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    Participant(ParticipantId),
}

impl Audience {
    pub fn includes(self, participant_id: ParticipantId) -> bool {
        match self {
            Audience::All => true,
            Audience::Participant(id) => id == participant_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub audience: Audience,
    pub notification: Notification,
}
