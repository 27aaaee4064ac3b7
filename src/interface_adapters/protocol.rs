// Wire protocol DTOs and conversions for public session messages.

use crate::domain::{MovementKind, Rarity, ShootPattern};
use crate::use_cases::{
    DespawnReason, EnemyView, LoadoutView, Notification, StateUpdate, StateValue, UpgradeOption,
};
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Assigned identity for the connection after Join is accepted.
    Identity { player_id: String },
    // Every replicated value; sent after Join and whenever the client lagged.
    Snapshot { updates: Vec<StateDto> },
    // A single replicated value change.
    State(StateDto),
    // One-shot event (spawns, panels, warnings, game over).
    Notice(NoticeDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    // Initial handshake message; must be the first message on the socket.
    Join(JoinPayload),
    // Toggle readiness in the lobby.
    Ready(ReadyPayload),
    // Owner-reported actor position, used as a spawn anchor.
    Move(MovePayload),
    SelectUpgrade(SelectUpgradePayload),
    EnemyKilled(EnemyKilledPayload),
    Hit(HitPayload),
    LeftBounds,
    ReturnedToBounds,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinPayload {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    // Empty falls back to the name given at Join.
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovePayload {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectUpgradePayload {
    pub index: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnemyKilledPayload {
    pub enemy_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HitPayload {
    // Set when an enemy body touched the player.
    #[serde(default)]
    pub enemy_id: Option<String>,
}

/// Replicated value as seen on the wire. Clients keep the highest `seq` per
/// (`field`, `slot`) and drop anything older.
#[derive(Debug, Clone, Serialize)]
pub struct StateDto {
    pub field: &'static str,
    // One-based player number for per-slot values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<usize>,
    pub seq: u64,
    pub value: StateValueDto,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StateValueDto {
    Bool(bool),
    Count(u32),
    Scale(f32),
    Text(String),
    List(Vec<String>),
    Enemies(Vec<EnemyDto>),
}

impl From<StateUpdate> for StateDto {
    fn from(update: StateUpdate) -> Self {
        Self {
            field: update.field,
            slot: update.slot.map(|s| s.number()),
            seq: update.seq,
            value: match update.value {
                StateValue::Bool(v) => StateValueDto::Bool(v),
                StateValue::Count(v) => StateValueDto::Count(v),
                StateValue::Scale(v) => StateValueDto::Scale(v),
                StateValue::Text(v) => StateValueDto::Text(v),
                StateValue::List(v) => StateValueDto::List(v),
                StateValue::Enemies(v) => {
                    StateValueDto::Enemies(v.into_iter().map(EnemyDto::from).collect())
                }
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoticeDto {
    ReadyChanged {
        slot: usize,
        ready: bool,
        display_name: String,
    },
    MatchStarted,
    EnemySpawned(EnemyDto),
    EnemyDespawned {
        enemy_id: String,
        reason: &'static str,
    },
    ShowUpgradePanel {
        options: Vec<UpgradeOptionDto>,
    },
    HideUpgradePanel,
    LoadoutChanged(LoadoutDto),
    BoundsWarning {
        visible: bool,
        seconds_left: f32,
    },
    GameOver {
        final_score: u32,
    },
}

/// Live enemy on the wire; ids are strings so clients never lose precision.
#[derive(Debug, Clone, Serialize)]
pub struct EnemyDto {
    pub enemy_id: String,
    pub enemy_type: String,
    pub rarity: &'static str,
    pub movement: &'static str,
    pub move_speed: f32,
    pub chase_range: f32,
    pub max_health: u32,
    pub x: f32,
    pub y: f32,
}

impl From<EnemyView> for EnemyDto {
    fn from(view: EnemyView) -> Self {
        Self {
            enemy_id: view.enemy_id.to_string(),
            enemy_type: view.kind,
            rarity: rarity_name(view.rarity),
            movement: movement_name(view.movement),
            move_speed: view.move_speed,
            chase_range: view.chase_range,
            max_health: view.max_health,
            x: view.position.x,
            y: view.position.y,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpgradeOptionDto {
    pub name: String,
    pub description: String,
}

impl From<UpgradeOption> for UpgradeOptionDto {
    fn from(option: UpgradeOption) -> Self {
        Self {
            name: option.name,
            description: option.description,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadoutDto {
    pub move_speed: f32,
    pub fire_interval: f32,
    pub damage: u32,
    pub weapon: String,
    pub pattern: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bullet_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spread_angle: Option<u32>,
    pub bullet_speed: f32,
    pub bullet_lifetime: f32,
    pub piercing: bool,
}

impl From<LoadoutView> for LoadoutDto {
    fn from(view: LoadoutView) -> Self {
        let (pattern, bullet_count, spread_angle) = match view.pattern {
            ShootPattern::Single => ("single", None, None),
            ShootPattern::Burst { count } => ("burst", Some(count), None),
            ShootPattern::Spread { count, angle_deg } => ("spread", Some(count), Some(angle_deg)),
            ShootPattern::RapidFire => ("rapid_fire", None, None),
        };
        Self {
            move_speed: view.move_speed,
            fire_interval: view.fire_interval,
            damage: view.damage,
            weapon: view.weapon,
            pattern,
            bullet_count,
            spread_angle,
            bullet_speed: view.bullet_speed,
            bullet_lifetime: view.bullet_lifetime,
            piercing: view.piercing,
        }
    }
}

fn rarity_name(rarity: Rarity) -> &'static str {
    match rarity {
        Rarity::Common => "common",
        Rarity::Uncommon => "uncommon",
        Rarity::Rare => "rare",
        Rarity::Epic => "epic",
        Rarity::Legendary => "legendary",
    }
}

fn movement_name(movement: MovementKind) -> &'static str {
    match movement {
        MovementKind::Stationary => "stationary",
        MovementKind::Chase => "chase",
    }
}

impl From<Notification> for NoticeDto {
    fn from(notification: Notification) -> Self {
        match notification {
            Notification::ReadyChanged {
                slot,
                ready,
                display_name,
            } => NoticeDto::ReadyChanged {
                slot: slot.number(),
                ready,
                display_name,
            },
            Notification::MatchStarted => NoticeDto::MatchStarted,
            Notification::EnemySpawned(view) => NoticeDto::EnemySpawned(view.into()),
            Notification::EnemyDespawned { enemy_id, reason } => NoticeDto::EnemyDespawned {
                enemy_id: enemy_id.to_string(),
                reason: match reason {
                    DespawnReason::Killed => "killed",
                    DespawnReason::Contact => "contact",
                },
            },
            Notification::ShowUpgradePanel { options } => NoticeDto::ShowUpgradePanel {
                options: options.into_iter().map(UpgradeOptionDto::from).collect(),
            },
            Notification::HideUpgradePanel => NoticeDto::HideUpgradePanel,
            Notification::LoadoutChanged(view) => NoticeDto::LoadoutChanged(view.into()),
            Notification::BoundsWarning {
                visible,
                seconds_left,
            } => NoticeDto::BoundsWarning {
                visible,
                seconds_left,
            },
            Notification::GameOver { final_score } => NoticeDto::GameOver { final_score },
        }
    }
}
