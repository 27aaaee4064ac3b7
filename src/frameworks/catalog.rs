// JSON catalog loading: file DTOs converted into validated domain catalogs.

use crate::domain::{
    CatalogError, Catalogs, EnemyKind, MovementKind, Rarity, ShootPattern, UpgradeDef,
    UpgradeEffect, WeaponConfig,
};
use serde::Deserialize;
use std::{fmt, fs, io, path::Path};

const BUILTIN_CATALOG: &str = include_str!("../../config/catalog.json");

#[derive(Debug)]
pub enum CatalogLoadError {
    Io(io::Error),
    Parse(serde_json::Error),
    Invalid(CatalogError),
}

impl fmt::Display for CatalogLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogLoadError::Io(e) => write!(f, "failed to read catalog: {e}"),
            CatalogLoadError::Parse(e) => write!(f, "failed to parse catalog: {e}"),
            CatalogLoadError::Invalid(e) => write!(f, "catalog rejected: {e}"),
        }
    }
}

impl std::error::Error for CatalogLoadError {}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    starting_weapon: WeaponDto,
    enemies: Vec<EnemyDto>,
    upgrades: Vec<UpgradeDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RarityDto {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum MovementDto {
    Stationary,
    Chase,
}

#[derive(Debug, Deserialize)]
struct EnemyDto {
    name: String,
    rarity: RarityDto,
    movement: MovementDto,
    #[serde(default)]
    move_speed: f32,
    #[serde(default)]
    chase_range: f32,
    max_health: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PatternDto {
    Single,
    Burst { count: u32 },
    Spread { count: u32, angle_deg: u32 },
    RapidFire,
}

#[derive(Debug, Deserialize)]
struct WeaponDto {
    name: String,
    pattern: PatternDto,
    fire_interval: f32,
    damage: u32,
    bullet_speed: f32,
    bullet_lifetime: f32,
    #[serde(default)]
    piercing: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EffectDto {
    MoveSpeed { multiplier: f32 },
    FireRate { multiplier: f32 },
    Damage { multiplier: u32 },
    WeaponChange { weapon: WeaponDto },
}

#[derive(Debug, Deserialize)]
struct UpgradeDto {
    name: String,
    #[serde(default)]
    description: String,
    effect: EffectDto,
}

impl From<RarityDto> for Rarity {
    fn from(dto: RarityDto) -> Self {
        match dto {
            RarityDto::Common => Rarity::Common,
            RarityDto::Uncommon => Rarity::Uncommon,
            RarityDto::Rare => Rarity::Rare,
            RarityDto::Epic => Rarity::Epic,
            RarityDto::Legendary => Rarity::Legendary,
        }
    }
}

impl From<EnemyDto> for EnemyKind {
    fn from(dto: EnemyDto) -> Self {
        Self {
            name: dto.name,
            rarity: dto.rarity.into(),
            movement: match dto.movement {
                MovementDto::Stationary => MovementKind::Stationary,
                MovementDto::Chase => MovementKind::Chase,
            },
            move_speed: dto.move_speed,
            chase_range: dto.chase_range,
            max_health: dto.max_health,
        }
    }
}

impl From<WeaponDto> for WeaponConfig {
    fn from(dto: WeaponDto) -> Self {
        Self {
            name: dto.name,
            pattern: match dto.pattern {
                PatternDto::Single => ShootPattern::Single,
                PatternDto::Burst { count } => ShootPattern::Burst { count },
                PatternDto::Spread { count, angle_deg } => {
                    ShootPattern::Spread { count, angle_deg }
                }
                PatternDto::RapidFire => ShootPattern::RapidFire,
            },
            fire_interval: dto.fire_interval,
            damage: dto.damage,
            bullet_speed: dto.bullet_speed,
            bullet_lifetime: dto.bullet_lifetime,
            piercing: dto.piercing,
        }
    }
}

impl From<UpgradeDto> for UpgradeDef {
    fn from(dto: UpgradeDto) -> Self {
        Self {
            name: dto.name,
            description: dto.description,
            effect: match dto.effect {
                EffectDto::MoveSpeed { multiplier } => UpgradeEffect::MoveSpeed { multiplier },
                EffectDto::FireRate { multiplier } => UpgradeEffect::FireRate { multiplier },
                EffectDto::Damage { multiplier } => UpgradeEffect::Damage { multiplier },
                EffectDto::WeaponChange { weapon } => UpgradeEffect::WeaponChange {
                    weapon: weapon.into(),
                },
            },
        }
    }
}

/// Parses and validates catalog JSON.
pub fn parse_catalogs(json: &str) -> Result<Catalogs, CatalogLoadError> {
    let file: CatalogFile = serde_json::from_str(json).map_err(CatalogLoadError::Parse)?;
    Catalogs::new(
        file.enemies.into_iter().map(EnemyKind::from).collect(),
        file.upgrades.into_iter().map(UpgradeDef::from).collect(),
        file.starting_weapon.into(),
    )
    .map_err(CatalogLoadError::Invalid)
}

/// Loads catalogs from `path`, or the bundled defaults when no path is set.
pub fn load_catalogs(path: Option<&Path>) -> Result<Catalogs, CatalogLoadError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path).map_err(CatalogLoadError::Io)?;
            parse_catalogs(&json)
        }
        None => parse_catalogs(BUILTIN_CATALOG),
    }
}
