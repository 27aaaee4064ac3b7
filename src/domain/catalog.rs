// Immutable enemy/upgrade/weapon records consumed by the session.

use std::fmt;
use std::sync::Arc;

/// Enemy rarity tiers, ordered from most to least frequent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
    ];

    /// Relative probability mass of the tier.
    pub const fn weight(self) -> f32 {
        match self {
            Rarity::Common => 60.0,
            Rarity::Uncommon => 25.0,
            Rarity::Rare => 10.0,
            Rarity::Epic => 4.0,
            Rarity::Legendary => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementKind {
    Stationary,
    Chase,
}

/// Spawn configuration for one enemy type. Opaque to the core apart from
/// `name` and `rarity`; movement and health are forwarded to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct EnemyKind {
    pub name: String,
    pub rarity: Rarity,
    pub movement: MovementKind,
    pub move_speed: f32,
    pub chase_range: f32,
    pub max_health: u32,
}

impl EnemyKind {
    /// Entries failing this check are skipped by weighted selection.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
            && self.max_health > 0
            && self.move_speed.is_finite()
            && self.move_speed >= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShootPattern {
    Single,
    Burst { count: u32 },
    Spread { count: u32, angle_deg: u32 },
    RapidFire,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeaponConfig {
    pub name: String,
    pub pattern: ShootPattern,
    /// Seconds between shots (lower is faster).
    pub fire_interval: f32,
    pub damage: u32,
    pub bullet_speed: f32,
    pub bullet_lifetime: f32,
    pub piercing: bool,
}

impl WeaponConfig {
    fn validate(&self) -> Result<(), CatalogError> {
        let finite_positive = |v: f32| v.is_finite() && v > 0.0;
        if self.name.trim().is_empty()
            || !finite_positive(self.fire_interval)
            || !finite_positive(self.bullet_speed)
            || !finite_positive(self.bullet_lifetime)
            || self.damage == 0
        {
            return Err(CatalogError::InvalidWeapon {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpgradeEffect {
    MoveSpeed { multiplier: f32 },
    FireRate { multiplier: f32 },
    WeaponChange { weapon: WeaponConfig },
    Damage { multiplier: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeDef {
    pub name: String,
    pub description: String,
    pub effect: UpgradeEffect,
}

impl UpgradeDef {
    fn validate(&self) -> Result<(), CatalogError> {
        let invalid = || CatalogError::InvalidUpgrade {
            name: self.name.clone(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid());
        }
        match &self.effect {
            UpgradeEffect::MoveSpeed { multiplier } | UpgradeEffect::FireRate { multiplier } => {
                if !multiplier.is_finite() || *multiplier <= 0.0 {
                    return Err(invalid());
                }
            }
            UpgradeEffect::Damage { multiplier } => {
                if *multiplier == 0 {
                    return Err(invalid());
                }
            }
            UpgradeEffect::WeaponChange { weapon } => weapon.validate()?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    NoValidEnemies,
    EmptyUpgradeCatalog,
    DuplicateUpgrade { name: String },
    InvalidUpgrade { name: String },
    InvalidWeapon { name: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::NoValidEnemies => write!(f, "enemy catalog has no valid entries"),
            CatalogError::EmptyUpgradeCatalog => write!(f, "upgrade catalog is empty"),
            CatalogError::DuplicateUpgrade { name } => write!(f, "duplicate upgrade '{name}'"),
            CatalogError::InvalidUpgrade { name } => write!(f, "invalid upgrade '{name}'"),
            CatalogError::InvalidWeapon { name } => write!(f, "invalid weapon '{name}'"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Validated, shared, read-only game content.
#[derive(Debug, Clone)]
pub struct Catalogs {
    enemies: Arc<[EnemyKind]>,
    upgrades: Arc<[UpgradeDef]>,
    starting_weapon: WeaponConfig,
}

impl Catalogs {
    /// Validates content up front so the running session never meets an empty
    /// spawn table or an upgrade round with nothing to offer.
    pub fn new(
        enemies: Vec<EnemyKind>,
        upgrades: Vec<UpgradeDef>,
        starting_weapon: WeaponConfig,
    ) -> Result<Self, CatalogError> {
        if !enemies.iter().any(EnemyKind::is_valid) {
            return Err(CatalogError::NoValidEnemies);
        }
        if upgrades.is_empty() {
            return Err(CatalogError::EmptyUpgradeCatalog);
        }
        for (i, upgrade) in upgrades.iter().enumerate() {
            upgrade.validate()?;
            if upgrades[..i].iter().any(|u| u.name == upgrade.name) {
                return Err(CatalogError::DuplicateUpgrade {
                    name: upgrade.name.clone(),
                });
            }
        }
        starting_weapon.validate()?;

        Ok(Self {
            enemies: enemies.into(),
            upgrades: upgrades.into(),
            starting_weapon,
        })
    }

    pub fn enemies(&self) -> Arc<[EnemyKind]> {
        self.enemies.clone()
    }

    pub fn upgrades(&self) -> Arc<[UpgradeDef]> {
        self.upgrades.clone()
    }

    pub fn starting_weapon(&self) -> &WeaponConfig {
        &self.starting_weapon
    }
}
