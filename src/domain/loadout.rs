// Per-participant actor parameters that upgrades mutate.

use crate::domain::catalog::{UpgradeEffect, WeaponConfig};

/// Private runtime copy of a participant's movement and weapon parameters.
///
/// Catalog entries are shared and never touched; every upgrade mutates this copy,
/// so multipliers compound per participant and never leak into other sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct Loadout {
    base_move_speed: f32,
    move_speed_multiplier: f32,
    fire_rate_multiplier: f32,
    damage_multiplier: u32,
    weapon: WeaponConfig,
}

impl Loadout {
    pub fn new(base_move_speed: f32, weapon: WeaponConfig) -> Self {
        Self {
            base_move_speed,
            move_speed_multiplier: 1.0,
            fire_rate_multiplier: 1.0,
            damage_multiplier: 1,
            weapon,
        }
    }

    pub fn apply_move_speed_multiplier(&mut self, multiplier: f32) {
        self.move_speed_multiplier *= multiplier;
    }

    pub fn apply_fire_rate_multiplier(&mut self, multiplier: f32) {
        self.fire_rate_multiplier *= multiplier;
    }

    pub fn apply_damage_multiplier(&mut self, multiplier: u32) {
        self.damage_multiplier = self.damage_multiplier.saturating_mul(multiplier);
    }

    /// Swaps the weapon; accumulated multipliers carry over to the new one.
    pub fn change_weapon_config(&mut self, weapon: WeaponConfig) {
        self.weapon = weapon;
    }

    pub fn apply(&mut self, effect: &UpgradeEffect) {
        match effect {
            UpgradeEffect::MoveSpeed { multiplier } => {
                self.apply_move_speed_multiplier(*multiplier)
            }
            UpgradeEffect::FireRate { multiplier } => self.apply_fire_rate_multiplier(*multiplier),
            UpgradeEffect::WeaponChange { weapon } => self.change_weapon_config(weapon.clone()),
            UpgradeEffect::Damage { multiplier } => self.apply_damage_multiplier(*multiplier),
        }
    }

    pub fn move_speed(&self) -> f32 {
        self.base_move_speed * self.move_speed_multiplier
    }

    /// Seconds between shots; a higher fire-rate multiplier shortens it.
    pub fn fire_interval(&self) -> f32 {
        self.weapon.fire_interval / self.fire_rate_multiplier
    }

    pub fn damage(&self) -> u32 {
        self.weapon.damage.saturating_mul(self.damage_multiplier)
    }

    pub fn move_speed_multiplier(&self) -> f32 {
        self.move_speed_multiplier
    }

    pub fn fire_rate_multiplier(&self) -> f32 {
        self.fire_rate_multiplier
    }

    pub fn damage_multiplier(&self) -> u32 {
        self.damage_multiplier
    }

    pub fn weapon(&self) -> &WeaponConfig {
        &self.weapon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::ShootPattern;
    use crate::domain::catalog::fixtures::blaster;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn when_fire_rate_upgrade_is_taken_twice_then_multipliers_compound() {
        let mut loadout = Loadout::new(5.0, blaster());

        loadout.apply(&UpgradeEffect::FireRate { multiplier: 1.5 });
        loadout.apply(&UpgradeEffect::FireRate { multiplier: 1.5 });

        assert!(approx(loadout.fire_rate_multiplier(), 2.25));
        assert!(approx(loadout.fire_interval(), 0.5 / 2.25));
    }

    #[test]
    fn when_weapon_changes_then_damage_multiplier_carries_over() {
        let mut loadout = Loadout::new(5.0, blaster());
        loadout.apply(&UpgradeEffect::Damage { multiplier: 2 });

        let mut spread = blaster();
        spread.name = "Spreadshot".to_string();
        spread.pattern = ShootPattern::Spread {
            count: 3,
            angle_deg: 15,
        };
        spread.damage = 3;
        loadout.apply(&UpgradeEffect::WeaponChange { weapon: spread });

        assert_eq!(loadout.weapon().name, "Spreadshot");
        assert_eq!(loadout.damage(), 6);
    }

    #[test]
    fn when_one_loadout_is_upgraded_then_a_clone_of_the_source_is_untouched() {
        let weapon = blaster();
        let mut first = Loadout::new(5.0, weapon.clone());
        let second = Loadout::new(5.0, weapon.clone());

        first.apply(&UpgradeEffect::MoveSpeed { multiplier: 1.5 });

        assert!(approx(first.move_speed(), 7.5));
        assert!(approx(second.move_speed(), 5.0));
        assert_eq!(second.weapon(), &weapon);
    }
}
