// Gameplay tuning values, validated once at startup.

pub mod player;
pub mod waves;

pub use player::{LobbyTuning, PlayerTuning};
pub use waves::{SpawnTuning, UpgradeTuning, WaveTuning};

use std::fmt;

#[derive(Debug, Clone, Copy, Default)]
pub struct GameTuning {
    pub player: PlayerTuning,
    pub lobby: LobbyTuning,
    pub waves: WaveTuning,
    pub spawn: SpawnTuning,
    pub upgrades: UpgradeTuning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TuningError {
    Invalid(&'static str),
}

impl fmt::Display for TuningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TuningError::Invalid(what) => write!(f, "invalid tuning: {what}"),
        }
    }
}

impl std::error::Error for TuningError {}

impl GameTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        let check = |ok: bool, what: &'static str| {
            if ok { Ok(()) } else { Err(TuningError::Invalid(what)) }
        };

        check(self.player.max_lives > 0, "max_lives must be positive")?;
        check(
            self.player.move_speed.is_finite() && self.player.move_speed > 0.0,
            "move_speed must be positive",
        )?;
        check(self.lobby.max_players > 0, "max_players must be positive")?;
        check(
            (1..=self.lobby.max_players).contains(&self.lobby.min_players),
            "min_players must be within 1..=max_players",
        )?;
        check(self.waves.base_enemies > 0, "base_enemies must be positive")?;
        check(
            self.spawn.min_distance.is_finite()
                && self.spawn.max_distance.is_finite()
                && self.spawn.min_distance >= 0.0
                && self.spawn.min_distance <= self.spawn.max_distance,
            "spawn distances must satisfy 0 <= min <= max",
        )?;
        check(self.upgrades.every_waves > 0, "every_waves must be positive")?;
        check(
            self.upgrades.options_per_round > 0,
            "options_per_round must be positive",
        )?;
        check(
            self.upgrades.max_required_choices > 0,
            "max_required_choices must be positive",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_defaults_are_used_then_tuning_is_valid() {
        assert_eq!(GameTuning::default().validate(), Ok(()));
    }

    #[test]
    fn when_wave_index_grows_then_total_grows_by_increment() {
        let waves = WaveTuning::default();

        assert_eq!(waves.total_for_wave(1), 10);
        assert_eq!(waves.total_for_wave(2), 15);
        assert_eq!(waves.total_for_wave(3), 20);
    }

    #[test]
    fn when_min_players_exceeds_slots_then_validation_fails() {
        let mut tuning = GameTuning::default();
        tuning.lobby.min_players = 3;

        assert!(matches!(tuning.validate(), Err(TuningError::Invalid(_))));
    }

    #[test]
    fn when_spawn_ring_is_inverted_then_validation_fails() {
        let mut tuning = GameTuning::default();
        tuning.spawn.min_distance = 20.0;

        assert!(tuning.validate().is_err());
    }
}
