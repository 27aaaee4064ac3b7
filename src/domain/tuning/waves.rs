// Gameplay tuning for wave pacing, spawning and upgrade rounds.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct WaveTuning {
    /// Enemies in the first wave.
    pub base_enemies: u32,

    /// Additional enemies per later wave.
    pub enemies_per_wave: u32,

    /// Throttle between consecutive spawns of one wave.
    pub spawn_interval: Duration,

    /// Pause between a cleared wave and the next one.
    pub intermission: Duration,
}

impl WaveTuning {
    /// Enemy count for a 1-based wave index.
    pub fn total_for_wave(&self, wave: u32) -> u32 {
        let extra = wave.saturating_sub(1).saturating_mul(self.enemies_per_wave);
        self.base_enemies.saturating_add(extra)
    }
}

impl Default for WaveTuning {
    fn default() -> Self {
        Self {
            base_enemies: 10,
            enemies_per_wave: 5,
            spawn_interval: Duration::from_millis(500),
            intermission: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpawnTuning {
    /// Closest spawn distance from the anchor player.
    pub min_distance: f32,

    /// Farthest spawn distance from the anchor player.
    pub max_distance: f32,
}

impl Default for SpawnTuning {
    fn default() -> Self {
        Self {
            min_distance: 8.0,
            max_distance: 12.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UpgradeTuning {
    /// A round starts after every wave divisible by this.
    pub every_waves: u32,

    /// Options offered per round.
    pub options_per_round: usize,

    /// Upper bound on selections needed to close a round.
    pub max_required_choices: usize,
}

impl Default for UpgradeTuning {
    fn default() -> Self {
        Self {
            every_waves: 2,
            options_per_round: 3,
            max_required_choices: 2,
        }
    }
}
