// Gameplay tuning for participants and their actors.
// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct PlayerTuning {
    /// Lives each participant starts a session with.
    pub max_lives: u32,

    /// Base movement speed in world units per second, before upgrades.
    pub move_speed: f32,

    /// How long a participant may stay outside the play area.
    pub out_of_bounds_timeout: Duration,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            max_lives: 3,
            move_speed: 5.0,
            out_of_bounds_timeout: Duration::from_secs(5),
        }
    }
}

/// Lobby sizing and the pre-match countdown.
#[derive(Debug, Clone, Copy)]
pub struct LobbyTuning {
    /// Number of player slots (each slot owns a lives counter).
    pub max_players: usize,

    /// Ready players required before the countdown starts.
    pub min_players: usize,

    /// Countdown length in whole seconds.
    pub countdown_seconds: u32,

    /// Score awarded per confirmed kill.
    pub score_per_kill: u32,
}

impl Default for LobbyTuning {
    fn default() -> Self {
        Self {
            max_players: 2,
            min_players: 2,
            countdown_seconds: 3,
            score_per_kill: 15,
        }
    }
}
