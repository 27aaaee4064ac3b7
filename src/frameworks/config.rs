use std::{env, path::PathBuf, time::Duration};

// Runtime/server constants (not gameplay tuning).

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

pub fn http_port() -> u16 {
    parsed("GAME_SERVER_PORT").unwrap_or(3001)
}

/// Optional JSON catalog overriding the bundled enemies and upgrades.
pub fn catalog_path() -> Option<PathBuf> {
    env::var("CATALOG_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// Fixed seed for reproducible sessions; unset seeds from the OS.
pub fn rng_seed() -> Option<u64> {
    parsed("RNG_SEED")
}

pub fn min_players() -> Option<usize> {
    parsed("MIN_PLAYERS")
}

pub fn upgrade_every_waves() -> Option<u32> {
    parsed("UPGRADE_EVERY_WAVES")
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const NOTIFY_BROADCAST_CAPACITY: usize = 256;
pub const STATE_BROADCAST_CAPACITY: usize = 256;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);

pub const DEFAULT_LOBBY_ID: &str = "test";
