// Frameworks layer: runtime bootstrap, environment config and content loading.

pub mod catalog;
pub mod config;
pub mod server;
