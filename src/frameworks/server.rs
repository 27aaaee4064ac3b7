// Framework bootstrap for the session server runtime.

use crate::domain::tuning::GameTuning;
use crate::frameworks::{catalog, config};
use crate::interface_adapters::net::{create_lobby_handler, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{LobbyRegistry, LobbySettings};

use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    // build state
    let state = build_state().await?;
    // Start the Web Server
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/lobbies", post(create_lobby_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn tuning_from_env() -> GameTuning {
    let mut tuning = GameTuning::default();
    if let Some(min_players) = config::min_players() {
        tuning.lobby.min_players = min_players;
    }
    if let Some(every_waves) = config::upgrade_every_waves() {
        tuning.upgrades.every_waves = every_waves;
    }
    tuning
}

async fn build_state() -> Result<Arc<AppState>> {
    // Missing or broken content is fatal before any lobby exists.
    let tuning = tuning_from_env();
    tuning
        .validate()
        .map_err(|e| std::io::Error::other(e.to_string()))
        .inspect_err(|e| tracing::error!(error = %e, "invalid tuning"))?;

    let catalog_path = config::catalog_path();
    let catalogs = catalog::load_catalogs(catalog_path.as_deref())
        .map_err(|e| std::io::Error::other(e.to_string()))
        .inspect_err(|e| tracing::error!(error = %e, "failed to load catalogs"))?;
    tracing::debug!(
        catalog_path = ?catalog_path,
        enemies = catalogs.enemies().len(),
        upgrades = catalogs.upgrades().len(),
        min_players = tuning.lobby.min_players,
        upgrade_every_waves = tuning.upgrades.every_waves,
        "content configured"
    );

    // Setup Lobby Registry
    // This owns the set of active lobby session tasks.
    let lobby_registry = Arc::new(LobbyRegistry::new(LobbySettings {
        input_channel_capacity: config::INPUT_CHANNEL_CAPACITY,
        notify_broadcast_capacity: config::NOTIFY_BROADCAST_CAPACITY,
        state_broadcast_capacity: config::STATE_BROADCAST_CAPACITY,
        tick_interval: config::TICK_INTERVAL,
        tuning,
        catalogs,
        rng_seed: config::rng_seed(),
    }));

    // Keep the default lobby pinned so it never gets deleted.
    lobby_registry
        .create_lobby(config::DEFAULT_LOBBY_ID.to_string(), true)
        .await
        .map_err(|e| std::io::Error::other(format!("default lobby: {e:?}")))?;

    Ok(Arc::new(AppState {
        lobby_registry,
        default_lobby_id: Arc::from(config::DEFAULT_LOBBY_ID),
    }))
}
