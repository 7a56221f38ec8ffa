//! Dogpark Game Server - Authoritative multiplayer game server
//!
//! This is the main entry point for the game server. It handles:
//! - HTTP endpoints for joining, moving and reading world state
//! - The server-side tick loop (or manual ticking for tests)
//! - Durable state snapshots across restarts
//! - The retired-player leaderboard in Postgres

mod app;
mod config;
mod game;
mod http;
mod store;
mod util;

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{ticker, AppState, World};
use crate::config::{Args, Config};
use crate::game::snapshot;
use crate::http::build_router;
use crate::store::RecordStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_args_and_env(args)?;

    init_tracing(&config.log_level);

    info!("Starting Dogpark Game Server");
    info!("Server address: {}", config.server_addr);

    // Load the map set and restore any saved world state.
    let mut game = config::loader::load_game(&config.config_file)?;
    if let Some(state_file) = &config.state_file {
        if let Some(state) = snapshot::load_from_path(state_file) {
            snapshot::restore(&mut game, &state);
            info!(path = %state_file.display(), "Restored game state");
        }
    }

    // Record store must be reachable at startup.
    let records = RecordStore::connect(&config.db_url).await?;

    // Retirement records flow out of the simulation through a queue and are
    // written off the strand.
    let (retired_tx, mut retired_rx) = mpsc::unbounded_channel();
    game.set_retired_sink(retired_tx);
    let record_writer = {
        let records = records.clone();
        tokio::spawn(async move {
            while let Some(record) = retired_rx.recv().await {
                if let Err(err) = records.add_record(&record).await {
                    error!(%err, name = %record.name, "Failed to save retirement record");
                }
            }
        })
    };

    let state = AppState::new(config.clone(), World::new(game, &config), records);

    // One loop, one serialization point: the driver posts its updates onto
    // the same strand the API handlers use.
    let tick_driver = if config.tick_period > 0 {
        let driver_state = state.clone();
        let period = Duration::from_millis(config.tick_period);
        Some(tokio::spawn(async move {
            ticker::run(driver_state, period).await;
        }))
    } else {
        info!("Manual ticking enabled via POST /api/v1/game/tick");
        None
    };

    let router = build_router(state.clone());

    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain: stop ticking, then write the final snapshot.
    if let Some(driver) = tick_driver {
        driver.abort();
        let _ = driver.await;
    }

    {
        let world = state.world.lock().await;
        if let Some(final_snapshot) = world.render_snapshot() {
            match final_snapshot.write() {
                Ok(()) => info!(path = %final_snapshot.path().display(), "Final game state saved"),
                Err(err) => warn!(%err, "Failed to write final game state"),
            }
        }
    }

    // Closing the world drops the retirement sender; the writer drains the
    // queue and exits.
    drop(state);
    let _ = record_writer.await;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
