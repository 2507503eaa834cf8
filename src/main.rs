//! ==============================================================================
//! main.rs - climate dashboard entry point
//! ==============================================================================
//!
//! purpose:
//!     polls a temperature/humidity sensor on a serial port (or simulates one),
//!     appends every reading to a csv log and serves a dashboard that shows a
//!     chart, summary statistics and a warning line.
//!
//! responsibilities:
//!     - load configuration and set up logging
//!     - pick the reading source once (serial device or simulator)
//!     - drive the refresh orchestrator from a fixed-period timer
//!     - publish each payload to the web shell
//!
//! relationships:
//!     - uses: config.rs, source.rs, store.rs, orchestrator.rs, server.rs
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                      host (this file)                        │
//!     │  ┌──────────────────┐              ┌──────────────────────┐  │
//!     │  │ timer loop       │   payload    │ web server           │  │
//!     │  │ (2s cycle)       │ ───────────> │ (port 8050)          │  │
//!     │  │                  │ <─────────── │                      │  │
//!     │  └────────┬─────────┘    filter    └──────────────────────┘  │
//!     │           │                                                  │
//!     │     ┌─────┴────────┐                                         │
//!     │     │ orchestrator │ <- orchestrator.rs                      │
//!     │     └─────┬────────┘                                         │
//!     └───────────┼──────────────────────────────────────────────────┘
//!                 │
//!        ┌────────┴────────┐        ┌───────────────────┐
//!        │ serial / sim    │ ─────> │ sensor_data.csv   │
//!        └─────────────────┘        └───────────────────┘
//!
//! ==============================================================================

mod config;
mod domain;
mod orchestrator;
mod server;
mod source;
mod stats;
mod store;
mod window;

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use orchestrator::{Orchestrator, TickOutcome};
use server::ShellState;

#[tokio::main]
async fn main() -> Result<()> {
    println!("===========================================================");
    println!("  Climate Dashboard");
    println!("  serial sensor -> csv log -> live chart");
    println!("===========================================================");

    // step 1: configuration, then logging at the configured level
    let (config, config_note) = config::DashboardConfig::load_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();
    tracing::info!("[CONFIG] {}", config_note);
    tracing::info!("[CONFIG] {}", config.summary());

    // step 2: the log. an unwritable location is the one fatal startup error
    let log = store::DurableLog::open(&config.storage.path)?;
    tracing::info!("[STARTUP] Logging readings to {}", log.path().display());

    // step 3: reading source. opening the port may sleep while the board resets
    let device = config.device.clone();
    let simulation = config.simulation.clone();
    let source = tokio::task::spawn_blocking(move || source::ReadingSource::connect(&device, &simulation))
        .await
        .context("source startup task failed")?;
    let mut orchestrator = Orchestrator::new(source, log.clone(), config.alerts)
        .with_sensor_output(config.logging.show_sensor_data);
    tracing::info!("[STARTUP] Reading source: {}", orchestrator.mode());

    // step 4: web shell in the background
    let shell = ShellState::new(log);
    let web_shell = shell.clone();
    let bind = config.server.bind.clone();
    tokio::spawn(async move {
        if let Err(e) = server::run_server(&bind, web_shell).await {
            tracing::error!("Web server error: {:#}", e);
        }
    });

    // step 5: refresh loop. one tick at a time, missed ticks are not replayed
    let mut interval = tokio::time::interval(Duration::from_millis(config.polling.interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!("[RUNTIME] Refreshing every {}ms", config.polling.interval_ms);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shell.filter_changed.notified() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("[RUNTIME] Shutting down");
                break;
            }
        }

        let filter = *shell.filter.read().await;

        // serial and file io block, so the orchestrator travels to the blocking pool and back
        let (returned, result) = tokio::task::spawn_blocking(move || {
            let result = orchestrator.tick(&filter);
            (orchestrator, result)
        })
        .await
        .context("refresh task panicked")?;
        orchestrator = returned;

        match result {
            Ok(TickOutcome::Refreshed) => {
                *shell.payload.write().await = orchestrator.payload().cloned();
            }
            Ok(TickOutcome::Unchanged) => {}
            Err(e) => tracing::error!("Refresh failed, keeping previous payload: {:#}", e),
        }
    }

    Ok(())
}
