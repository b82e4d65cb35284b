//! Server binary for the Circuit traffic-pattern simulation.
//!
//! Loads configuration, initializes logging, and serves the observer API
//! until `Ctrl-C`. Simulations are created per WebSocket connection, so
//! nothing is simulated until a client connects.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `circuit-config.yaml` (or the path in
//!    `CIRCUIT_CONFIG`), falling back to defaults when the file is absent
//! 2. Initialize structured logging (tracing)
//! 3. Serve HTTP + WebSocket until shutdown

use std::path::Path;
use std::sync::Arc;

use circuit_core::CircuitConfig;
use circuit_core::config::LoggingConfig;
use circuit_observer::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "circuit-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the server cannot
/// bind its address.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let path = std::env::var("CIRCUIT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    let (config, from_file) = load_config(Path::new(&path))?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    if from_file {
        info!(path = %path, "configuration loaded");
    } else {
        warn!(path = %path, "configuration file not found, using defaults");
    }
    info!(
        host = %config.server.host,
        port = config.server.port,
        tick_interval_ms = config.server.tick_interval_ms,
        dt_sec = config.simulation.dt_sec,
        initial_aircraft = config.simulation.initial_aircraft,
        randomness = config.simulation.chaos.randomness,
        "circuit-server starting"
    );

    // 3. Serve until Ctrl-C.
    let server = config.server.clone();
    let state = Arc::new(AppState::new(config));
    circuit_observer::start_server(&server, state, shutdown_signal()).await?;

    info!("circuit-server stopped");
    Ok(())
}

/// Load the configuration file, or defaults plus environment overrides
/// when it does not exist. The flag reports whether the file was read.
fn load_config(path: &Path) -> Result<(CircuitConfig, bool), circuit_core::ConfigError> {
    if path.exists() {
        return CircuitConfig::from_file(path).map(|c| (c, true));
    }
    let mut config = CircuitConfig::default();
    config.apply_env_overrides();
    config.validate()?;
    Ok((config, false))
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
