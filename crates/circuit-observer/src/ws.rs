//! WebSocket endpoint that runs one simulation per connection.
//!
//! Clients connect to `GET /simulations/live` and receive a JSON-encoded
//! [`TickSnapshot`](circuit_types::TickSnapshot) every tick interval. The
//! connection task owns its simulation: it ticks it on a timer, executes
//! control commands routed to it through the registry, and deregisters it
//! when the client goes away. Query parameters override the configured
//! defaults for this connection only.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use circuit_core::{Simulation, SimulationConfig};
use circuit_types::SimulationId;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::ObserverError;
use crate::session::Session;
use crate::state::AppState;

/// Largest initial fleet a client may request.
pub const MAX_INITIAL_AIRCRAFT: u32 = 50;

/// Per-connection overrides of the simulation configuration.
#[derive(Debug, Default, serde::Deserialize)]
pub struct LiveQuery {
    /// Initial number of aircraft.
    pub aircraft: Option<u32>,
    /// RNG seed for a reproducible run.
    pub seed: Option<u64>,
    /// Enable or disable chaos injection.
    pub chaos: Option<bool>,
    /// Start the brain in automatic mode.
    pub auto: Option<bool>,
}

impl LiveQuery {
    /// Apply the overrides to `base`.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::BadRequest`] if more than
    /// [`MAX_INITIAL_AIRCRAFT`] aircraft are requested.
    pub fn apply(&self, mut base: SimulationConfig) -> Result<SimulationConfig, ObserverError> {
        if let Some(n) = self.aircraft {
            if n > MAX_INITIAL_AIRCRAFT {
                return Err(ObserverError::BadRequest(format!(
                    "aircraft must be at most {MAX_INITIAL_AIRCRAFT}, got {n}"
                )));
            }
            base.initial_aircraft = n;
        }
        if self.seed.is_some() {
            base.seed = self.seed;
        }
        if let Some(chaos) = self.chaos {
            base.chaos.enabled = chaos;
        }
        if let Some(auto) = self.auto {
            base.brain.auto_mode = auto;
        }
        Ok(base)
    }
}

/// Create a simulation and upgrade the connection to stream it.
///
/// The simulation is built before the upgrade so a bad configuration is
/// answered with a 400 instead of an immediately closed socket.
///
/// # Route
///
/// `GET /simulations/live`
pub async fn live(
    ws: WebSocketUpgrade,
    Query(query): Query<LiveQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ObserverError> {
    let config = query.apply(state.config.simulation.clone())?;
    let sim = Simulation::new(config).map_err(|e| ObserverError::BadRequest(e.to_string()))?;
    Ok(ws.on_upgrade(move |socket| run(socket, sim, state)))
}

/// Drive one simulation for the lifetime of the socket.
async fn run(socket: WebSocket, sim: Simulation, state: Arc<AppState>) {
    let (session, handle) = Session::new(sim);
    let id = session.id();
    state.registry.insert(id, handle).await;
    info!(sim_id = %id, "simulation connected");

    let interval = Duration::from_millis(state.config.server.tick_interval_ms.max(1));
    stream(socket, session, interval).await;

    state.registry.remove(id).await;
    info!(sim_id = %id, "simulation disconnected");
}

/// The per-connection select loop: tick, command, or client frame.
async fn stream(mut socket: WebSocket, mut session: Session, interval: Duration) {
    let id: SimulationId = session.id();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = match session.tick() {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(sim_id = %id, error = %e, "simulation cannot advance");
                        let _ = socket.send(Message::Close(None)).await;
                        return;
                    }
                };
                let json = match serde_json::to_string(&snapshot) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!(sim_id = %id, error = %e, "failed to serialize tick snapshot");
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    debug!(sim_id = %id, "client disconnected (send failed)");
                    return;
                }
            }
            command = session.next_command() => {
                // The registry holds a handle for as long as this loop runs.
                if let Some(command) = command {
                    session.handle(command);
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(sim_id = %id, "client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(sim_id = %id, "client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(sim_id = %id, error = %e, "WebSocket error");
                        return;
                    }
                    _ => {
                        // Client text and binary frames carry no meaning.
                    }
                }
            }
        }
    }
}
