//! Shared application state for the observer server.
//!
//! [`AppState`] holds the loaded configuration and the
//! [`SimulationRegistry`], the map from simulation id to the handle of the
//! task that owns that simulation. Each WebSocket connection registers its
//! simulation when it starts and deregisters it when the connection ends,
//! so the registry only ever lists live instances.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use circuit_core::CircuitConfig;
use circuit_types::SimulationId;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::session::SessionHandle;

/// Listing entry for one live simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    /// Instance id.
    pub id: SimulationId,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
    /// Ticks completed.
    pub tick: u64,
    /// Simulated seconds elapsed.
    pub sim_time_sec: f64,
    /// Aircraft currently simulated.
    pub aircraft: usize,
}

/// Live simulations keyed by id.
#[derive(Debug, Default)]
pub struct SimulationRegistry {
    sessions: RwLock<BTreeMap<SimulationId, SessionHandle>>,
}

impl SimulationRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live simulation.
    pub async fn insert(&self, id: SimulationId, handle: SessionHandle) {
        self.sessions.write().await.insert(id, handle);
    }

    /// Deregister a simulation. Returns whether it was registered.
    pub async fn remove(&self, id: SimulationId) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// The handle of a live simulation.
    pub async fn get(&self, id: SimulationId) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Number of live simulations.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no simulation is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Summaries of every live simulation, ordered by id.
    pub async fn list(&self) -> Vec<SimulationSummary> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, handle)| {
                let status = *handle.status.borrow();
                SimulationSummary {
                    id: *id,
                    created_at: handle.created_at,
                    tick: status.tick,
                    sim_time_sec: status.sim_time_sec,
                    aircraft: status.aircraft,
                }
            })
            .collect()
    }
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Debug, Default)]
pub struct AppState {
    /// Configuration new simulations are created from.
    pub config: CircuitConfig,
    /// Live simulations.
    pub registry: SimulationRegistry,
}

impl AppState {
    /// Application state with an empty registry.
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            registry: SimulationRegistry::new(),
        }
    }
}
