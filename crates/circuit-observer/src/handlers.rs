//! REST endpoint handlers for the observer server.
//!
//! Every per-simulation handler resolves the id through the registry and
//! forwards a [`ControlCommand`] to the task that owns the simulation.
//! Unknown ids, malformed ids, and simulations whose connection has just
//! closed all answer 404 without side effects.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness check |
//! | `GET` | `/simulations` | Live simulations |
//! | `GET` | `/simulations/{id}/export` | History as CSV |
//! | `POST` | `/simulations/{id}/brain-mode` | Switch manual/automatic |
//! | `POST` | `/simulations/{id}/broadcast` | Broadcast pending instruction |
//! | `POST` | `/simulations/{id}/reject` | Reject pending instruction |
//! | `GET` | `/simulations/{id}/conflicts` | Conflicts of the last tick |
//! | `GET` | `/simulations/{id}/instructions` | Instruction history |
//! | `POST` | `/simulations/{id}/anomalies` | Inject an external anomaly |
//! | `POST` | `/simulations/{id}/transcript` | Inject a transcript line |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use circuit_types::{ExternalAnomaly, ExternalTranscript, SimulationId};
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::ObserverError;
use crate::session::ControlCommand;
use crate::state::AppState;

/// Instructions returned when no limit is given.
pub const DEFAULT_INSTRUCTION_LIMIT: usize = 50;

/// Upper bound on the instruction limit.
pub const MAX_INSTRUCTION_LIMIT: usize = 500;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /simulations/{id}/brain-mode`.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrainModeRequest {
    /// `true` for automatic mode, `false` for manual.
    pub auto_mode: bool,
}

/// Query parameters for `GET /simulations/{id}/instructions`.
#[derive(Debug, serde::Deserialize)]
pub struct InstructionsQuery {
    /// Maximum number of instructions (default 50, capped at 500).
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Command routing
// ---------------------------------------------------------------------------

fn parse_id(raw: &str) -> Result<SimulationId, ObserverError> {
    raw.parse()
        .ok()
        .ok_or_else(|| ObserverError::NotFound(raw.to_owned()))
}

/// Send a command to the owner of `raw_id` and wait for its reply.
async fn request<T>(
    state: &AppState,
    raw_id: &str,
    build: impl FnOnce(oneshot::Sender<T>) -> ControlCommand,
) -> Result<T, ObserverError> {
    let id = parse_id(raw_id)?;
    let handle = state
        .registry
        .get(id)
        .await
        .ok_or_else(|| ObserverError::NotFound(raw_id.to_owned()))?;
    let (tx, rx) = oneshot::channel();
    if handle.commands.send(build(tx)).await.is_err() {
        return Err(ObserverError::NotFound(raw_id.to_owned()));
    }
    // The owner dropped the reply sender: the connection closed mid-request.
    rx.await
        .ok()
        .ok_or_else(|| ObserverError::NotFound(raw_id.to_owned()))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Liveness check.
#[allow(clippy::unused_async)]
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// List the live simulations.
pub async fn list_simulations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let simulations = state.registry.list().await;
    Json(json!({
        "count": simulations.len(),
        "simulations": simulations,
    }))
}

// ---------------------------------------------------------------------------
// Per-simulation control
// ---------------------------------------------------------------------------

/// Download the history log as CSV.
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let csv = request(&state, &id, |reply| ControlCommand::ExportCsv { reply }).await??;
    let disposition = format!("attachment; filename=\"circuit-{id}.csv\"");
    Ok((
        [
            (header::CONTENT_TYPE, String::from("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

/// Switch the brain between manual and automatic mode.
pub async fn set_brain_mode(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<BrainModeRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let auto_mode = body.auto_mode;
    let mode = request(&state, &id, |reply| ControlCommand::SetBrainMode { auto_mode, reply })
        .await?;
    info!(sim_id = %id, ?mode, "brain mode changed via API");
    Ok(Json(json!({ "success": true, "brainMode": mode })))
}

/// Broadcast the pending instruction.
pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let success = request(&state, &id, |reply| ControlCommand::Broadcast { reply }).await?;
    Ok(Json(json!({ "success": success })))
}

/// Reject the pending instruction.
pub async fn reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let success = request(&state, &id, |reply| ControlCommand::Reject { reply }).await?;
    Ok(Json(json!({ "success": success })))
}

/// Conflicts detected on the last tick.
pub async fn conflicts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let conflicts = request(&state, &id, |reply| ControlCommand::Conflicts { reply }).await?;
    Ok(Json(json!({ "conflicts": conflicts })))
}

/// Instruction history, most recent first.
pub async fn instructions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<InstructionsQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_INSTRUCTION_LIMIT)
        .min(MAX_INSTRUCTION_LIMIT);
    let instructions =
        request(&state, &id, |reply| ControlCommand::Instructions { limit, reply }).await?;
    Ok(Json(json!({
        "count": instructions.len(),
        "instructions": instructions,
    })))
}

/// Merge an anomaly reported by an external checker.
pub async fn inject_anomaly(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(anomaly): Json<ExternalAnomaly>,
) -> Result<impl IntoResponse, ObserverError> {
    let stored = request(&state, &id, |reply| ControlCommand::InjectAnomaly { anomaly, reply })
        .await?
        .inspect_err(|e| warn!(sim_id = %id, error = %e, "external anomaly rejected"))?;
    Ok(Json(json!({ "success": true, "anomaly": stored })))
}

/// Append a transcript line from an external source.
pub async fn inject_transcript(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(line): Json<ExternalTranscript>,
) -> Result<impl IntoResponse, ObserverError> {
    request(&state, &id, |reply| ControlCommand::InjectTranscript { line, reply }).await??;
    Ok(Json(json!({ "success": true })))
}
