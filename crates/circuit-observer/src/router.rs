//! Axum router construction for the observer API.
//!
//! Assembles all routes (REST + WebSocket) into a single [`Router`] with
//! CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the observer server.
///
/// The router includes:
/// - `GET /health` -- liveness check
/// - `GET /simulations` -- live simulations
/// - `GET /simulations/live` -- WebSocket; one simulation per connection
/// - `GET /simulations/{id}/export` -- history CSV
/// - `POST /simulations/{id}/brain-mode` -- switch brain mode
/// - `POST /simulations/{id}/broadcast` -- broadcast pending instruction
/// - `POST /simulations/{id}/reject` -- reject pending instruction
/// - `GET /simulations/{id}/conflicts` -- current conflicts
/// - `GET /simulations/{id}/instructions` -- instruction history
/// - `POST /simulations/{id}/anomalies` -- external anomaly injection
/// - `POST /simulations/{id}/transcript` -- external transcript injection
///
/// CORS allows any origin so a dashboard served elsewhere can connect.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/simulations", get(handlers::list_simulations))
        // WebSocket
        .route("/simulations/live", get(ws::live))
        // Control surface
        .route("/simulations/{id}/export", get(handlers::export_csv))
        .route("/simulations/{id}/brain-mode", post(handlers::set_brain_mode))
        .route("/simulations/{id}/broadcast", post(handlers::broadcast))
        .route("/simulations/{id}/reject", post(handlers::reject))
        .route("/simulations/{id}/conflicts", get(handlers::conflicts))
        .route("/simulations/{id}/instructions", get(handlers::instructions))
        // External injections
        .route("/simulations/{id}/anomalies", post(handlers::inject_anomaly))
        .route("/simulations/{id}/transcript", post(handlers::inject_transcript))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
