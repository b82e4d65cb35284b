//! Integration tests for the observer API endpoints.
//!
//! Control endpoint tests use Axum's `Router` directly via
//! `tower::ServiceExt` without starting a TCP server; the simulation is
//! owned by a spawned task that only serves commands. The live stream
//! test binds a real listener and connects with `tokio-tungstenite`.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use circuit_core::aircraft::{Aircraft, PROFILES};
use circuit_core::{CircuitConfig, Simulation, SimulationConfig};
use circuit_observer::build_router;
use circuit_observer::session::Session;
use circuit_observer::state::AppState;
use circuit_types::SimulationId;
use futures::StreamExt;
use serde_json::Value;
use tower::ServiceExt;

fn make_state() -> Arc<AppState> {
    Arc::new(AppState::new(CircuitConfig::default()))
}

/// A deterministic simulation with two aircraft half a mile apart.
fn conflicted_sim() -> Simulation {
    let mut sim = Simulation::new(SimulationConfig::deterministic()).unwrap();
    for (callsign, s) in [("N123AB", 10.0), ("N456CD", 10.5)] {
        let (id, squawk) = sim.next_identity();
        let ac = Aircraft::in_pattern(id, callsign, PROFILES[0], squawk, sim.track(), s, true);
        sim.add_aircraft(ac);
    }
    sim
}

/// Register `sim` after `ticks` steps, with a task serving its commands.
async fn register(state: &AppState, sim: Simulation, ticks: usize) -> SimulationId {
    let (mut session, handle) = Session::new(sim);
    for _ in 0..ticks {
        session.tick().unwrap();
    }
    let id = session.id();
    state.registry.insert(id, handle).await;
    tokio::spawn(async move {
        while let Some(command) = session.next_command().await {
            session.handle(command);
        }
    });
    id
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let response = build_router(Arc::clone(state))
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

async fn post(state: &Arc<AppState>, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = build_router(Arc::clone(state))
        .oneshot(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

#[tokio::test]
async fn test_health() {
    let state = make_state();
    let (status, json) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_list_simulations() {
    let state = make_state();
    let (_, json) = get(&state, "/simulations").await;
    assert_eq!(json["count"], 0);

    let id = register(&state, conflicted_sim(), 3).await;
    let (status, json) = get(&state, "/simulations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["simulations"][0]["id"], id.to_string());
    assert_eq!(json["simulations"][0]["tick"], 3);
    assert_eq!(json["simulations"][0]["aircraft"], 2);
}

#[tokio::test]
async fn test_unknown_simulation_returns_404() {
    let state = make_state();
    let unknown = SimulationId::new();

    let (status, json) = post(
        &state,
        &format!("/simulations/{unknown}/broadcast"),
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);

    let (status, _) = get(&state, &format!("/simulations/{unknown}/conflicts")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&state, "/simulations/not-a-uuid/instructions").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_brain_mode_switch() {
    let state = make_state();
    let id = register(&state, conflicted_sim(), 0).await;
    let uri = format!("/simulations/{id}/brain-mode");

    let (status, json) = post(&state, &uri, serde_json::json!({ "autoMode": true })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["brainMode"], "automatic");

    let (_, json) = post(&state, &uri, serde_json::json!({ "autoMode": false })).await;
    assert_eq!(json["brainMode"], "manual");
}

#[tokio::test]
async fn test_broadcast_then_nothing_pending() {
    let state = make_state();
    let id = register(&state, conflicted_sim(), 1).await;
    let uri = format!("/simulations/{id}/broadcast");

    let (status, json) = post(&state, &uri, Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (_, json) = post(&state, &uri, Value::Null).await;
    assert_eq!(json["success"], false);

    let (_, json) = get(&state, &format!("/simulations/{id}/instructions")).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["instructions"][0]["status"], "broadcasted");
    assert_eq!(json["instructions"][0]["type"], "SPEED_CHANGE");
}

#[tokio::test]
async fn test_reject_without_pending() {
    let state = make_state();
    let id = register(&state, conflicted_sim(), 0).await;
    let (status, json) = post(&state, &format!("/simulations/{id}/reject"), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_conflicts_and_instruction_limit() {
    let state = make_state();
    let id = register(&state, conflicted_sim(), 2).await;

    let (status, json) = get(&state, &format!("/simulations/{id}/conflicts")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["conflicts"].as_array().unwrap().len(), 1);
    assert_eq!(json["conflicts"][0]["severity"], "critical");

    let (status, json) = get(&state, &format!("/simulations/{id}/instructions?limit=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);

    let (status, _) = get(&state, &format!("/simulations/{id}/instructions?limit=100000")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_inject_anomaly() {
    let state = make_state();
    let id = register(&state, conflicted_sim(), 0).await;
    let uri = format!("/simulations/{id}/anomalies");

    let (status, json) = post(
        &state,
        &uri,
        serde_json::json!({
            "type": "RUNWAY_INCURSION",
            "severity": "high",
            "description": "Vehicle on runway",
            "aircraftIds": ["N456CD"],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["anomaly"]["id"], "ext-1");
    assert_eq!(json["anomaly"]["severity"], "warning");
    assert_eq!(json["anomaly"]["aircraftIds"][0], "ac2");

    let (status, json) = post(
        &state,
        &uri,
        serde_json::json!({
            "type": "RUNWAY_INCURSION",
            "severity": "catastrophic",
            "description": "Vehicle on runway",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("unknown severity"));
}

#[tokio::test]
async fn test_inject_transcript() {
    let state = make_state();
    let id = register(&state, conflicted_sim(), 0).await;
    let uri = format!("/simulations/{id}/transcript");

    let (status, json) = post(
        &state,
        &uri,
        serde_json::json!({ "role": "pilot", "callsign": "N123AB", "text": "Request full stop" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (status, _) = post(
        &state,
        &uri,
        serde_json::json!({ "role": "ground", "text": "Taxi via alpha" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&state, &uri, serde_json::json!({ "text": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_csv() {
    let state = make_state();
    let id = register(&state, conflicted_sim(), 3).await;

    let response = build_router(Arc::clone(&state))
        .oneshot(
            Request::get(format!("/simulations/{id}/export"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/csv"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("sim_id,"));
    assert_eq!(lines.count(), 6);
}

#[tokio::test]
async fn test_nonexistent_route_returns_404() {
    let state = make_state();
    let response = build_router(state)
        .oneshot(Request::get("/api/nonexistent").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_live_stream_registers_and_deregisters() {
    let mut config = CircuitConfig::default();
    config.server.tick_interval_ms = 20;
    let state = Arc::new(AppState::new(config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let url = format!("ws://{addr}/simulations/live?aircraft=2&seed=11&chaos=false");
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let first = socket.next().await.unwrap().unwrap();
    let snapshot: Value = serde_json::from_str(first.to_text().unwrap()).unwrap();
    assert_eq!(snapshot["tick"], 1);
    assert_eq!(snapshot["aircraft"].as_array().unwrap().len(), 2);
    assert_eq!(snapshot["brainMode"], "manual");

    let second = socket.next().await.unwrap().unwrap();
    let snapshot: Value = serde_json::from_str(second.to_text().unwrap()).unwrap();
    assert_eq!(snapshot["tick"], 2);

    let sim_id = snapshot["simId"].as_str().unwrap().to_owned();
    let (_, json) = get(&state, "/simulations").await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["simulations"][0]["id"], sim_id.as_str());

    let (status, json) = post(
        &state,
        &format!("/simulations/{sim_id}/brain-mode"),
        serde_json::json!({ "autoMode": true }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["brainMode"], "automatic");

    let _ = socket.close(None).await;
    drop(socket);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !state.registry.is_empty().await {
        assert!(tokio::time::Instant::now() < deadline, "simulation not deregistered");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let (status, _) = post(&state, &format!("/simulations/{sim_id}/broadcast"), Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
