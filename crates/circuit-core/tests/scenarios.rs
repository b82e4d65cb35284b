//! End-to-end scenarios driven through the public `Simulation` API.
//!
//! Every scenario starts from `SimulationConfig::deterministic()` (fixed
//! seed, no chaos, no arrivals) and places aircraft explicitly, so the
//! outcomes do not depend on random draws.

#![allow(clippy::unwrap_used)]

use circuit_core::aircraft::{Aircraft, JoinPoint, PROFILES};
use circuit_core::geometry::Point;
use circuit_core::{Simulation, SimulationConfig};
use circuit_types::{
    BrainMode, ClearanceStatus, FlightMode, InstructionType, LOSS_OF_SEPARATION, PatternLeg,
    Severity, TickSnapshot, TranscriptRole,
};

fn sim_with(config: SimulationConfig) -> Simulation {
    Simulation::new(config).unwrap()
}

fn place_in_pattern(sim: &mut Simulation, callsign: &str, s: f64, touch_and_go: bool) {
    let (id, squawk) = sim.next_identity();
    let ac = Aircraft::in_pattern(id, callsign, PROFILES[0], squawk, sim.track(), s, touch_and_go);
    sim.add_aircraft(ac);
}

/// Two C172s half a mile apart on the crosswind leg.
fn close_pair(sim: &mut Simulation) {
    place_in_pattern(sim, "N123AB", 10.0, true);
    place_in_pattern(sim, "N456CD", 10.5, true);
}

#[test]
fn close_pair_raises_critical_loss_of_separation() {
    let mut sim = sim_with(SimulationConfig::deterministic());
    close_pair(&mut sim);
    let snap = sim.step().unwrap();

    assert_eq!(snap.anomalies.len(), 1);
    let anomaly = &snap.anomalies[0];
    assert_eq!(anomaly.anomaly_type, LOSS_OF_SEPARATION);
    assert_eq!(anomaly.severity, Severity::Critical);
    assert!(!anomaly.external);

    let conflict = &sim.conflicts()[0];
    assert!((conflict.horizontal_sep_nm - 0.5).abs() < 1e-9);
    assert!(conflict.vertical_sep_ft.abs() < 1e-9);

    let pending = snap.pending_instruction.unwrap();
    assert_eq!(pending.callsign, "N123AB");
    assert_eq!(pending.instruction_type, InstructionType::SpeedChange);
    assert!((pending.value - 80.0).abs() < f64::EPSILON);
    assert_eq!(
        pending.phraseology,
        "N123AB, reduce speed to 80 knots. Maintain separation from N456CD."
    );
}

#[test]
fn broadcast_speed_change_is_flown() {
    let mut sim = sim_with(SimulationConfig::deterministic());
    close_pair(&mut sim);
    sim.step().unwrap();
    assert!(sim.broadcast());
    for _ in 0..10 {
        sim.step().unwrap();
    }
    let lead = sim.fleet().iter().find(|ac| ac.callsign == "N123AB").unwrap();
    assert!((lead.target_speed_kt - 80.0).abs() < f64::EPSILON);
    assert!((lead.ground_speed_kt - 80.0).abs() < 1e-9);
    assert_eq!(lead.clearance, ClearanceStatus::Amended);
}

#[test]
fn automatic_mode_respects_cooldown() {
    let mut sim = sim_with(SimulationConfig::deterministic());
    sim.set_brain_mode(BrainMode::Automatic);
    close_pair(&mut sim);
    for _ in 0..5 {
        let snap = sim.step().unwrap();
        assert!(snap.pending_instruction.is_none());
    }
    let issued = sim.instructions(50);
    assert_eq!(issued.len(), 2);
    assert_ne!(issued[0].aircraft_id, issued[1].aircraft_id);

    let tower_calls = sim
        .transcript()
        .entries()
        .iter()
        .filter(|e| e.role == TranscriptRole::Tower && e.text.contains("reduce speed"))
        .count();
    assert_eq!(tower_calls, 2);
}

#[test]
fn empty_sky_stays_quiet() {
    let mut sim = sim_with(SimulationConfig::deterministic());
    let mut last = None;
    for _ in 0..100 {
        last = Some(sim.step().unwrap());
    }
    let snap = last.unwrap();
    assert_eq!(snap.tick, 100);
    assert!(snap.aircraft.is_empty());
    assert!(snap.anomalies.is_empty());
    assert!(snap.transcript.is_empty());
    assert!(snap.suggested_message.is_empty());
    assert!(sim.history().is_empty());
    assert_eq!(sim.export_csv().unwrap().lines().count(), 1);
}

#[test]
fn pattern_lap_returns_to_start() {
    let config = SimulationConfig {
        touch_and_go_probability: 1.0,
        ..SimulationConfig::deterministic()
    };
    let mut sim = sim_with(config);
    place_in_pattern(&mut sim, "N123AB", 0.0, true);
    let start = sim.fleet()[0].position;

    // 24 NM perimeter at 90 kt.
    for _ in 0..960 {
        sim.step().unwrap();
    }
    let ac = &sim.fleet()[0];
    assert_eq!(ac.flight_mode(), FlightMode::Pattern);
    assert!(ac.position.distance_to(start) < 1e-6);
}

#[test]
fn full_stop_removes_aircraft() {
    let mut sim = sim_with(SimulationConfig::deterministic());
    place_in_pattern(&mut sim, "N123AB", 3.99, false);
    let snap = sim.step().unwrap();
    assert!(snap.aircraft.is_empty());
    assert!(sim.fleet().is_empty());
    let snap = sim.step().unwrap();
    assert_eq!(snap.tick, 2);
    assert!(snap.aircraft.is_empty());
}

#[test]
fn inbound_joins_pattern_with_landing_clearance() {
    let mut sim = sim_with(SimulationConfig::deterministic());
    let join = JoinPoint::on_track(sim.track(), 0.0);
    let start = Point::new(join.point.x, join.point.y - 0.5);
    let (id, squawk) = sim.next_identity();
    sim.add_aircraft(Aircraft::inbound(
        id, "UAL789", PROFILES[0], squawk, start, join, false,
    ));

    let mut joined_at = None;
    for tick in 1..=40_u32 {
        sim.step().unwrap();
        if sim.fleet()[0].flight_mode() == FlightMode::Pattern {
            joined_at = Some(tick);
            break;
        }
    }
    // 0.5 NM at 90 kt is 20 seconds.
    let tick = joined_at.unwrap();
    assert!((20..=21).contains(&tick));
    let ac = &sim.fleet()[0];
    assert_eq!(ac.leg, PatternLeg::Final);
    assert_eq!(ac.clearance, ClearanceStatus::ClearedToLand);
}

#[test]
fn same_seed_same_world() {
    let config = SimulationConfig {
        seed: Some(42),
        ..SimulationConfig::default()
    };
    let mut a = sim_with(config.clone());
    let mut b = sim_with(config);
    for _ in 0..200 {
        a.step().unwrap();
        b.step().unwrap();
    }
    assert_eq!(a.fleet().len(), b.fleet().len());
    for (x, y) in a.fleet().iter().zip(b.fleet()) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.callsign, y.callsign);
        assert!(x.position.distance_to(y.position) < 1e-12);
        assert!((x.altitude_ft - y.altitude_ft).abs() < 1e-12);
    }
    assert_eq!(a.transcript().len(), b.transcript().len());
}

#[test]
fn history_has_one_row_per_aircraft_per_tick() {
    let config = SimulationConfig {
        initial_aircraft: 2,
        ..SimulationConfig::deterministic()
    };
    let mut sim = sim_with(config);
    for _ in 0..10 {
        sim.step().unwrap();
    }
    assert_eq!(sim.history().len(), 20);
    let csv = sim.export_csv().unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("sim_id,sim_time_sec,aircraft_id"));
    assert_eq!(lines.count(), 20);
}

#[test]
fn snapshot_serializes_with_camel_case_fields() {
    let mut sim = sim_with(SimulationConfig::deterministic());
    close_pair(&mut sim);
    let snap = sim.step().unwrap();
    let value = serde_json::to_value(&snap).unwrap();
    for key in [
        "simId",
        "tick",
        "simTimeSec",
        "brainMode",
        "aircraft",
        "anomalies",
        "transcript",
        "suggestedMessage",
        "pendingInstruction",
    ] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["anomalies"][0]["type"], LOSS_OF_SEPARATION);
}

fn close_enough(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(1.0)
}

#[test]
fn snapshot_survives_a_json_round_trip() {
    let mut sim = sim_with(SimulationConfig::deterministic());
    close_pair(&mut sim);
    place_in_pattern(&mut sim, "DAL123", 20.0, false);
    let mut snap = sim.step().unwrap();
    for _ in 0..4 {
        snap = sim.step().unwrap();
    }
    assert_eq!(snap.aircraft.len(), 3);
    assert!(!snap.anomalies.is_empty());

    let text = serde_json::to_string(&snap).unwrap();
    let back: TickSnapshot = serde_json::from_str(&text).unwrap();

    assert_eq!(back.sim_id, snap.sim_id);
    assert_eq!(back.tick, snap.tick);
    assert!(close_enough(back.sim_time_sec, snap.sim_time_sec));
    assert_eq!(back.brain_mode, snap.brain_mode);
    assert_eq!(back.suggested_message, snap.suggested_message);
    let lines = |s: &TickSnapshot| {
        s.transcript
            .iter()
            .map(|e| (e.id.clone(), e.role, e.text.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(lines(&back), lines(&snap));

    assert_eq!(back.aircraft.len(), snap.aircraft.len());
    for (got, want) in back.aircraft.iter().zip(&snap.aircraft) {
        assert_eq!(got.id, want.id);
        assert_eq!(got.callsign, want.callsign);
        assert_eq!(got.squawk, want.squawk);
        assert_eq!(got.phase, want.phase);
        assert_eq!(got.pattern_leg, want.pattern_leg);
        assert_eq!(got.clearance_status, want.clearance_status);
        for (g, w) in [
            (got.lat, want.lat),
            (got.lon, want.lon),
            (got.altitude_ft, want.altitude_ft),
            (got.ground_speed_kt, want.ground_speed_kt),
            (got.heading_deg, want.heading_deg),
            (got.vertical_speed_fpm, want.vertical_speed_fpm),
            (got.assigned_altitude_ft, want.assigned_altitude_ft),
            (got.assigned_heading_deg, want.assigned_heading_deg),
            (got.assigned_speed_kt, want.assigned_speed_kt),
        ] {
            assert!(close_enough(g, w), "{} field drifted: {g} vs {w}", want.callsign);
        }
    }

    assert_eq!(back.anomalies.len(), snap.anomalies.len());
    for (got, want) in back.anomalies.iter().zip(&snap.anomalies) {
        assert_eq!(got.id, want.id);
        assert_eq!(got.anomaly_type, want.anomaly_type);
        assert_eq!(got.severity, want.severity);
        assert_eq!(got.aircraft_ids, want.aircraft_ids);
        assert_eq!(got.callsigns, want.callsigns);
        let (g, w) = (got.conflict.as_ref().unwrap(), want.conflict.as_ref().unwrap());
        assert!(close_enough(g.horizontal_sep_nm, w.horizontal_sep_nm));
        assert!(close_enough(g.vertical_sep_ft, w.vertical_sep_ft));
        assert!(close_enough(g.closing_rate_kt, w.closing_rate_kt));
    }

    assert_eq!(
        back.pending_instruction.as_ref().map(|i| i.id),
        snap.pending_instruction.as_ref().map(|i| i.id)
    );
}
