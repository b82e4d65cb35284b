//! Wire structs for the Circuit simulation.
//!
//! Everything here is produced by the simulation core and consumed by
//! observers: the public aircraft projection, conflicts and anomalies,
//! brain instructions, transcript lines, the per-tick snapshot, and the
//! flattened history rows used for CSV export. Field names are camelCase on
//! the wire, except for [`HistoryRow`] whose snake-case names double as the
//! CSV column names.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    BrainMode, ClearanceStatus, FlightMode, Geometry, InstructionStatus, InstructionType,
    PatternLeg, Phase, RouteSegment, Severity, TranscriptRole,
};
use crate::ids::{AircraftId, InstructionId, SimulationId};

// ---------------------------------------------------------------------------
// Aircraft
// ---------------------------------------------------------------------------

/// Public projection of an aircraft, as pushed in every tick snapshot.
///
/// Simulation-internal state (planar position, track distance, join point,
/// runway latch) is deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AircraftView {
    /// Stable internal key.
    pub id: AircraftId,
    /// Display callsign (not guaranteed unique).
    pub callsign: String,
    /// ICAO aircraft type designator, e.g. `C172`.
    pub icao_type: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Altitude in feet.
    pub altitude_ft: f64,
    /// Ground speed in knots.
    pub ground_speed_kt: f64,
    /// Heading in degrees, `[0, 360)`.
    pub heading_deg: f64,
    /// Vertical speed in feet per minute, derived from the last step.
    pub vertical_speed_fpm: f64,
    /// Coarse phase of flight.
    pub phase: Phase,
    /// Fine-grained route segment.
    pub route_segment: RouteSegment,
    /// Active flight mode.
    pub flight_mode: FlightMode,
    /// Current pattern leg, or `none` off the circuit.
    pub pattern_leg: PatternLeg,
    /// Assigned (target) altitude in feet.
    pub assigned_altitude_ft: f64,
    /// Assigned (target) heading in degrees.
    pub assigned_heading_deg: f64,
    /// Assigned (target) ground speed in knots.
    pub assigned_speed_kt: f64,
    /// Most recent instruction broadcast to this aircraft.
    pub last_instruction_id: Option<InstructionId>,
    /// Clearance currently in effect.
    pub clearance_status: ClearanceStatus,
    /// Transponder code, an opaque display field.
    pub squawk: String,
}

// ---------------------------------------------------------------------------
// Conflicts and anomalies
// ---------------------------------------------------------------------------

/// A separation conflict between two aircraft, recomputed every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Conflict {
    /// Pair key, `conflict-<first>-<second>`.
    pub id: String,
    /// Ids of the two aircraft, in detection order.
    pub aircraft_ids: [AircraftId; 2],
    /// Callsigns of the two aircraft, same order as `aircraft_ids`.
    pub callsigns: [String; 2],
    /// Horizontal separation in nautical miles.
    pub horizontal_sep_nm: f64,
    /// Vertical separation in feet.
    pub vertical_sep_ft: f64,
    /// Rate of change of horizontal distance in knots; negative means closing.
    pub closing_rate_kt: f64,
    /// Severity class.
    pub severity: Severity,
    /// Closing geometry.
    pub geometry: Geometry,
    /// Absolute heading difference, `[0, 180]`.
    pub heading_diff_deg: f64,
    /// Bearing from the first aircraft to the second.
    pub bearing_deg: f64,
    /// Id of the faster of the two aircraft.
    pub faster_aircraft_id: AircraftId,
    /// Simulated time at which the conflict was detected.
    pub detected_at_sec: f64,
}

impl Conflict {
    /// Whether the given aircraft is one of the pair.
    pub fn involves(&self, id: &AircraftId) -> bool {
        self.aircraft_ids.iter().any(|a| a == id)
    }
}

/// Anomaly type label of separation conflicts found by the detector.
pub const LOSS_OF_SEPARATION: &str = "LOSS_OF_SEPARATION";

/// An entry in the anomaly stream of a tick snapshot.
///
/// Internally detected conflicts and externally injected findings share
/// this schema. Internal entries carry the full [`Conflict`] record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Anomaly {
    /// Unique id within the simulation.
    pub id: String,
    /// Anomaly type label, e.g. `LOSS_OF_SEPARATION`.
    #[serde(rename = "type")]
    pub anomaly_type: String,
    /// Severity class.
    pub severity: Severity,
    /// Simulated time at which the anomaly was recorded.
    pub sim_time_sec: f64,
    /// Ids of the aircraft involved (may be empty for external findings).
    pub aircraft_ids: Vec<AircraftId>,
    /// Callsigns of the aircraft involved.
    pub callsigns: Vec<String>,
    /// Human-readable description.
    pub description: String,
    /// Whether the anomaly came from outside the simulation.
    pub external: bool,
    /// The conflict record behind an internally detected anomaly.
    pub conflict: Option<Conflict>,
}

impl Anomaly {
    /// Whether the anomaly references the aircraft by id or by callsign.
    pub fn involves(&self, id: &AircraftId, callsign: &str) -> bool {
        self.aircraft_ids.iter().any(|a| a == id) || self.callsigns.iter().any(|c| c == callsign)
    }
}

/// Anomaly payload accepted from an external safety checker.
///
/// `aircraftIds` entries may be aircraft ids or callsigns; the simulation
/// resolves them against its current fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ExternalAnomaly {
    /// Anomaly type label.
    #[serde(rename = "type")]
    pub anomaly_type: String,
    /// Severity label (`critical`, `warning`, `advisory`, or a legacy alias).
    pub severity: String,
    /// Human-readable description.
    pub description: String,
    /// Aircraft referenced by id or callsign.
    #[serde(default)]
    pub aircraft_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// A resolution instruction produced by the brain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Instruction {
    /// Unique instruction id.
    pub id: InstructionId,
    /// Target aircraft.
    pub aircraft_id: AircraftId,
    /// Callsign of the target aircraft at creation time.
    pub callsign: String,
    /// Kind of instruction.
    #[serde(rename = "type")]
    pub instruction_type: InstructionType,
    /// Numeric parameter: knots, degrees, or feet depending on the type.
    pub value: f64,
    /// Why the instruction was generated.
    pub reason: String,
    /// Radio phraseology for the instruction.
    pub phraseology: String,
    /// Severity inherited from the conflict.
    pub severity: Severity,
    /// Pair key of the conflict that triggered the instruction.
    pub conflict_id: String,
    /// Simulated time of creation.
    pub created_at_sec: f64,
    /// Lifecycle state.
    pub status: InstructionStatus,
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// One line of the radio / system transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TranscriptEntry {
    /// Sequential id, `msg<n>`.
    pub id: String,
    /// Simulated time of the line.
    pub at_sim_time_sec: f64,
    /// Speaker.
    pub role: TranscriptRole,
    /// Callsign addressed or speaking, if any.
    pub callsign: Option<String>,
    /// The line itself.
    pub text: String,
}

/// Transcript payload accepted from an external source (e.g. a voice agent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ExternalTranscript {
    /// Speaker label; defaults to `tower`.
    #[serde(default)]
    pub role: Option<String>,
    /// Callsign addressed or speaking, if any.
    #[serde(default)]
    pub callsign: Option<String>,
    /// The line itself.
    pub text: String,
}

// ---------------------------------------------------------------------------
// Tick snapshot
// ---------------------------------------------------------------------------

/// Immutable per-tick snapshot pushed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TickSnapshot {
    /// Simulation instance id.
    pub sim_id: SimulationId,
    /// Tick counter.
    pub tick: u64,
    /// Cumulative simulated seconds.
    pub sim_time_sec: f64,
    /// Brain operating mode.
    pub brain_mode: BrainMode,
    /// All active aircraft.
    pub aircraft: Vec<AircraftView>,
    /// Anomalies current at this tick.
    pub anomalies: Vec<Anomaly>,
    /// Most recent transcript lines, oldest first.
    pub transcript: Vec<TranscriptEntry>,
    /// Suggested radio call, empty when there is nothing to say.
    pub suggested_message: String,
    /// Instruction awaiting broadcast or rejection (manual mode).
    pub pending_instruction: Option<Instruction>,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Anomaly columns of a history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HistoryAnomaly {
    /// Anomaly id.
    pub anomaly_id: String,
    /// Anomaly type label.
    pub anomaly_type: String,
    /// Severity label.
    pub anomaly_severity: Severity,
    /// Human-readable description.
    pub anomaly_description: String,
}

/// One aircraft at one tick, flattened for tabular export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HistoryRow {
    /// Simulation instance id.
    pub sim_id: SimulationId,
    /// Simulated time of the tick.
    pub sim_time_sec: f64,
    /// Aircraft id.
    pub aircraft_id: AircraftId,
    /// Callsign.
    pub callsign: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Altitude in feet.
    pub altitude_ft: f64,
    /// Ground speed in knots.
    pub ground_speed_kt: f64,
    /// Heading in degrees.
    pub heading_deg: f64,
    /// Coarse phase of flight.
    pub phase: Phase,
    /// Route segment.
    pub route_segment: RouteSegment,
    /// First anomaly the aircraft was involved in at this tick.
    pub anomaly: Option<HistoryAnomaly>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn external_anomaly_accepts_minimal_payload() {
        let json = r#"{"type":"RUNWAY_INCURSION","severity":"high","description":"vehicle on runway"}"#;
        let parsed: ExternalAnomaly = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.anomaly_type, "RUNWAY_INCURSION");
        assert!(parsed.aircraft_ids.is_empty());
    }

    #[test]
    fn external_transcript_role_is_optional() {
        let parsed: ExternalTranscript = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert!(parsed.role.is_none());
        assert!(parsed.callsign.is_none());
    }

    #[test]
    fn anomaly_matches_by_id_or_callsign() {
        let anomaly = Anomaly {
            id: String::from("ext-1"),
            anomaly_type: String::from("TEST"),
            severity: Severity::Advisory,
            sim_time_sec: 0.0,
            aircraft_ids: vec![AircraftId::from("ac1")],
            callsigns: vec![String::from("DAL123")],
            description: String::new(),
            external: true,
            conflict: None,
        };
        assert!(anomaly.involves(&AircraftId::from("ac1"), "N1"));
        assert!(anomaly.involves(&AircraftId::from("ac9"), "DAL123"));
        assert!(!anomaly.involves(&AircraftId::from("ac9"), "N1"));
    }
}
