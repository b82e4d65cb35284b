//! Enumeration types for the Circuit simulation.
//!
//! Flight modes and pattern legs are closed enums so that every consumer
//! (motion model, snapshot projection, history export) matches them
//! exhaustively. Wire names are lower-case strings except for
//! [`InstructionType`], which keeps the upper-case ATC command names.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Flight state
// ---------------------------------------------------------------------------

/// The single active flight mode of an aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum FlightMode {
    /// Flying the rectangular circuit, position derived from track distance.
    Pattern,
    /// Inbound in a straight line toward a join point on the perimeter.
    #[serde(alias = "arrival")]
    Transit,
    /// Off-route on an assigned heading, will rejoin the pattern afterwards.
    Vectored,
    /// Flying a right 360 for spacing before resuming the prior mode.
    Holding,
    /// Full-stop landing completed. Terminal.
    Landed,
}

impl FlightMode {
    /// Whether the aircraft still takes part in separation checks.
    pub const fn is_airborne(self) -> bool {
        !matches!(self, Self::Landed)
    }
}

/// Named leg of the traffic pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum PatternLeg {
    /// Runway half of the runway edge, flown in the takeoff direction.
    Upwind,
    /// First turn away from the runway.
    Crosswind,
    /// Parallel to the runway, opposite direction of landing.
    Downwind,
    /// Turn back toward the runway centreline.
    Base,
    /// Approach half of the runway edge, leading to the threshold.
    Final,
    /// Not on any leg (inbound, vectored, holding, or on the ground).
    #[serde(rename = "none")]
    Unassigned,
}

impl PatternLeg {
    /// Wire name of the leg.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upwind => "upwind",
            Self::Crosswind => "crosswind",
            Self::Downwind => "downwind",
            Self::Base => "base",
            Self::Final => "final",
            Self::Unassigned => "none",
        }
    }
}

/// Direction in which the pattern is flown.
///
/// Counter-clockwise is the mirror image of clockwise across the runway
/// centreline, so the runway edge is shared by both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum PatternDirection {
    /// Runway flown eastbound, pattern on the north side turning left.
    #[serde(rename = "cw")]
    Clockwise,
    /// Runway flown westbound, mirror image of [`PatternDirection::Clockwise`].
    #[serde(rename = "ccw")]
    CounterClockwise,
}

/// Coarse phase of flight reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Phase {
    /// In the circuit.
    Pattern,
    /// Inbound to join the circuit.
    Approach,
    /// Off-route on an ATC vector.
    Vectored,
    /// Orbiting for spacing.
    Holding,
    /// On the ground after a full stop.
    Ground,
}

impl Phase {
    /// Wire name of the phase.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Approach => "approach",
            Self::Vectored => "vectored",
            Self::Holding => "holding",
            Self::Ground => "ground",
        }
    }
}

/// Fine-grained route segment reported to observers and in history rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum RouteSegment {
    /// Inbound leg toward the join point.
    Arrival,
    /// Upwind leg of the circuit.
    Upwind,
    /// Crosswind leg of the circuit.
    Crosswind,
    /// Downwind leg of the circuit.
    Downwind,
    /// Base leg of the circuit.
    Base,
    /// Final leg of the circuit.
    Final,
    /// Off-route heading vector.
    Vector,
    /// Spacing orbit.
    Hold,
    /// On the runway after a full stop.
    Runway,
}

impl RouteSegment {
    /// Wire name of the segment.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arrival => "arrival",
            Self::Upwind => "upwind",
            Self::Crosswind => "crosswind",
            Self::Downwind => "downwind",
            Self::Base => "base",
            Self::Final => "final",
            Self::Vector => "vector",
            Self::Hold => "hold",
            Self::Runway => "runway",
        }
    }
}

/// Clearance the aircraft is currently operating under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ClearanceStatus {
    /// Flying the standard assignment given at creation.
    Assigned,
    /// Target values were amended by a broadcast instruction.
    Amended,
    /// Cleared for the option; the next runway pass is a touch-and-go.
    ClearedTouchAndGo,
    /// Cleared to land; the next runway pass is a full stop.
    ClearedToLand,
}

// ---------------------------------------------------------------------------
// Conflicts
// ---------------------------------------------------------------------------

/// Conflict severity, ordered most severe first.
///
/// The derived [`Ord`] gives `Critical < Warning < Advisory`, which is the
/// order the detector sorts its output in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Severity {
    /// Horizontal < 1 NM and vertical < 500 ft.
    Critical,
    /// Horizontal < 2 NM and vertical < 1000 ft.
    Warning,
    /// Horizontal < 3 NM, vertical < 1500 ft, and closing.
    Advisory,
}

impl Severity {
    /// Wire name of the severity.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Advisory => "advisory",
        }
    }

    /// Parse a severity label supplied by an external safety checker.
    ///
    /// Accepts the three canonical names plus the legacy labels `high`
    /// (treated as warning) and `low` / `info` (treated as advisory).
    /// Matching is case-insensitive.
    pub fn parse_external(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "warning" | "high" => Some(Self::Warning),
            "advisory" | "low" | "info" => Some(Self::Advisory),
            _ => None,
        }
    }
}

/// Closing geometry of a conflict pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum Geometry {
    /// Headings differ by more than 150 degrees.
    HeadOn,
    /// Headings differ by 30 to 150 degrees.
    Converging,
    /// Same direction, one aircraft faster than the other.
    Overtaking,
    /// Same direction, matched speeds.
    SameDirection,
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// Kind of resolution instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum InstructionType {
    /// New target ground speed (kt).
    SpeedChange,
    /// New target heading (deg).
    HeadingChange,
    /// New target altitude (ft).
    AltitudeChange,
    /// Right 360 for spacing; the parameter is the orbit size in degrees.
    PatternHold,
}

/// Lifecycle state of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum InstructionStatus {
    /// Suggested, awaiting a controller decision (manual mode).
    Pending,
    /// Transmitted and applied to the aircraft.
    Broadcasted,
    /// Discarded by the controller.
    Rejected,
}

/// Operating mode of the brain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum BrainMode {
    /// Instructions are suggestions until broadcast or rejected.
    Manual,
    /// Instructions are applied as soon as they are generated.
    Automatic,
}

impl BrainMode {
    /// Map the `autoMode` flag of the control API onto a mode.
    pub const fn from_auto(auto: bool) -> Self {
        if auto { Self::Automatic } else { Self::Manual }
    }

    /// Whether this is [`BrainMode::Automatic`].
    pub const fn is_auto(self) -> bool {
        matches!(self, Self::Automatic)
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Speaker of a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum TranscriptRole {
    /// The tower controller.
    Tower,
    /// A pilot.
    Pilot,
    /// The simulation itself (events, chaos injections).
    System,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_most_severe_first() {
        let mut v = vec![Severity::Advisory, Severity::Critical, Severity::Warning];
        v.sort();
        assert_eq!(v, vec![Severity::Critical, Severity::Warning, Severity::Advisory]);
    }

    #[test]
    fn external_severity_labels() {
        assert_eq!(Severity::parse_external("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::parse_external("high"), Some(Severity::Warning));
        assert_eq!(Severity::parse_external(" info "), Some(Severity::Advisory));
        assert_eq!(Severity::parse_external("catastrophic"), None);
    }

    #[test]
    fn wire_names() {
        assert_eq!(serde_json::to_string(&Geometry::HeadOn).unwrap(), "\"head-on\"");
        assert_eq!(
            serde_json::to_string(&InstructionType::PatternHold).unwrap(),
            "\"PATTERN_HOLD\""
        );
        assert_eq!(serde_json::to_string(&PatternLeg::Unassigned).unwrap(), "\"none\"");
        assert_eq!(
            serde_json::to_string(&PatternDirection::CounterClockwise).unwrap(),
            "\"ccw\""
        );
    }

    #[test]
    fn arrival_is_an_alias_for_transit() {
        let mode: FlightMode = serde_json::from_str("\"arrival\"").unwrap();
        assert_eq!(mode, FlightMode::Transit);
        assert!(!FlightMode::Landed.is_airborne());
    }
}
