//! Aircraft entity, flight-mode state, and the single merge point for
//! per-tick state changes.
//!
//! An [`Aircraft`] holds kinematic state, target (assigned) state, and a
//! [`ModeState`] tagged union. The motion model never mutates an aircraft
//! directly: it returns a [`MotionDelta`] which [`Aircraft::apply`] merges,
//! clamping and normalizing on the way in. Broadcast instructions go through
//! [`Aircraft::apply_instruction`].

use circuit_types::{
    AircraftId, AircraftView, ClearanceStatus, FlightMode, Instruction, InstructionId,
    InstructionType, PatternLeg, Phase, RouteSegment,
};

use crate::geometry::{GeoFrame, PatternTrack, Point, normalize_heading};

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Performance profile of an aircraft type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AircraftProfile {
    /// ICAO type designator.
    pub icao_type: &'static str,
    /// Speed flown in the pattern, in knots.
    pub pattern_speed_kt: f64,
    /// Pattern altitude in feet.
    pub pattern_altitude_ft: f64,
}

/// The fleet mix drawn from for initial aircraft and arrivals.
pub const PROFILES: [AircraftProfile; 4] = [
    AircraftProfile {
        icao_type: "C172",
        pattern_speed_kt: 90.0,
        pattern_altitude_ft: 1500.0,
    },
    AircraftProfile {
        icao_type: "B738",
        pattern_speed_kt: 150.0,
        pattern_altitude_ft: 2500.0,
    },
    AircraftProfile {
        icao_type: "A320",
        pattern_speed_kt: 150.0,
        pattern_altitude_ft: 2500.0,
    },
    AircraftProfile {
        icao_type: "E190",
        pattern_speed_kt: 140.0,
        pattern_altitude_ft: 2200.0,
    },
];

/// Callsigns drawn from for new aircraft. Duplicates across the fleet are
/// allowed; the aircraft id is the unique key.
pub const CALLSIGNS: [&str; 6] = ["N123AB", "N456CD", "N789EF", "DAL123", "UAL789", "AAL456"];

// ---------------------------------------------------------------------------
// Mode state
// ---------------------------------------------------------------------------

/// A point on the perimeter an inbound aircraft flies to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinPoint {
    /// Planar position of the join point.
    pub point: Point,
    /// Track distance of the join point.
    pub track_pos_nm: f64,
    /// Leg the aircraft is on after joining.
    pub leg: PatternLeg,
}

impl JoinPoint {
    /// Join point at track distance `track_pos_nm` of `track`.
    pub fn on_track(track: &PatternTrack, track_pos_nm: f64) -> Self {
        let tp = track.position_at(track_pos_nm);
        Self {
            point: tp.point,
            track_pos_nm: track.wrap(track_pos_nm),
            leg: tp.leg,
        }
    }
}

/// Mode an aircraft goes back to after a spacing orbit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resume {
    /// Back onto the circuit at the frozen track distance.
    Pattern {
        /// Track distance when the orbit began.
        track_pos_nm: f64,
    },
    /// Continue inbound.
    Transit {
        /// Join point of the interrupted transit.
        join: JoinPoint,
    },
    /// Continue the heading vector.
    Vectored {
        /// Vector time left when the orbit began.
        remaining_sec: f64,
    },
}

impl Resume {
    /// The mode state to restore.
    pub const fn into_mode(self) -> ModeState {
        match self {
            Self::Pattern { track_pos_nm } => ModeState::Pattern { track_pos_nm },
            Self::Transit { join } => ModeState::Transit { join },
            Self::Vectored { remaining_sec } => ModeState::Vectored { remaining_sec },
        }
    }
}

/// Flight mode together with the state only that mode needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModeState {
    /// On the circuit; position is a pure function of track distance.
    Pattern {
        /// Distance flown along the perimeter, `[0, perimeter)`.
        track_pos_nm: f64,
    },
    /// Straight line toward a join point.
    Transit {
        /// Where the aircraft joins the pattern.
        join: JoinPoint,
    },
    /// Flying an assigned heading.
    Vectored {
        /// Simulated seconds left before rejoining.
        remaining_sec: f64,
    },
    /// Right 360 for spacing.
    Holding {
        /// Degrees turned so far.
        turned_deg: f64,
        /// Mode to restore afterwards.
        resume: Resume,
    },
    /// Full stop completed.
    Landed,
}

impl ModeState {
    /// Public flight mode of this state.
    pub const fn flight_mode(&self) -> FlightMode {
        match self {
            Self::Pattern { .. } => FlightMode::Pattern,
            Self::Transit { .. } => FlightMode::Transit,
            Self::Vectored { .. } => FlightMode::Vectored,
            Self::Holding { .. } => FlightMode::Holding,
            Self::Landed => FlightMode::Landed,
        }
    }

    /// The mode to resume after an orbit begun from this state.
    ///
    /// `None` for states that cannot enter a hold.
    pub const fn resume_point(&self) -> Option<Resume> {
        match *self {
            Self::Pattern { track_pos_nm } => Some(Resume::Pattern { track_pos_nm }),
            Self::Transit { join } => Some(Resume::Transit { join }),
            Self::Vectored { remaining_sec } => Some(Resume::Vectored { remaining_sec }),
            Self::Holding { .. } | Self::Landed => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Motion delta
// ---------------------------------------------------------------------------

/// Something noteworthy that happened during one motion step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionEvent {
    /// Transit reached its join point.
    JoinedPattern {
        /// Leg of the join point.
        leg: PatternLeg,
    },
    /// Runway pass flown as a touch-and-go.
    TouchAndGo,
    /// Runway pass flown as a full stop.
    FullStop,
    /// Heading vector expired; rejoining through transit.
    VectorComplete,
    /// Spacing orbit completed.
    HoldComplete,
    /// Random perturbation applied.
    Chaos(ChaosKind),
}

/// Kind of random perturbation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChaosKind {
    /// Small altitude excursion.
    AltitudeBump {
        /// Change in feet.
        delta_ft: f64,
    },
    /// Altitude snapped to a bad value.
    AltitudeDeviation {
        /// New altitude in feet.
        altitude_ft: f64,
    },
    /// Sudden turn off course.
    HeadingDeviation {
        /// Turn in degrees, negative is left.
        turn_deg: f64,
    },
    /// Speed dropped to the stall floor.
    SpeedDrop {
        /// New speed in knots.
        speed_kt: f64,
    },
}

impl ChaosKind {
    /// System transcript line describing a deliberate deviation.
    ///
    /// Small bumps are not narrated.
    pub fn narration(&self) -> Option<String> {
        match self {
            Self::AltitudeBump { .. } => None,
            Self::AltitudeDeviation { altitude_ft } => {
                Some(format!("Simulated altitude deviation to {altitude_ft:.0}ft"))
            }
            Self::HeadingDeviation { turn_deg } => {
                Some(format!("Simulated heading deviation {turn_deg:.0} deg"))
            }
            Self::SpeedDrop { speed_kt } => Some(format!("Simulated speed drop to {speed_kt:.0}kt")),
        }
    }
}

/// Proposed next state of one aircraft, produced by the motion model.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionDelta {
    /// New planar position.
    pub position: Point,
    /// New heading.
    pub heading_deg: f64,
    /// New altitude.
    pub altitude_ft: f64,
    /// New ground speed.
    pub ground_speed_kt: f64,
    /// New mode state.
    pub mode: ModeState,
    /// New pattern leg.
    pub leg: PatternLeg,
    /// Replacement target heading, when the mode dictates one.
    pub target_heading_deg: Option<f64>,
    /// Whether the runway event has fired on the current pass.
    pub runway_latched: bool,
    /// Next runway pass is a touch-and-go.
    pub will_touch_and_go: bool,
    /// Replacement clearance, if the step changed it.
    pub clearance: Option<ClearanceStatus>,
    /// Events raised during the step.
    pub events: Vec<MotionEvent>,
}

// ---------------------------------------------------------------------------
// Aircraft
// ---------------------------------------------------------------------------

/// One simulated aircraft.
#[derive(Debug, Clone, PartialEq)]
pub struct Aircraft {
    /// Stable internal key.
    pub id: AircraftId,
    /// Display callsign.
    pub callsign: String,
    /// Performance profile.
    pub profile: AircraftProfile,
    /// Transponder code.
    pub squawk: String,
    /// Planar position in NM.
    pub position: Point,
    /// Altitude in feet, never negative.
    pub altitude_ft: f64,
    /// Ground speed in knots, never negative.
    pub ground_speed_kt: f64,
    /// Heading, `[0, 360)`.
    pub heading_deg: f64,
    /// Derived from the last altitude change.
    pub vertical_speed_fpm: f64,
    /// Altitude the motion model converges toward.
    pub target_altitude_ft: f64,
    /// Heading the motion model converges toward.
    pub target_heading_deg: f64,
    /// Speed the motion model converges toward.
    pub target_speed_kt: f64,
    /// Flight mode and its state.
    pub mode: ModeState,
    /// Current pattern leg.
    pub leg: PatternLeg,
    /// Clearance in effect.
    pub clearance: ClearanceStatus,
    /// Most recent broadcast instruction.
    pub last_instruction_id: Option<InstructionId>,
    /// Next runway pass is a touch-and-go.
    pub will_touch_and_go: bool,
    /// Runway event already fired on the current pass.
    pub runway_latched: bool,
}

impl Aircraft {
    /// An aircraft on the circuit at track distance `track_pos_nm`, at
    /// pattern altitude and speed.
    pub fn in_pattern(
        id: AircraftId,
        callsign: &str,
        profile: AircraftProfile,
        squawk: u32,
        track: &PatternTrack,
        track_pos_nm: f64,
        will_touch_and_go: bool,
    ) -> Self {
        let tp = track.position_at(track_pos_nm);
        Self {
            id,
            callsign: callsign.to_owned(),
            profile,
            squawk: squawk.to_string(),
            position: tp.point,
            altitude_ft: profile.pattern_altitude_ft,
            ground_speed_kt: profile.pattern_speed_kt,
            heading_deg: tp.heading_deg,
            vertical_speed_fpm: 0.0,
            target_altitude_ft: profile.pattern_altitude_ft,
            target_heading_deg: tp.heading_deg,
            target_speed_kt: profile.pattern_speed_kt,
            mode: ModeState::Pattern {
                track_pos_nm: track.wrap(track_pos_nm),
            },
            leg: tp.leg,
            clearance: ClearanceStatus::Assigned,
            last_instruction_id: None,
            will_touch_and_go,
            runway_latched: PatternTrack::is_runway_leg(tp.leg),
        }
    }

    /// An inbound aircraft at `position` heading for `join`, at pattern
    /// altitude and speed.
    pub fn inbound(
        id: AircraftId,
        callsign: &str,
        profile: AircraftProfile,
        squawk: u32,
        position: Point,
        join: JoinPoint,
        will_touch_and_go: bool,
    ) -> Self {
        let heading = position.bearing_to(join.point);
        Self {
            id,
            callsign: callsign.to_owned(),
            profile,
            squawk: squawk.to_string(),
            position,
            altitude_ft: profile.pattern_altitude_ft,
            ground_speed_kt: profile.pattern_speed_kt,
            heading_deg: heading,
            vertical_speed_fpm: 0.0,
            target_altitude_ft: profile.pattern_altitude_ft,
            target_heading_deg: heading,
            target_speed_kt: profile.pattern_speed_kt,
            mode: ModeState::Transit { join },
            leg: PatternLeg::Unassigned,
            clearance: ClearanceStatus::Assigned,
            last_instruction_id: None,
            will_touch_and_go,
            runway_latched: false,
        }
    }

    /// Public flight mode.
    pub const fn flight_mode(&self) -> FlightMode {
        self.mode.flight_mode()
    }

    /// Whether the aircraft has made a full stop.
    pub const fn is_landed(&self) -> bool {
        matches!(self.mode, ModeState::Landed)
    }

    /// Coarse phase of flight.
    pub const fn phase(&self) -> Phase {
        match self.mode {
            ModeState::Pattern { .. } => Phase::Pattern,
            ModeState::Transit { .. } => Phase::Approach,
            ModeState::Vectored { .. } => Phase::Vectored,
            ModeState::Holding { .. } => Phase::Holding,
            ModeState::Landed => Phase::Ground,
        }
    }

    /// Fine-grained route segment.
    pub const fn route_segment(&self) -> RouteSegment {
        match self.mode {
            ModeState::Pattern { .. } => match self.leg {
                PatternLeg::Upwind => RouteSegment::Upwind,
                PatternLeg::Crosswind => RouteSegment::Crosswind,
                PatternLeg::Downwind => RouteSegment::Downwind,
                PatternLeg::Base => RouteSegment::Base,
                PatternLeg::Final | PatternLeg::Unassigned => RouteSegment::Final,
            },
            ModeState::Transit { .. } => RouteSegment::Arrival,
            ModeState::Vectored { .. } => RouteSegment::Vector,
            ModeState::Holding { .. } => RouteSegment::Hold,
            ModeState::Landed => RouteSegment::Runway,
        }
    }

    /// Pattern leg as reported to observers: `none` off the circuit.
    pub const fn reported_leg(&self) -> PatternLeg {
        match self.mode {
            ModeState::Pattern { .. } => self.leg,
            _ => PatternLeg::Unassigned,
        }
    }

    /// Project the public view.
    pub fn view(&self, frame: &GeoFrame) -> AircraftView {
        let (lat, lon) = frame.to_lat_lon(self.position);
        AircraftView {
            id: self.id.clone(),
            callsign: self.callsign.clone(),
            icao_type: self.profile.icao_type.to_owned(),
            lat,
            lon,
            altitude_ft: self.altitude_ft,
            ground_speed_kt: self.ground_speed_kt,
            heading_deg: self.heading_deg,
            vertical_speed_fpm: self.vertical_speed_fpm,
            phase: self.phase(),
            route_segment: self.route_segment(),
            flight_mode: self.flight_mode(),
            pattern_leg: self.reported_leg(),
            assigned_altitude_ft: self.target_altitude_ft,
            assigned_heading_deg: self.target_heading_deg,
            assigned_speed_kt: self.target_speed_kt,
            last_instruction_id: self.last_instruction_id,
            clearance_status: self.clearance,
            squawk: self.squawk.clone(),
        }
    }

    /// Merge a motion delta. Returns the events it carried.
    ///
    /// Values are clamped (altitude and speed at zero, heading normalized)
    /// and vertical speed is derived from the altitude change. A landed
    /// aircraft ignores every delta.
    pub fn apply(&mut self, delta: MotionDelta, dt_sec: f64) -> Vec<MotionEvent> {
        if self.is_landed() {
            return Vec::new();
        }
        let altitude = finite_or(delta.altitude_ft, self.altitude_ft).max(0.0);
        self.vertical_speed_fpm = if dt_sec > 0.0 {
            (altitude - self.altitude_ft) / dt_sec * 60.0
        } else {
            0.0
        };
        self.altitude_ft = altitude;
        self.position = Point::new(
            finite_or(delta.position.x, self.position.x),
            finite_or(delta.position.y, self.position.y),
        );
        self.heading_deg = normalize_heading(delta.heading_deg);
        self.ground_speed_kt = finite_or(delta.ground_speed_kt, self.ground_speed_kt).max(0.0);
        if let Some(target) = delta.target_heading_deg {
            self.target_heading_deg = normalize_heading(target);
        }
        self.mode = delta.mode;
        self.leg = delta.leg;
        self.runway_latched = delta.runway_latched;
        self.will_touch_and_go = delta.will_touch_and_go;
        if let Some(clearance) = delta.clearance {
            self.clearance = clearance;
        }
        if self.is_landed() {
            self.ground_speed_kt = 0.0;
            self.target_speed_kt = 0.0;
            self.vertical_speed_fpm = 0.0;
            self.leg = PatternLeg::Unassigned;
        }
        delta.events
    }

    /// Copy a broadcast instruction into the target fields.
    ///
    /// Speed targets are clamped to `[min_speed_kt, max_speed_kt]`.
    /// A heading change takes a pattern or inbound aircraft off its route for
    /// `vector_sec`. A pattern hold starts a right 360. Landed aircraft
    /// ignore instructions. Returns whether the instruction took effect.
    pub fn apply_instruction(
        &mut self,
        instruction: &Instruction,
        limits: &InstructionLimits,
    ) -> bool {
        if self.is_landed() {
            return false;
        }
        match instruction.instruction_type {
            InstructionType::SpeedChange => {
                self.target_speed_kt = instruction
                    .value
                    .clamp(limits.min_speed_kt, limits.max_speed_kt);
            }
            InstructionType::AltitudeChange => {
                self.target_altitude_ft = instruction.value.max(0.0);
            }
            InstructionType::HeadingChange => {
                self.target_heading_deg = normalize_heading(instruction.value);
                self.mode = match self.mode {
                    ModeState::Pattern { .. }
                    | ModeState::Transit { .. }
                    | ModeState::Vectored { .. } => ModeState::Vectored {
                        remaining_sec: limits.vector_sec,
                    },
                    ModeState::Holding { turned_deg, .. } => ModeState::Holding {
                        turned_deg,
                        resume: Resume::Vectored {
                            remaining_sec: limits.vector_sec,
                        },
                    },
                    ModeState::Landed => ModeState::Landed,
                };
                if !matches!(self.mode, ModeState::Holding { .. }) {
                    self.leg = PatternLeg::Unassigned;
                }
            }
            InstructionType::PatternHold => {
                let Some(resume) = self.mode.resume_point() else {
                    return false;
                };
                self.mode = ModeState::Holding {
                    turned_deg: 0.0,
                    resume,
                };
            }
        }
        self.clearance = ClearanceStatus::Amended;
        self.last_instruction_id = Some(instruction.id);
        true
    }
}

/// Bounds applied when copying instruction values into target fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstructionLimits {
    /// Lowest accepted target speed.
    pub min_speed_kt: f64,
    /// Highest accepted target speed.
    pub max_speed_kt: f64,
    /// Length of a heading vector.
    pub vector_sec: f64,
}

/// Clearance matching a touch-and-go decision.
pub const fn clearance_for(will_touch_and_go: bool) -> ClearanceStatus {
    if will_touch_and_go {
        ClearanceStatus::ClearedTouchAndGo
    } else {
        ClearanceStatus::ClearedToLand
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}
