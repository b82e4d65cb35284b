//! The simulation orchestrator.
//!
//! A [`Simulation`] exclusively owns one world: the fleet, the clock, the
//! RNG, the brain with its cooldown table, the transcript, and the history
//! log. Nothing is shared between instances. [`Simulation::step`] advances
//! the world by one tick as a single unit of work:
//!
//! 1. Advance the clock.
//! 2. Run the motion model for every aircraft.
//! 3. Remove landed and out-of-range aircraft.
//! 4. Spawn an arrival when one is due.
//! 5. Detect conflicts and let the brain respond.
//! 6. Merge injected anomalies that are still live.
//! 7. Record one history row per aircraft.
//! 8. Narrate newly entered conflicts.
//! 9. Build the tick snapshot.
//!
//! The control operations (brain mode, broadcast, reject, queries, and
//! external injections) are plain methods; the owner of the simulation
//! serializes access to them.

use std::collections::HashSet;

use circuit_types::{
    AircraftId, Anomaly, BrainMode, Conflict, ExternalAnomaly, ExternalTranscript, HistoryAnomaly,
    HistoryRow, Instruction, Severity, SimulationId, TickSnapshot, TranscriptRole,
};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::aircraft::{
    Aircraft, CALLSIGNS, InstructionLimits, JoinPoint, MotionEvent, PROFILES,
};
use crate::brain::{Brain, readback};
use crate::clock::{ClockError, SimClock};
use crate::config::{ARRIVAL_INSET_NM, ConfigError, SimulationConfig};
use crate::detector::{ConflictDetector, TrafficSample, conflict_anomaly};
use crate::geometry::{GeoFrame, PatternTrack, Point, clock_position};
use crate::history::{ExportError, HistoryLog};
use crate::motion::{self, MotionParams, random_direction};
use crate::transcript::{
    TRAFFIC_ACK, Transcript, anomaly_alert, parse_role, routine_call, traffic_alert,
};

/// Squawk codes are assigned upward from here.
const SQUAWK_BASE: u32 = 1000;

/// Arrivals spawn at `max(width, height) * 2 + 5` NM from the centre,
/// pulled in to stay inside the active radius.
const ARRIVAL_RADIUS_MARGIN_NM: f64 = 5.0;

/// The fleet ceiling is based on at least this many aircraft.
const MIN_FLEET_BASE: u32 = 3;

/// Errors that can occur when creating or stepping a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The clock could not advance.
    #[error(transparent)]
    Clock(#[from] ClockError),
}

/// Reasons an externally injected record is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectionError {
    /// A required text field is empty.
    #[error("field `{field}` must not be empty")]
    EmptyField {
        /// Name of the empty field.
        field: &'static str,
    },

    /// The severity label is not recognised.
    #[error("unknown severity `{label}`")]
    UnknownSeverity {
        /// The rejected label.
        label: String,
    },

    /// The transcript role is not recognised.
    #[error("unknown transcript role `{label}`")]
    UnknownRole {
        /// The rejected label.
        label: String,
    },
}

/// One independent traffic-pattern simulation.
#[derive(Debug)]
pub struct Simulation {
    id: SimulationId,
    config: SimulationConfig,
    clock: SimClock,
    rng: StdRng,
    track: PatternTrack,
    frame: GeoFrame,
    detector: ConflictDetector,
    brain: Brain,
    fleet: Vec<Aircraft>,
    aircraft_seq: u32,
    next_arrival_sec: Option<f64>,
    max_active: usize,
    conflicts: Vec<Conflict>,
    anomalies: Vec<Anomaly>,
    external: Vec<Anomaly>,
    external_seq: u64,
    narrated: HashSet<String>,
    transcript: Transcript,
    history: HistoryLog,
    suggested_message: String,
}

impl Simulation {
    /// Create a simulation and place the initial aircraft evenly around
    /// the pattern.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Config`] if the configuration is invalid.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let clock = SimClock::new(config.dt_sec)?;
        let mut rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        let direction = config
            .pattern
            .direction
            .unwrap_or_else(|| random_direction(&mut rng));
        let track = PatternTrack::new(config.pattern.width_nm, config.pattern.height_nm, direction);
        let max_active = usize::try_from(
            config
                .initial_aircraft
                .max(MIN_FLEET_BASE)
                .saturating_mul(config.arrivals.max_active_multiplier),
        )
        .unwrap_or(usize::MAX);

        let mut sim = Self {
            id: SimulationId::new(),
            frame: GeoFrame::new(config.pattern.origin_lat, config.pattern.origin_lon),
            detector: ConflictDetector::new(config.brain.thresholds.clone()),
            brain: Brain::new(&config.brain),
            next_arrival_sec: config
                .arrivals
                .enabled
                .then_some(config.arrivals.first_arrival_sec),
            clock,
            rng,
            track,
            fleet: Vec::new(),
            aircraft_seq: 0,
            max_active,
            conflicts: Vec::new(),
            anomalies: Vec::new(),
            external: Vec::new(),
            external_seq: 0,
            narrated: HashSet::new(),
            transcript: Transcript::new(),
            history: HistoryLog::new(),
            suggested_message: String::new(),
            config,
        };

        let n = sim.config.initial_aircraft;
        let perimeter = sim.track.perimeter();
        for i in 0..n {
            let s = perimeter * f64::from(i) / f64::from(n);
            let profile = PROFILES.choose(&mut sim.rng).copied().unwrap_or(PROFILES[0]);
            let callsign = usize::try_from(i)
                .ok()
                .and_then(|i| i.checked_rem(CALLSIGNS.len()))
                .and_then(|i| CALLSIGNS.get(i))
                .copied()
                .unwrap_or(CALLSIGNS[0]);
            let touch_and_go = sim.roll_touch_and_go();
            let (id, squawk) = sim.next_identity();
            let ac = Aircraft::in_pattern(id, callsign, profile, squawk, &sim.track, s, touch_and_go);
            sim.fleet.push(ac);
        }

        info!(
            sim_id = %sim.id,
            direction = ?direction,
            aircraft = sim.fleet.len(),
            seed = ?sim.config.seed,
            "simulation created"
        );
        Ok(sim)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Instance id.
    pub const fn id(&self) -> SimulationId {
        self.id
    }

    /// Ticks completed.
    pub const fn tick(&self) -> u64 {
        self.clock.tick()
    }

    /// Cumulative simulated seconds.
    pub fn sim_time_sec(&self) -> f64 {
        self.clock.sim_time_sec()
    }

    /// The active fleet.
    pub fn fleet(&self) -> &[Aircraft] {
        &self.fleet
    }

    /// The pattern being flown.
    pub const fn track(&self) -> &PatternTrack {
        &self.track
    }

    /// Brain operating mode.
    pub const fn brain_mode(&self) -> BrainMode {
        self.brain.mode()
    }

    /// The full transcript.
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The full history log.
    pub const fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// The configuration in use.
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Fleet management
    // -----------------------------------------------------------------------

    /// Allocate the next aircraft id and squawk code.
    pub fn next_identity(&mut self) -> (AircraftId, u32) {
        self.aircraft_seq = self.aircraft_seq.saturating_add(1);
        (
            AircraftId::from_seq(self.aircraft_seq),
            SQUAWK_BASE.saturating_add(self.aircraft_seq),
        )
    }

    fn roll_touch_and_go(&mut self) -> bool {
        let p = self.config.touch_and_go_probability.clamp(0.0, 1.0);
        self.rng.random_bool(p)
    }

    /// Add an aircraft built by the caller.
    pub fn add_aircraft(&mut self, aircraft: Aircraft) {
        info!(
            sim_id = %self.id,
            aircraft_id = %aircraft.id,
            callsign = %aircraft.callsign,
            mode = ?aircraft.flight_mode(),
            "aircraft added"
        );
        self.fleet.push(aircraft);
    }

    /// Spawn an inbound aircraft at a random point outside the pattern,
    /// heading for a random join point on the perimeter.
    ///
    /// Returns `None` when the fleet is at its ceiling.
    pub fn spawn_arrival(&mut self) -> Option<AircraftId> {
        if self.fleet.len() >= self.max_active {
            debug!(sim_id = %self.id, fleet = self.fleet.len(), "arrival deferred at fleet ceiling");
            return None;
        }
        let profile = PROFILES.choose(&mut self.rng).copied().unwrap_or(PROFILES[0]);
        let callsign = CALLSIGNS.choose(&mut self.rng).copied().unwrap_or(CALLSIGNS[0]);
        let join_s = self.rng.random::<f64>() * self.track.perimeter();
        let join = JoinPoint::on_track(&self.track, join_s);
        let radius = 2.0f64
            .mul_add(
                self.track.width_nm().max(self.track.height_nm()),
                ARRIVAL_RADIUS_MARGIN_NM,
            )
            .min(self.config.active_radius_nm - ARRIVAL_INSET_NM);
        let angle = self.rng.random::<f64>() * std::f64::consts::TAU;
        let start = Point::new(radius * angle.cos(), radius * angle.sin());
        let touch_and_go = self.roll_touch_and_go();
        let (id, squawk) = self.next_identity();
        let ac = Aircraft::inbound(id.clone(), callsign, profile, squawk, start, join, touch_and_go);
        self.add_aircraft(ac);
        Some(id)
    }

    fn schedule_next_arrival(&mut self, now: f64) {
        let arrivals = &self.config.arrivals;
        let jitter = arrivals.jitter_sec * self.rng.random::<f64>();
        self.next_arrival_sec = Some(now + arrivals.base_interval_sec + jitter);
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the world by one tick and return the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter is exhausted.
    pub fn step(&mut self) -> Result<TickSnapshot, ClockError> {
        let tick = self.clock.advance()?;
        let now = self.clock.sim_time_sec();

        self.move_fleet(now);
        self.remove_departed();

        if let Some(due) = self.next_arrival_sec {
            if now >= due {
                self.spawn_arrival();
                self.schedule_next_arrival(now);
            }
        }

        let samples: Vec<TrafficSample> = self
            .fleet
            .iter()
            .filter(|ac| ac.flight_mode().is_airborne())
            .map(TrafficSample::from)
            .collect();
        self.conflicts = self.detector.detect(&samples, now);
        let issued = self.brain.evaluate(&self.conflicts, &self.fleet, now);
        if self.brain.mode().is_auto() {
            for instruction in &issued {
                self.transmit(instruction, now);
            }
        }

        let ttl = self.config.external_anomaly_ttl_sec;
        self.external.retain(|a| now - a.sim_time_sec <= ttl);
        self.anomalies = self
            .conflicts
            .iter()
            .map(|c| conflict_anomaly(c, tick))
            .chain(self.external.iter().cloned())
            .collect();

        self.record_history(now);
        if self.config.narrate_conflicts {
            self.narrate_conflicts(now);
        }
        self.suggested_message = self.suggest();

        debug!(
            sim_id = %self.id,
            tick,
            aircraft = self.fleet.len(),
            conflicts = self.conflicts.len(),
            instructions = issued.len(),
            "tick complete"
        );
        Ok(self.snapshot())
    }

    fn move_fleet(&mut self, now: f64) {
        let dt = self.clock.dt_sec();
        let params = MotionParams {
            track: &self.track,
            motion: &self.config.motion,
            chaos: &self.config.chaos,
            touch_and_go_probability: self.config.touch_and_go_probability,
            dt_sec: dt,
        };
        for ac in &mut self.fleet {
            let delta = motion::step(ac, &params, &mut self.rng);
            for event in ac.apply(delta, dt) {
                match event {
                    MotionEvent::Chaos(kind) => {
                        if let Some(text) = kind.narration() {
                            self.transcript.push(
                                now,
                                TranscriptRole::System,
                                Some(ac.callsign.as_str()),
                                text,
                            );
                        }
                    }
                    MotionEvent::FullStop => {
                        info!(sim_id = %self.id, callsign = %ac.callsign, "full stop landing");
                    }
                    other => {
                        debug!(sim_id = %self.id, callsign = %ac.callsign, event = ?other, "motion event");
                    }
                }
            }
        }
    }

    fn remove_departed(&mut self) {
        let radius = self.config.active_radius_nm;
        let (keep, gone): (Vec<Aircraft>, Vec<Aircraft>) = std::mem::take(&mut self.fleet)
            .into_iter()
            .partition(|ac| !ac.is_landed() && ac.position.norm() <= radius);
        self.fleet = keep;
        for ac in gone {
            info!(
                sim_id = %self.id,
                aircraft_id = %ac.id,
                callsign = %ac.callsign,
                landed = ac.is_landed(),
                "aircraft removed"
            );
            self.brain.forget(&ac.id);
            self.narrated.retain(|pair| !pair_involves(pair, &ac.id));
        }
    }

    fn record_history(&mut self, now: f64) {
        let rows: Vec<HistoryRow> = self
            .fleet
            .iter()
            .map(|ac| {
                let (lat, lon) = self.frame.to_lat_lon(ac.position);
                let anomaly = self
                    .anomalies
                    .iter()
                    .find(|a| a.involves(&ac.id, &ac.callsign))
                    .map(|a| HistoryAnomaly {
                        anomaly_id: a.id.clone(),
                        anomaly_type: a.anomaly_type.clone(),
                        anomaly_severity: a.severity,
                        anomaly_description: a.description.clone(),
                    });
                HistoryRow {
                    sim_id: self.id,
                    sim_time_sec: now,
                    aircraft_id: ac.id.clone(),
                    callsign: ac.callsign.clone(),
                    lat,
                    lon,
                    altitude_ft: ac.altitude_ft,
                    ground_speed_kt: ac.ground_speed_kt,
                    heading_deg: ac.heading_deg,
                    phase: ac.phase(),
                    route_segment: ac.route_segment(),
                    anomaly,
                }
            })
            .collect();
        self.history.extend(rows);
    }

    /// Tower alert plus a probable pilot acknowledgement for every pair
    /// that entered warning or critical separation this tick.
    fn narrate_conflicts(&mut self, now: f64) {
        let current: HashSet<String> = self
            .conflicts
            .iter()
            .filter(|c| c.severity != Severity::Advisory)
            .map(|c| c.id.clone())
            .collect();
        let fresh: Vec<Conflict> = self
            .conflicts
            .iter()
            .filter(|c| current.contains(&c.id) && !self.narrated.contains(&c.id))
            .cloned()
            .collect();
        for conflict in fresh {
            let [own, intruder] = &conflict.callsigns;
            let text = traffic_alert(own, intruder, self.clock_position_of(&conflict));
            self.transcript
                .push(now, TranscriptRole::Tower, Some(own.as_str()), text);
            let p = self.config.pilot_ack_probability.clamp(0.0, 1.0);
            if self.rng.random_bool(p) {
                self.transcript
                    .push(now, TranscriptRole::Pilot, Some(own.as_str()), TRAFFIC_ACK);
            }
        }
        self.narrated = current;
    }

    fn clock_position_of(&self, conflict: &Conflict) -> u8 {
        let [own, _] = &conflict.aircraft_ids;
        let heading = self
            .fleet
            .iter()
            .find(|ac| &ac.id == own)
            .map_or(0.0, |ac| ac.heading_deg);
        clock_position(heading, conflict.bearing_deg)
    }

    fn suggest(&mut self) -> String {
        if let Some(pending) = self.brain.pending() {
            return pending.phraseology.clone();
        }
        if let Some(top) = self.anomalies.iter().min_by_key(|a| a.severity) {
            return match &top.conflict {
                Some(conflict) => {
                    let [own, intruder] = &conflict.callsigns;
                    traffic_alert(own, intruder, self.clock_position_of(conflict))
                }
                None => anomaly_alert(&top.callsigns, &top.description),
            };
        }
        let period = f64::from(u32::try_from(self.config.suggestion_period_sec).unwrap_or(u32::MAX));
        if self.clock.crossed_period(period) {
            if let Some(ac) = self.fleet.choose(&mut self.rng) {
                return routine_call(&ac.callsign);
            }
        }
        String::new()
    }

    /// The snapshot of the current state, as last produced by [`Self::step`].
    pub fn snapshot(&self) -> TickSnapshot {
        TickSnapshot {
            sim_id: self.id,
            tick: self.clock.tick(),
            sim_time_sec: self.clock.sim_time_sec(),
            brain_mode: self.brain.mode(),
            aircraft: self.fleet.iter().map(|ac| ac.view(&self.frame)).collect(),
            anomalies: self.anomalies.clone(),
            transcript: self.transcript.recent(self.config.transcript_window),
            suggested_message: self.suggested_message.clone(),
            pending_instruction: self.brain.pending().cloned(),
        }
    }

    // -----------------------------------------------------------------------
    // Control surface
    // -----------------------------------------------------------------------

    /// Switch the brain between manual and automatic mode.
    pub fn set_brain_mode(&mut self, mode: BrainMode) {
        info!(sim_id = %self.id, ?mode, "brain mode set");
        self.brain.set_mode(mode);
    }

    fn limits(&self) -> InstructionLimits {
        InstructionLimits {
            min_speed_kt: self.config.motion.min_speed_kt,
            max_speed_kt: self.config.motion.max_speed_kt,
            vector_sec: self.config.motion.vector_duration_sec,
        }
    }

    /// Apply an instruction to its aircraft and narrate the exchange.
    fn transmit(&mut self, instruction: &Instruction, now: f64) {
        let limits = self.limits();
        let Some(ac) = self.fleet.iter_mut().find(|ac| ac.id == instruction.aircraft_id) else {
            debug!(sim_id = %self.id, aircraft_id = %instruction.aircraft_id, "instruction target gone");
            return;
        };
        let altitude = ac.altitude_ft;
        if !ac.apply_instruction(instruction, &limits) {
            return;
        }
        let callsign = Some(instruction.callsign.as_str());
        self.transcript.push(
            now,
            TranscriptRole::Tower,
            callsign,
            instruction.phraseology.clone(),
        );
        self.transcript.push(
            now,
            TranscriptRole::Pilot,
            callsign,
            readback(instruction, altitude),
        );
    }

    /// Broadcast the pending instruction. Returns whether there was one.
    pub fn broadcast(&mut self) -> bool {
        let Some(instruction) = self.brain.broadcast_pending() else {
            return false;
        };
        info!(sim_id = %self.id, callsign = %instruction.callsign, kind = ?instruction.instruction_type, "instruction broadcast");
        let now = self.clock.sim_time_sec();
        self.transmit(&instruction, now);
        self.suggested_message.clear();
        true
    }

    /// Reject the pending instruction. Returns whether there was one.
    pub fn reject(&mut self) -> bool {
        let Some(instruction) = self.brain.reject_pending() else {
            return false;
        };
        info!(sim_id = %self.id, callsign = %instruction.callsign, "instruction rejected");
        self.transcript.push(
            self.clock.sim_time_sec(),
            TranscriptRole::System,
            Some(instruction.callsign.as_str()),
            format!("Controller rejected: {}", instruction.phraseology),
        );
        self.suggested_message.clear();
        true
    }

    /// Conflicts detected on the last tick, most severe first.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Up to `limit` instructions, most recent first.
    pub fn instructions(&self, limit: usize) -> Vec<Instruction> {
        self.brain.history(limit)
    }

    /// The history log as CSV.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if the CSV writer fails.
    pub fn export_csv(&self) -> Result<String, ExportError> {
        self.history.to_csv()
    }

    /// Merge an anomaly reported by an external checker.
    ///
    /// Aircraft references are matched against ids and callsigns of the
    /// current fleet; unmatched references are kept as callsigns. The
    /// anomaly stays in snapshots for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionError`] if a required field is empty or the
    /// severity is unknown. Nothing is recorded in that case.
    pub fn inject_anomaly(&mut self, input: ExternalAnomaly) -> Result<Anomaly, InjectionError> {
        let anomaly_type = input.anomaly_type.trim();
        if anomaly_type.is_empty() {
            return Err(InjectionError::EmptyField { field: "type" });
        }
        let description = input.description.trim();
        if description.is_empty() {
            return Err(InjectionError::EmptyField {
                field: "description",
            });
        }
        let severity =
            Severity::parse_external(&input.severity).ok_or_else(|| InjectionError::UnknownSeverity {
                label: input.severity.clone(),
            })?;

        let mut aircraft_ids = Vec::new();
        let mut callsigns = Vec::new();
        for reference in input.aircraft_ids.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
            match self
                .fleet
                .iter()
                .find(|ac| ac.id.as_str() == reference || ac.callsign == reference)
            {
                Some(ac) => {
                    aircraft_ids.push(ac.id.clone());
                    callsigns.push(ac.callsign.clone());
                }
                None => callsigns.push(reference.to_owned()),
            }
        }

        self.external_seq = self.external_seq.saturating_add(1);
        let now = self.clock.sim_time_sec();
        let anomaly = Anomaly {
            id: format!("ext-{}", self.external_seq),
            anomaly_type: anomaly_type.to_owned(),
            severity,
            sim_time_sec: now,
            aircraft_ids,
            callsigns,
            description: description.to_owned(),
            external: true,
            conflict: None,
        };
        self.transcript.push(
            now,
            TranscriptRole::System,
            anomaly.callsigns.first().map(String::as_str),
            format!(
                "External {} ({}): {}",
                anomaly.anomaly_type,
                severity.as_str(),
                anomaly.description
            ),
        );
        info!(sim_id = %self.id, anomaly_id = %anomaly.id, kind = %anomaly.anomaly_type, "external anomaly injected");
        self.external.push(anomaly.clone());
        Ok(anomaly)
    }

    /// Append a transcript line from an external source.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionError`] if the text is empty or the role unknown.
    pub fn inject_transcript(&mut self, input: &ExternalTranscript) -> Result<(), InjectionError> {
        let text = input.text.trim();
        if text.is_empty() {
            return Err(InjectionError::EmptyField { field: "text" });
        }
        let role = parse_role(input.role.as_deref()).ok_or_else(|| {
            warn!(sim_id = %self.id, role = ?input.role, "external transcript role rejected");
            InjectionError::UnknownRole {
                label: input.role.clone().unwrap_or_default(),
            }
        })?;
        let callsign = input
            .callsign
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        self.transcript
            .push(self.clock.sim_time_sec(), role, callsign, text);
        Ok(())
    }
}

fn pair_involves(pair_id: &str, id: &AircraftId) -> bool {
    pair_id
        .strip_prefix("conflict-")
        .is_some_and(|rest| rest.split('-').any(|part| part == id.as_str()))
}
