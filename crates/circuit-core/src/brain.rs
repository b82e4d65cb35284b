//! Conflict resolution: turns detected conflicts into ATC instructions.
//!
//! Each tick the brain looks at the first few non-advisory conflicts (the
//! detector's ordering puts the most urgent first) and issues at most one
//! instruction per conflict. A per-aircraft cooldown stops the same
//! aircraft from being instructed again within a few simulated seconds;
//! a conflict is skipped when both aircraft are cooling down, and when only
//! one is, that one is the target.
//!
//! Strategies, first match wins:
//!
//! 1. Overtaking with the faster aircraft eligible: slow it by 20 kt.
//! 2. Head-on or converging: turn right 30 degrees (warning) or 45
//!    (critical).
//! 3. Close horizontally with a 200-800 ft vertical gap: move 1000 ft away
//!    from the other aircraft.
//! 4. Otherwise slow down by 15 kt.
//!
//! Speed targets never go below the configured floor. When a slow-down
//! would not change anything and the aircraft is on the circuit it is given
//! a right 360 instead.
//!
//! In manual mode the brain suggests one instruction at a time: it stays
//! pending until broadcast or rejected, and no new suggestion is made while
//! it is outstanding. If its target leaves the simulation first it is
//! marked rejected. In automatic mode instructions are issued already
//! broadcast and the caller applies them at once.

use std::collections::HashMap;

use circuit_types::{
    AircraftId, BrainMode, Conflict, FlightMode, Geometry, Instruction, InstructionId,
    InstructionStatus, InstructionType, Severity,
};
use tracing::debug;

use crate::aircraft::Aircraft;
use crate::config::BrainConfig;
use crate::geometry::normalize_heading;

/// Speed reduction for the faster aircraft of an overtaking pair.
const OVERTAKE_SLOWDOWN_KT: f64 = 20.0;

/// Speed reduction of the fallback strategy.
const FALLBACK_SLOWDOWN_KT: f64 = 15.0;

/// Right turn for a warning-level crossing conflict.
const WARNING_TURN_DEG: f64 = 30.0;

/// Right turn for a critical crossing conflict.
const CRITICAL_TURN_DEG: f64 = 45.0;

/// Horizontal separation below which a vertical fix is considered.
const VERTICAL_FIX_MAX_HORIZONTAL_NM: f64 = 1.5;

/// Vertical gap range in which a vertical fix is considered.
const VERTICAL_FIX_GAP_FT: (f64, f64) = (200.0, 800.0);

/// Altitude change of a vertical fix.
const VERTICAL_FIX_FT: f64 = 1000.0;

/// Lowest altitude a vertical fix will descend to.
const VERTICAL_FIX_FLOOR_FT: f64 = 500.0;

/// Orbit size of a pattern hold.
const HOLD_DEG: f64 = 360.0;

/// The resolution engine of one simulation.
#[derive(Debug, Clone)]
pub struct Brain {
    mode: BrainMode,
    cooldown_sec: f64,
    max_conflicts_per_tick: usize,
    speed_floor_kt: f64,
    last_instruction_at: HashMap<AircraftId, f64>,
    history: Vec<Instruction>,
    pending: Option<InstructionId>,
}

impl Brain {
    /// A brain configured from `config`.
    pub fn new(config: &BrainConfig) -> Self {
        Self {
            mode: BrainMode::from_auto(config.auto_mode),
            cooldown_sec: config.cooldown_sec,
            max_conflicts_per_tick: config.max_conflicts_per_tick,
            speed_floor_kt: config.speed_floor_kt,
            last_instruction_at: HashMap::new(),
            history: Vec::new(),
            pending: None,
        }
    }

    /// Current operating mode.
    pub const fn mode(&self) -> BrainMode {
        self.mode
    }

    /// Switch operating mode. Pending instructions stay pending.
    pub fn set_mode(&mut self, mode: BrainMode) {
        if self.mode != mode {
            debug!(?mode, "brain mode changed");
        }
        self.mode = mode;
    }

    /// Whether `id` may receive an instruction at `sim_time_sec`.
    pub fn is_eligible(&self, id: &AircraftId, sim_time_sec: f64) -> bool {
        self.last_instruction_at
            .get(id)
            .is_none_or(|last| sim_time_sec - last >= self.cooldown_sec)
    }

    /// Generate instructions for this tick's conflicts.
    ///
    /// The new instructions are recorded in the history and returned. In
    /// automatic mode they are already marked broadcast and the caller must
    /// apply them to the fleet. In manual mode at most one instruction is
    /// returned, and none while an earlier one is still pending.
    pub fn evaluate(
        &mut self,
        conflicts: &[Conflict],
        fleet: &[Aircraft],
        sim_time_sec: f64,
    ) -> Vec<Instruction> {
        let manual = !self.mode.is_auto();
        let mut issued = Vec::new();
        if manual && self.pending.is_some() {
            return issued;
        }
        let candidates = conflicts
            .iter()
            .filter(|c| c.severity != Severity::Advisory)
            .take(self.max_conflicts_per_tick);
        for conflict in candidates {
            let [id_a, id_b] = &conflict.aircraft_ids;
            let (Some(a), Some(b)) = (find(fleet, id_a), find(fleet, id_b)) else {
                continue;
            };
            let eligible_a = self.is_eligible(id_a, sim_time_sec);
            let eligible_b = self.is_eligible(id_b, sim_time_sec);
            if !eligible_a && !eligible_b {
                continue;
            }
            let instruction = self.resolve(conflict, a, b, eligible_a, sim_time_sec);
            self.last_instruction_at
                .insert(instruction.aircraft_id.clone(), sim_time_sec);
            debug!(
                callsign = %instruction.callsign,
                kind = ?instruction.instruction_type,
                value = instruction.value,
                conflict = %conflict.id,
                "instruction generated"
            );
            issued.push(instruction);
            if manual {
                break;
            }
        }

        if manual {
            self.pending = issued.first().map(|i| i.id);
        }
        self.history.extend(issued.iter().cloned());
        issued
    }

    fn resolve(
        &self,
        conflict: &Conflict,
        a: &Aircraft,
        b: &Aircraft,
        eligible_a: bool,
        sim_time_sec: f64,
    ) -> Instruction {
        let (target, other) = if eligible_a { (a, b) } else { (b, a) };

        if conflict.geometry == Geometry::Overtaking {
            let (faster, slower) = if conflict.faster_aircraft_id == a.id {
                (a, b)
            } else {
                (b, a)
            };
            if self.is_eligible(&faster.id, sim_time_sec) {
                return self.slow_down(
                    conflict,
                    faster,
                    OVERTAKE_SLOWDOWN_KT,
                    format!("Overtaking {}", slower.callsign),
                    sim_time_sec,
                );
            }
        }

        if matches!(conflict.geometry, Geometry::HeadOn | Geometry::Converging) {
            let turn = if conflict.severity == Severity::Critical {
                CRITICAL_TURN_DEG
            } else {
                WARNING_TURN_DEG
            };
            let heading = normalize_heading(target.heading_deg + turn).round() % 360.0;
            return self.build(
                conflict,
                target,
                InstructionType::HeadingChange,
                heading,
                format!("Traffic conflict with {}", other.callsign),
                sim_time_sec,
            );
        }

        let gap = conflict.vertical_sep_ft;
        if conflict.horizontal_sep_nm < VERTICAL_FIX_MAX_HORIZONTAL_NM
            && gap > VERTICAL_FIX_GAP_FT.0
            && gap < VERTICAL_FIX_GAP_FT.1
        {
            let altitude = if target.altitude_ft > other.altitude_ft {
                target.altitude_ft + VERTICAL_FIX_FT
            } else {
                (target.altitude_ft - VERTICAL_FIX_FT).max(VERTICAL_FIX_FLOOR_FT)
            };
            return self.build(
                conflict,
                target,
                InstructionType::AltitudeChange,
                (altitude / 100.0).round() * 100.0,
                format!("Vertical separation from {}", other.callsign),
                sim_time_sec,
            );
        }

        self.slow_down(
            conflict,
            target,
            FALLBACK_SLOWDOWN_KT,
            format!("Maintain separation from {}", other.callsign),
            sim_time_sec,
        )
    }

    fn slow_down(
        &self,
        conflict: &Conflict,
        target: &Aircraft,
        by_kt: f64,
        reason: String,
        sim_time_sec: f64,
    ) -> Instruction {
        let speed = (target.ground_speed_kt - by_kt).max(self.speed_floor_kt).round();
        let no_change = speed >= target.target_speed_kt;
        if no_change && target.flight_mode() == FlightMode::Pattern {
            return self.build(
                conflict,
                target,
                InstructionType::PatternHold,
                HOLD_DEG,
                reason,
                sim_time_sec,
            );
        }
        self.build(
            conflict,
            target,
            InstructionType::SpeedChange,
            speed,
            reason,
            sim_time_sec,
        )
    }

    fn build(
        &self,
        conflict: &Conflict,
        target: &Aircraft,
        instruction_type: InstructionType,
        value: f64,
        reason: String,
        sim_time_sec: f64,
    ) -> Instruction {
        let status = if self.mode.is_auto() {
            InstructionStatus::Broadcasted
        } else {
            InstructionStatus::Pending
        };
        Instruction {
            id: InstructionId::new(),
            aircraft_id: target.id.clone(),
            callsign: target.callsign.clone(),
            instruction_type,
            value,
            phraseology: phraseology(
                &target.callsign,
                instruction_type,
                value,
                target.altitude_ft,
                &reason,
            ),
            reason,
            severity: conflict.severity,
            conflict_id: conflict.id.clone(),
            created_at_sec: sim_time_sec,
            status,
        }
    }

    /// The instruction awaiting a controller decision, if any.
    pub fn pending(&self) -> Option<&Instruction> {
        let id = self.pending?;
        self.history
            .iter()
            .rev()
            .find(|i| i.id == id && i.status == InstructionStatus::Pending)
    }

    /// Mark the pending instruction broadcast and return it.
    ///
    /// `None` when nothing is pending. The caller applies the returned
    /// instruction to the fleet.
    pub fn broadcast_pending(&mut self) -> Option<Instruction> {
        self.resolve_pending(InstructionStatus::Broadcasted)
    }

    /// Mark the pending instruction rejected and return it.
    pub fn reject_pending(&mut self) -> Option<Instruction> {
        self.resolve_pending(InstructionStatus::Rejected)
    }

    fn resolve_pending(&mut self, status: InstructionStatus) -> Option<Instruction> {
        let id = self.pending.take()?;
        let entry = self
            .history
            .iter_mut()
            .rev()
            .find(|i| i.id == id && i.status == InstructionStatus::Pending)?;
        entry.status = status;
        Some(entry.clone())
    }

    /// Up to `limit` instructions, most recent first.
    pub fn history(&self, limit: usize) -> Vec<Instruction> {
        self.history.iter().rev().take(limit).cloned().collect()
    }

    /// Total instructions issued.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Drop the cooldown entry of an aircraft that left the simulation and
    /// close out a suggestion addressed to it.
    pub fn forget(&mut self, id: &AircraftId) {
        self.last_instruction_at.remove(id);
        if self.pending().is_some_and(|i| &i.aircraft_id == id) {
            if let Some(dropped) = self.resolve_pending(InstructionStatus::Rejected) {
                debug!(callsign = %dropped.callsign, "pending instruction dropped, aircraft gone");
            }
        }
    }
}

fn find<'a>(fleet: &'a [Aircraft], id: &AircraftId) -> Option<&'a Aircraft> {
    fleet.iter().find(|ac| &ac.id == id)
}

/// Radio phraseology for an instruction.
pub fn phraseology(
    callsign: &str,
    instruction_type: InstructionType,
    value: f64,
    current_altitude_ft: f64,
    reason: &str,
) -> String {
    match instruction_type {
        InstructionType::SpeedChange => {
            format!("{callsign}, reduce speed to {value:.0} knots. {reason}.")
        }
        InstructionType::HeadingChange => {
            format!("{callsign}, turn right heading {value:03.0}. {reason}.")
        }
        InstructionType::AltitudeChange => {
            let verb = if value > current_altitude_ft {
                "climb"
            } else {
                "descend"
            };
            format!("{callsign}, {verb} and maintain {value:.0} feet. {reason}.")
        }
        InstructionType::PatternHold => {
            format!("{callsign}, make right 360 for spacing. {reason}.")
        }
    }
}

/// Pilot readback of a broadcast instruction.
pub fn readback(instruction: &Instruction, current_altitude_ft: f64) -> String {
    let cs = &instruction.callsign;
    let value = instruction.value;
    match instruction.instruction_type {
        InstructionType::SpeedChange => format!("Reducing to {value:.0} knots, {cs}."),
        InstructionType::HeadingChange => format!("Right heading {value:03.0}, {cs}."),
        InstructionType::AltitudeChange => {
            let verb = if value > current_altitude_ft {
                "Climbing"
            } else {
                "Descending"
            };
            format!("{verb} to {value:.0} feet, {cs}.")
        }
        InstructionType::PatternHold => format!("Right 360, {cs}."),
    }
}
