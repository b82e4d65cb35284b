//! Per-aircraft motion model.
//!
//! [`step`] computes the proposed next state of one aircraft for one tick
//! of `dt` simulated seconds. Heading, altitude, and speed converge toward
//! their targets at bounded rates; position depends on the flight mode:
//!
//! - **Pattern** -- track distance advances by `speed * dt` and position,
//!   leg, and canonical heading come from the [`PatternTrack`].
//! - **Transit** -- straight line toward the join point; switches to
//!   pattern once the join point is within one step.
//! - **Vectored** -- heading-based motion toward the assigned heading;
//!   when the vector expires the aircraft transits to the nearest point of
//!   the perimeter.
//! - **Holding** -- standard-rate right turn until 360 degrees are flown,
//!   then the prior mode resumes.
//! - **Landed** -- nothing moves.
//!
//! Entering the runway leg fires the runway event once per pass. Optional
//! chaos perturbs the proposed state afterwards.

use circuit_types::{PatternDirection, PatternLeg};
use rand::Rng;

use crate::aircraft::{
    Aircraft, ChaosKind, JoinPoint, ModeState, MotionDelta, MotionEvent, Resume, clearance_for,
};
use crate::config::{ChaosConfig, MotionConfig};
use crate::geometry::{PatternTrack, SECS_PER_HOUR, approach, normalize_heading, turn_toward};

/// Altitudes a deliberate altitude deviation snaps to.
const DEVIATION_ALTITUDES_FT: [f64; 2] = [800.0, 3500.0];

/// Size of a random altitude bump.
const ALTITUDE_BUMP_FT: f64 = 500.0;

/// Size of a deliberate heading deviation.
const HEADING_DEVIATION_DEG: f64 = 90.0;

/// Everything the motion model reads besides the aircraft itself.
#[derive(Debug, Clone, Copy)]
pub struct MotionParams<'a> {
    /// The pattern being flown.
    pub track: &'a PatternTrack,
    /// Performance limits.
    pub motion: &'a MotionConfig,
    /// Perturbation settings.
    pub chaos: &'a ChaosConfig,
    /// Probability that the next runway pass is another touch-and-go.
    pub touch_and_go_probability: f64,
    /// Simulated seconds per tick.
    pub dt_sec: f64,
}

/// Propose the next state of `ac`.
pub fn step<R: Rng + ?Sized>(ac: &Aircraft, params: &MotionParams<'_>, rng: &mut R) -> MotionDelta {
    let dt = params.dt_sec;
    let motion = params.motion;
    let mut delta = MotionDelta {
        position: ac.position,
        heading_deg: ac.heading_deg,
        altitude_ft: approach(
            ac.altitude_ft,
            ac.target_altitude_ft,
            motion.climb_rate_fpm / 60.0 * dt,
        ),
        ground_speed_kt: approach(
            ac.ground_speed_kt,
            ac.target_speed_kt,
            motion.acceleration_kt_per_sec * dt,
        ),
        mode: ac.mode,
        leg: ac.leg,
        target_heading_deg: None,
        runway_latched: ac.runway_latched,
        will_touch_and_go: ac.will_touch_and_go,
        clearance: None,
        events: Vec::new(),
    };

    let distance = ac.ground_speed_kt * dt / SECS_PER_HOUR;
    let turn = motion.turn_rate_deg_per_sec * dt;

    match ac.mode {
        ModeState::Pattern { track_pos_nm } => {
            fly_pattern(ac, track_pos_nm, distance, turn, params, &mut delta);
            runway_event(params, rng, &mut delta);
        }
        ModeState::Transit { join } => fly_transit(ac, join, distance, turn, params, &mut delta),
        ModeState::Vectored { remaining_sec } => {
            fly_vector(ac, remaining_sec, distance, turn, params, &mut delta);
        }
        ModeState::Holding { turned_deg, resume } => {
            fly_hold(ac, turned_deg, resume, distance, turn, params, &mut delta);
        }
        ModeState::Landed => {
            delta.ground_speed_kt = 0.0;
            delta.altitude_ft = ac.altitude_ft;
            return delta;
        }
    }

    if params.chaos.enabled && !matches!(delta.mode, ModeState::Landed) {
        perturb(params, rng, &mut delta);
    }
    delta
}

fn fly_pattern(
    ac: &Aircraft,
    track_pos_nm: f64,
    distance: f64,
    turn: f64,
    params: &MotionParams<'_>,
    delta: &mut MotionDelta,
) {
    let track = params.track;
    let s = track.wrap(track_pos_nm + distance);
    let tp = track.position_at(s);
    delta.position = tp.point;
    delta.heading_deg = turn_toward(ac.heading_deg, tp.heading_deg, turn);
    delta.target_heading_deg = Some(tp.heading_deg);
    delta.mode = ModeState::Pattern { track_pos_nm: s };
    delta.leg = tp.leg;
}

/// Edge-triggered runway event: fires on the first tick of a pass spent on
/// the runway leg and re-arms once the aircraft leaves it.
fn runway_event<R: Rng + ?Sized>(params: &MotionParams<'_>, rng: &mut R, delta: &mut MotionDelta) {
    if !PatternTrack::is_runway_leg(delta.leg) {
        delta.runway_latched = false;
        return;
    }
    if delta.runway_latched {
        return;
    }
    delta.runway_latched = true;
    if delta.will_touch_and_go {
        let again = rng.random_bool(params.touch_and_go_probability.clamp(0.0, 1.0));
        delta.will_touch_and_go = again;
        delta.clearance = Some(clearance_for(again));
        delta.events.push(MotionEvent::TouchAndGo);
    } else {
        delta.mode = ModeState::Landed;
        delta.ground_speed_kt = 0.0;
        delta.leg = PatternLeg::Unassigned;
        delta.events.push(MotionEvent::FullStop);
    }
}

fn fly_transit(
    ac: &Aircraft,
    join: JoinPoint,
    distance: f64,
    turn: f64,
    params: &MotionParams<'_>,
    delta: &mut MotionDelta,
) {
    let remaining = ac.position.distance_to(join.point);
    if remaining <= distance {
        let leg_heading = params.track.leg_heading(join.leg);
        delta.position = join.point;
        delta.heading_deg = turn_toward(ac.heading_deg, leg_heading, turn);
        delta.target_heading_deg = Some(leg_heading);
        delta.mode = ModeState::Pattern {
            track_pos_nm: join.track_pos_nm,
        };
        delta.leg = join.leg;
        // Joining on the runway leg is not a runway pass.
        delta.runway_latched = PatternTrack::is_runway_leg(join.leg);
        delta.clearance = Some(clearance_for(ac.will_touch_and_go));
        delta.events.push(MotionEvent::JoinedPattern { leg: join.leg });
    } else {
        let bearing = ac.position.bearing_to(join.point);
        delta.position = ac.position.advanced(bearing, distance);
        delta.heading_deg = bearing;
        delta.target_heading_deg = Some(bearing);
        delta.leg = PatternLeg::Unassigned;
    }
}

fn fly_vector(
    ac: &Aircraft,
    remaining_sec: f64,
    distance: f64,
    turn: f64,
    params: &MotionParams<'_>,
    delta: &mut MotionDelta,
) {
    let heading = turn_toward(ac.heading_deg, ac.target_heading_deg, turn);
    delta.heading_deg = heading;
    delta.position = ac.position.advanced(heading, distance);
    delta.leg = PatternLeg::Unassigned;
    let left = remaining_sec - params.dt_sec;
    if left > 0.0 {
        delta.mode = ModeState::Vectored { remaining_sec: left };
    } else {
        let s = params.track.nearest_track_pos(delta.position);
        delta.mode = ModeState::Transit {
            join: JoinPoint::on_track(params.track, s),
        };
        delta.events.push(MotionEvent::VectorComplete);
    }
}

fn fly_hold(
    ac: &Aircraft,
    turned_deg: f64,
    resume: Resume,
    distance: f64,
    turn: f64,
    params: &MotionParams<'_>,
    delta: &mut MotionDelta,
) {
    let heading = normalize_heading(ac.heading_deg + turn);
    delta.heading_deg = heading;
    delta.position = ac.position.advanced(heading, distance);
    let turned = turned_deg + turn;
    if turned + 1e-9 >= 360.0 {
        delta.mode = resume.into_mode();
        if let Resume::Pattern { track_pos_nm } = resume {
            delta.leg = params.track.leg_at(track_pos_nm);
        }
        delta.events.push(MotionEvent::HoldComplete);
    } else {
        delta.mode = ModeState::Holding {
            turned_deg: turned,
            resume,
        };
    }
}

/// Random heading jitter, occasional altitude bumps, and deliberate
/// deviations scaled by the chaos level.
fn perturb<R: Rng + ?Sized>(params: &MotionParams<'_>, rng: &mut R, delta: &mut MotionDelta) {
    let chaos = params.chaos;
    let randomness = chaos.randomness.max(0.0);
    if randomness > 0.0 {
        let jitter = (rng.random::<f64>() - 0.5) * 0.5 * randomness;
        delta.heading_deg = normalize_heading(delta.heading_deg + jitter);

        if rng.random_bool((0.01 * randomness).clamp(0.0, 1.0)) {
            let bump = if rng.random_bool(0.5) {
                ALTITUDE_BUMP_FT
            } else {
                -ALTITUDE_BUMP_FT
            };
            delta.altitude_ft = (delta.altitude_ft + bump).max(0.0);
            delta
                .events
                .push(MotionEvent::Chaos(ChaosKind::AltitudeBump { delta_ft: bump }));
        }
    }

    let level = chaos.chaos_level.max(0.0);
    if level > 0.0 && rng.random_bool((0.005 * level).clamp(0.0, 1.0)) {
        let kind = match rng.random_range(0..3_u8) {
            0 => {
                let altitude_ft = if rng.random_bool(0.5) {
                    DEVIATION_ALTITUDES_FT[0]
                } else {
                    DEVIATION_ALTITUDES_FT[1]
                };
                delta.altitude_ft = altitude_ft;
                ChaosKind::AltitudeDeviation { altitude_ft }
            }
            1 => {
                let turn_deg = if rng.random_bool(0.5) {
                    -HEADING_DEVIATION_DEG
                } else {
                    HEADING_DEVIATION_DEG
                };
                delta.heading_deg = normalize_heading(delta.heading_deg + turn_deg);
                ChaosKind::HeadingDeviation { turn_deg }
            }
            _ => {
                let speed_kt = params.motion.min_speed_kt;
                delta.ground_speed_kt = speed_kt;
                ChaosKind::SpeedDrop { speed_kt }
            }
        };
        delta.events.push(MotionEvent::Chaos(kind));
    }
}

/// Pick a pattern direction at random.
pub fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> PatternDirection {
    if rng.random_bool(0.5) {
        PatternDirection::Clockwise
    } else {
        PatternDirection::CounterClockwise
    }
}
