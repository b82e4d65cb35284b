//! Planar frame, heading arithmetic, and the rectangular pattern track.
//!
//! All simulation geometry happens in a local planar frame measured in
//! nautical miles, centred on the pattern, with `+y` pointing north. A
//! heading of 0 degrees points along `+y` and headings increase clockwise.
//! Latitude and longitude are derived from the planar position only when a
//! public view is built.
//!
//! # Pattern track
//!
//! The pattern is a `width x height` rectangle centred on the origin. The
//! bottom edge is the runway edge. A single scalar `s` (distance flown
//! along the perimeter, measured from the bottom-left corner) determines
//! position, canonical heading, and leg:
//!
//! | `s` range                | Leg       | Clockwise heading |
//! |--------------------------|-----------|-------------------|
//! | `[0, W/2)`               | final     | 90                |
//! | `[W/2, W)`               | upwind    | 90                |
//! | `[W, W+H)`               | crosswind | 0                 |
//! | `[W+H, 2W+H)`            | downwind  | 270               |
//! | `[2W+H, 2W+2H)`          | base      | 180               |
//!
//! Counter-clockwise patterns mirror `x` and heading across the runway
//! centreline, so legs and the runway edge stay where they are.

use circuit_types::{PatternDirection, PatternLeg};

/// Nautical miles per degree of latitude.
pub const NM_PER_DEG_LAT: f64 = 60.0;

/// Seconds per hour, for knot-to-NM-per-second conversion.
pub const SECS_PER_HOUR: f64 = 3600.0;

// ---------------------------------------------------------------------------
// Points and the geographic frame
// ---------------------------------------------------------------------------

/// A position in the planar frame, in nautical miles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// East offset from the pattern centre.
    pub x: f64,
    /// North offset from the pattern centre.
    pub y: f64,
}

impl Point {
    /// Construct a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(self, other: Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Distance from the frame origin.
    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Bearing from this point to another, `[0, 360)`.
    pub fn bearing_to(self, other: Self) -> f64 {
        normalize_heading((other.x - self.x).atan2(other.y - self.y).to_degrees())
    }

    /// Move `distance_nm` along `heading_deg`.
    pub fn advanced(self, heading_deg: f64, distance_nm: f64) -> Self {
        let rad = heading_deg.to_radians();
        Self {
            x: distance_nm.mul_add(rad.sin(), self.x),
            y: distance_nm.mul_add(rad.cos(), self.y),
        }
    }
}

/// Maps the planar frame onto latitude and longitude around an origin.
///
/// Flat-earth approximation: one NM north is 1/60 degree of latitude, one
/// NM east is `1/(60 cos(lat0))` degrees of longitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFrame {
    origin_lat: f64,
    origin_lon: f64,
    nm_per_deg_lon: f64,
}

impl GeoFrame {
    /// Frame anchored at the given origin.
    pub fn new(origin_lat: f64, origin_lon: f64) -> Self {
        Self {
            origin_lat,
            origin_lon,
            nm_per_deg_lon: NM_PER_DEG_LAT * origin_lat.to_radians().cos(),
        }
    }

    /// Latitude and longitude of a planar point.
    pub fn to_lat_lon(&self, p: Point) -> (f64, f64) {
        (
            self.origin_lat + p.y / NM_PER_DEG_LAT,
            self.origin_lon + p.x / self.nm_per_deg_lon,
        )
    }

    /// Planar point of a latitude and longitude.
    pub fn to_point(&self, lat: f64, lon: f64) -> Point {
        Point {
            x: (lon - self.origin_lon) * self.nm_per_deg_lon,
            y: (lat - self.origin_lat) * NM_PER_DEG_LAT,
        }
    }
}

// ---------------------------------------------------------------------------
// Heading arithmetic
// ---------------------------------------------------------------------------

/// Normalize a heading into `[0, 360)`.
pub fn normalize_heading(deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    let h = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if h >= 360.0 { 0.0 } else { h }
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`.
///
/// Positive is a right (clockwise) turn. Exactly opposite headings give
/// `+180`, so the tie resolves to a right turn.
pub fn signed_delta(from: f64, to: f64) -> f64 {
    let d = (to - from).rem_euclid(360.0);
    if d > 180.0 { d - 360.0 } else { d }
}

/// Absolute heading difference, `[0, 180]`.
pub fn heading_diff(a: f64, b: f64) -> f64 {
    signed_delta(a, b).abs()
}

/// Turn from `from` toward `to` by at most `max_step` degrees.
///
/// Takes the shorter direction, right on a tie, and snaps to `to` once the
/// remaining angle fits within one step.
pub fn turn_toward(from: f64, to: f64, max_step: f64) -> f64 {
    let delta = signed_delta(from, to);
    if delta.abs() <= max_step {
        normalize_heading(to)
    } else {
        normalize_heading(max_step.copysign(delta) + from)
    }
}

/// Move `current` toward `target` by at most `max_step`, snapping when close.
pub fn approach(current: f64, target: f64, max_step: f64) -> f64 {
    let delta = target - current;
    if delta.abs() <= max_step {
        target
    } else {
        max_step.copysign(delta) + current
    }
}

/// Velocity vector in knots for a heading and speed.
pub fn velocity(heading_deg: f64, speed_kt: f64) -> (f64, f64) {
    let rad = heading_deg.to_radians();
    (speed_kt * rad.sin(), speed_kt * rad.cos())
}

/// Clock position (1 to 12) of a target at `bearing_deg` seen from an
/// aircraft on `heading_deg`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clock_position(heading_deg: f64, bearing_deg: f64) -> u8 {
    let relative = normalize_heading(bearing_deg - heading_deg);
    let hour = (relative / 30.0).round() as u8;
    if hour == 0 || hour > 12 { 12 } else { hour }
}

// ---------------------------------------------------------------------------
// Pattern track
// ---------------------------------------------------------------------------

/// A point on the pattern perimeter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    /// Planar position.
    pub point: Point,
    /// Canonical heading of the leg.
    pub heading_deg: f64,
    /// Leg containing the point.
    pub leg: PatternLeg,
}

/// The rectangular pattern flown around the runway.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternTrack {
    width_nm: f64,
    height_nm: f64,
    direction: PatternDirection,
}

impl PatternTrack {
    /// A `width x height` pattern flown in the given direction.
    pub const fn new(width_nm: f64, height_nm: f64, direction: PatternDirection) -> Self {
        Self {
            width_nm,
            height_nm,
            direction,
        }
    }

    /// Direction of traffic.
    pub const fn direction(&self) -> PatternDirection {
        self.direction
    }

    /// Runway-parallel edge length.
    pub const fn width_nm(&self) -> f64 {
        self.width_nm
    }

    /// Crosswind and base edge length.
    pub const fn height_nm(&self) -> f64 {
        self.height_nm
    }

    /// Total length of the circuit.
    pub fn perimeter(&self) -> f64 {
        2.0 * (self.width_nm + self.height_nm)
    }

    /// Wrap a track distance into `[0, perimeter)`.
    pub fn wrap(&self, s: f64) -> f64 {
        let p = self.perimeter();
        let w = s.rem_euclid(p);
        if w >= p { 0.0 } else { w }
    }

    /// Leg at track distance `s`.
    pub fn leg_at(&self, s: f64) -> PatternLeg {
        let s = self.wrap(s);
        let (w, h) = (self.width_nm, self.height_nm);
        if s < w / 2.0 {
            PatternLeg::Final
        } else if s < w {
            PatternLeg::Upwind
        } else if s < w + h {
            PatternLeg::Crosswind
        } else if s < 2.0f64.mul_add(w, h) {
            PatternLeg::Downwind
        } else {
            PatternLeg::Base
        }
    }

    /// Canonical heading of a leg in this pattern's direction.
    pub fn leg_heading(&self, leg: PatternLeg) -> f64 {
        let clockwise = match leg {
            PatternLeg::Final | PatternLeg::Upwind | PatternLeg::Unassigned => 90.0,
            PatternLeg::Crosswind => 0.0,
            PatternLeg::Downwind => 270.0,
            PatternLeg::Base => 180.0,
        };
        self.mirror_heading(clockwise)
    }

    /// Position, heading, and leg at track distance `s`.
    pub fn position_at(&self, s: f64) -> TrackPoint {
        let s = self.wrap(s);
        let (w, h) = (self.width_nm, self.height_nm);
        let (hw, hh) = (w / 2.0, h / 2.0);
        let point = if s < w {
            Point::new(s - hw, -hh)
        } else if s < w + h {
            Point::new(hw, s - w - hh)
        } else if s < 2.0f64.mul_add(w, h) {
            Point::new(hw - (s - w - h), hh)
        } else {
            Point::new(-hw, hh - (s - 2.0f64.mul_add(w, h)))
        };
        let leg = self.leg_at(s);
        TrackPoint {
            point: self.mirror_point(point),
            heading_deg: self.leg_heading(leg),
            leg,
        }
    }

    /// Track distance of the perimeter point closest to `p`.
    pub fn nearest_track_pos(&self, p: Point) -> f64 {
        let p = self.mirror_point(p);
        let (w, h) = (self.width_nm, self.height_nm);
        let (hw, hh) = (w / 2.0, h / 2.0);
        // (distance from p, track position) for the projection on each edge.
        let bottom_x = p.x.clamp(-hw, hw);
        let right_y = p.y.clamp(-hh, hh);
        let top_x = p.x.clamp(-hw, hw);
        let left_y = p.y.clamp(-hh, hh);
        let candidates = [
            (p.distance_to(Point::new(bottom_x, -hh)), bottom_x + hw),
            (p.distance_to(Point::new(hw, right_y)), w + right_y + hh),
            (p.distance_to(Point::new(top_x, hh)), w + h + (hw - top_x)),
            (
                p.distance_to(Point::new(-hw, left_y)),
                2.0f64.mul_add(w, h) + (hh - left_y),
            ),
        ];
        let best = candidates
            .iter()
            .copied()
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map_or(0.0, |(_, s)| s);
        self.wrap(best)
    }

    /// Whether the leg is the runway leg that triggers the runway event.
    pub const fn is_runway_leg(leg: PatternLeg) -> bool {
        matches!(leg, PatternLeg::Upwind)
    }

    fn mirror_point(&self, p: Point) -> Point {
        match self.direction {
            PatternDirection::Clockwise => p,
            PatternDirection::CounterClockwise => Point::new(-p.x, p.y),
        }
    }

    fn mirror_heading(&self, heading: f64) -> f64 {
        match self.direction {
            PatternDirection::Clockwise => heading,
            PatternDirection::CounterClockwise => normalize_heading(360.0 - heading),
        }
    }
}
