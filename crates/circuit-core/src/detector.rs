//! Pairwise separation checks.
//!
//! Every unordered pair of airborne aircraft is measured each tick:
//! horizontal separation in the planar frame, vertical separation from
//! altitudes, and a closing rate from the two velocity vectors. Severity
//! bands are nested, so a critical pair also satisfies the warning and
//! advisory bounds. Advisories are only raised while the pair is closing.
//!
//! The output is sorted most severe first, then by ascending horizontal
//! separation. Consumers act on the front of the list.

use circuit_types::{AircraftId, Anomaly, Conflict, Geometry, LOSS_OF_SEPARATION, Severity};

use crate::aircraft::Aircraft;
use crate::config::SeparationThresholds;
use crate::geometry::{Point, heading_diff, velocity};

/// Below this horizontal distance the closing rate is reported as zero.
const MIN_CLOSING_DISTANCE_NM: f64 = 0.01;

/// Same-direction traffic whose speeds differ by more than this counts as
/// overtaking. Only absorbs floating-point noise.
const OVERTAKE_SPEED_EPSILON_KT: f64 = 1e-6;

/// Heading difference below which traffic is same-direction or overtaking.
const SAME_DIRECTION_DEG: f64 = 30.0;

/// Heading difference above which traffic is head-on.
const HEAD_ON_DEG: f64 = 150.0;

/// The slice of aircraft state the detector reads.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficSample {
    /// Aircraft id.
    pub id: AircraftId,
    /// Callsign.
    pub callsign: String,
    /// Planar position.
    pub position: Point,
    /// Altitude in feet.
    pub altitude_ft: f64,
    /// Heading in degrees.
    pub heading_deg: f64,
    /// Ground speed in knots.
    pub ground_speed_kt: f64,
}

impl From<&Aircraft> for TrafficSample {
    fn from(ac: &Aircraft) -> Self {
        Self {
            id: ac.id.clone(),
            callsign: ac.callsign.clone(),
            position: ac.position,
            altitude_ft: ac.altitude_ft,
            heading_deg: ac.heading_deg,
            ground_speed_kt: ac.ground_speed_kt,
        }
    }
}

/// Rate of change of horizontal distance between `a` and `b`, in knots.
///
/// Negative while the pair is closing. Zero when the aircraft are
/// co-located, where the direction is undefined.
pub fn closing_rate_kt(a: &TrafficSample, b: &TrafficSample) -> f64 {
    let dx = b.position.x - a.position.x;
    let dy = b.position.y - a.position.y;
    let dist = dx.hypot(dy);
    if dist < MIN_CLOSING_DISTANCE_NM {
        return 0.0;
    }
    let (avx, avy) = velocity(a.heading_deg, a.ground_speed_kt);
    let (bvx, bvy) = velocity(b.heading_deg, b.ground_speed_kt);
    dx.mul_add(bvx - avx, dy * (bvy - avy)) / dist
}

/// Classify closing geometry from the heading difference and speeds.
pub fn classify_geometry(heading_diff_deg: f64, speed_a_kt: f64, speed_b_kt: f64) -> Geometry {
    if heading_diff_deg < SAME_DIRECTION_DEG {
        if (speed_a_kt - speed_b_kt).abs() > OVERTAKE_SPEED_EPSILON_KT {
            Geometry::Overtaking
        } else {
            Geometry::SameDirection
        }
    } else if heading_diff_deg > HEAD_ON_DEG {
        Geometry::HeadOn
    } else {
        Geometry::Converging
    }
}

/// Separation checker configured with severity bands.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictDetector {
    thresholds: SeparationThresholds,
}

impl ConflictDetector {
    /// Detector using the given bands.
    pub const fn new(thresholds: SeparationThresholds) -> Self {
        Self { thresholds }
    }

    /// Severity of a pair, if any band applies.
    pub fn classify_severity(
        &self,
        horizontal_nm: f64,
        vertical_ft: f64,
        closing_rate_kt: f64,
    ) -> Option<Severity> {
        let t = &self.thresholds;
        if horizontal_nm < t.critical.horizontal_nm && vertical_ft < t.critical.vertical_ft {
            Some(Severity::Critical)
        } else if horizontal_nm < t.warning.horizontal_nm && vertical_ft < t.warning.vertical_ft {
            Some(Severity::Warning)
        } else if horizontal_nm < t.advisory.horizontal_nm
            && vertical_ft < t.advisory.vertical_ft
            && closing_rate_kt < 0.0
        {
            Some(Severity::Advisory)
        } else {
            None
        }
    }

    /// Measure one pair. `None` if the pair is adequately separated.
    pub fn check_pair(
        &self,
        a: &TrafficSample,
        b: &TrafficSample,
        sim_time_sec: f64,
    ) -> Option<Conflict> {
        let horizontal = a.position.distance_to(b.position);
        let vertical = (a.altitude_ft - b.altitude_ft).abs();
        let closing = closing_rate_kt(a, b);
        let severity = self.classify_severity(horizontal, vertical, closing)?;
        let diff = heading_diff(a.heading_deg, b.heading_deg);
        let faster = if b.ground_speed_kt > a.ground_speed_kt {
            &b.id
        } else {
            &a.id
        };
        Some(Conflict {
            id: format!("conflict-{}-{}", a.id, b.id),
            aircraft_ids: [a.id.clone(), b.id.clone()],
            callsigns: [a.callsign.clone(), b.callsign.clone()],
            horizontal_sep_nm: horizontal,
            vertical_sep_ft: vertical,
            closing_rate_kt: closing,
            severity,
            geometry: classify_geometry(diff, a.ground_speed_kt, b.ground_speed_kt),
            heading_diff_deg: diff,
            bearing_deg: a.position.bearing_to(b.position),
            faster_aircraft_id: faster.clone(),
            detected_at_sec: sim_time_sec,
        })
    }

    /// All conflicts among `traffic`, most severe and closest first.
    pub fn detect(&self, traffic: &[TrafficSample], sim_time_sec: f64) -> Vec<Conflict> {
        let mut conflicts: Vec<Conflict> = traffic
            .iter()
            .enumerate()
            .flat_map(|(i, a)| {
                traffic
                    .iter()
                    .skip(i.saturating_add(1))
                    .filter_map(move |b| self.check_pair(a, b, sim_time_sec))
            })
            .collect();
        conflicts.sort_by(|x, y| {
            x.severity
                .cmp(&y.severity)
                .then_with(|| x.horizontal_sep_nm.total_cmp(&y.horizontal_sep_nm))
        });
        conflicts
    }
}

/// Wrap a conflict as an entry of the anomaly stream.
pub fn conflict_anomaly(conflict: &Conflict, tick: u64) -> Anomaly {
    let [a, b] = &conflict.callsigns;
    Anomaly {
        id: format!("anom-{tick}-{}", conflict.id.trim_start_matches("conflict-")),
        anomaly_type: LOSS_OF_SEPARATION.to_owned(),
        severity: conflict.severity,
        sim_time_sec: conflict.detected_at_sec,
        aircraft_ids: conflict.aircraft_ids.to_vec(),
        callsigns: conflict.callsigns.to_vec(),
        description: format!(
            "Loss of separation between {a} and {b} ({:.1} NM / {:.0} ft)",
            conflict.horizontal_sep_nm, conflict.vertical_sep_ft
        ),
        external: false,
        conflict: Some(conflict.clone()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample(seq: u32, x: f64, y: f64, alt: f64, heading: f64, speed: f64) -> TrafficSample {
        TrafficSample {
            id: AircraftId::from_seq(seq),
            callsign: format!("N{seq}"),
            position: Point::new(x, y),
            altitude_ft: alt,
            heading_deg: heading,
            ground_speed_kt: speed,
        }
    }

    fn detector() -> ConflictDetector {
        ConflictDetector::new(SeparationThresholds::default())
    }

    #[test]
    fn head_on_pair_half_a_mile_apart_is_critical() {
        let a = sample(1, 0.0, 0.0, 1500.0, 90.0, 100.0);
        let b = sample(2, 0.5, 0.0, 1500.0, 270.0, 100.0);
        let conflicts = detector().detect(&[a, b], 1.0);
        assert_eq!(conflicts.len(), 1);
        let c = &conflicts[0];
        assert_eq!(c.severity, Severity::Critical);
        assert_eq!(c.geometry, Geometry::HeadOn);
        assert_eq!(c.callsigns, [String::from("N1"), String::from("N2")]);
        assert_eq!(c.id, "conflict-ac1-ac2");
        assert!((c.closing_rate_kt + 200.0).abs() < 1e-9);
        assert!((c.bearing_deg - 90.0).abs() < 1e-9);
    }

    #[test]
    fn closing_rate_sign() {
        let a = sample(1, 0.0, 0.0, 0.0, 0.0, 100.0);
        let ahead_slower = sample(2, 0.0, 1.0, 0.0, 0.0, 80.0);
        assert!((closing_rate_kt(&a, &ahead_slower) + 20.0).abs() < 1e-9);
        let ahead_faster = sample(3, 0.0, 1.0, 0.0, 0.0, 120.0);
        assert!((closing_rate_kt(&a, &ahead_faster) - 20.0).abs() < 1e-9);
        let colocated = sample(4, 0.0, 0.001, 0.0, 180.0, 120.0);
        assert!(closing_rate_kt(&a, &colocated).abs() < f64::EPSILON);
    }

    #[test]
    fn advisory_requires_closing() {
        let d = detector();
        assert_eq!(d.classify_severity(2.5, 1200.0, -5.0), Some(Severity::Advisory));
        assert_eq!(d.classify_severity(2.5, 1200.0, 5.0), None);
        assert_eq!(d.classify_severity(2.5, 1200.0, 0.0), None);
        assert_eq!(d.classify_severity(1.5, 900.0, 5.0), Some(Severity::Warning));
    }

    #[test]
    fn severity_bands_are_nested() {
        let d = detector();
        let t = SeparationThresholds::default();
        let mut h = 0.0;
        while h < 3.5 {
            let mut v = 0.0;
            while v < 1600.0 {
                if d.classify_severity(h, v, -1.0) == Some(Severity::Critical) {
                    assert!(h < t.warning.horizontal_nm && v < t.warning.vertical_ft);
                    assert!(h < t.advisory.horizontal_nm && v < t.advisory.vertical_ft);
                }
                if d.classify_severity(h, v, -1.0).is_some() {
                    assert!(h < t.advisory.horizontal_nm && v < t.advisory.vertical_ft);
                }
                v += 50.0;
            }
            h += 0.1;
        }
    }

    #[test]
    fn geometry_classes() {
        assert_eq!(classify_geometry(10.0, 90.0, 150.0), Geometry::Overtaking);
        assert_eq!(classify_geometry(10.0, 90.0, 90.5), Geometry::Overtaking);
        assert_eq!(classify_geometry(10.0, 90.0, 90.0), Geometry::SameDirection);
        assert_eq!(classify_geometry(170.0, 90.0, 90.0), Geometry::HeadOn);
        assert_eq!(classify_geometry(90.0, 90.0, 90.0), Geometry::Converging);
    }

    #[test]
    fn output_is_sorted_by_severity_then_distance() {
        let traffic = [
            // Pair (1,2): warning at 1.8 NM.
            sample(1, 0.0, 0.0, 1500.0, 0.0, 90.0),
            sample(2, 1.8, 0.0, 1500.0, 0.0, 90.0),
            // Pair (3,4): critical at 0.8 NM.
            sample(3, 20.0, 0.0, 1500.0, 0.0, 90.0),
            sample(4, 20.8, 0.0, 1500.0, 0.0, 90.0),
            // Pair (5,6): critical at 0.4 NM.
            sample(5, -20.0, 0.0, 1500.0, 0.0, 90.0),
            sample(6, -20.4, 0.0, 1500.0, 0.0, 90.0),
        ];
        let conflicts = detector().detect(&traffic, 0.0);
        let ids: Vec<&str> = conflicts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["conflict-ac5-ac6", "conflict-ac3-ac4", "conflict-ac1-ac2"]);
    }

    #[test]
    fn faster_aircraft_is_reported() {
        let a = sample(1, 0.0, 0.0, 1500.0, 90.0, 90.0);
        let b = sample(2, 0.5, 0.0, 1500.0, 90.0, 150.0);
        let c = detector().check_pair(&a, &b, 0.0).unwrap();
        assert_eq!(c.faster_aircraft_id, b.id);
        assert_eq!(c.geometry, Geometry::Overtaking);
    }

    #[test]
    fn anomaly_wraps_conflict() {
        let a = sample(1, 0.0, 0.0, 1500.0, 90.0, 100.0);
        let b = sample(2, 0.5, 0.0, 1800.0, 270.0, 100.0);
        let c = detector().check_pair(&a, &b, 3.0).unwrap();
        let anomaly = conflict_anomaly(&c, 3);
        assert_eq!(anomaly.id, "anom-3-ac1-ac2");
        assert_eq!(anomaly.anomaly_type, LOSS_OF_SEPARATION);
        assert_eq!(
            anomaly.description,
            "Loss of separation between N1 and N2 (0.5 NM / 300 ft)"
        );
        assert!(!anomaly.external);
        assert!(anomaly.conflict.is_some());
    }
}
