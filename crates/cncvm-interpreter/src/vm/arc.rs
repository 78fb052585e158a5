//! Arc approximation
//!
//! Arcs are computed in a canonical plane `(s1, s2)` with a linear height
//! axis `s3`. Each arc plane maps the physical axes onto that frame through
//! a permutation, so one routine serves G17, G18 and G19:
//!
//! | plane | s1 | s2 | s3 |
//! |-------|----|----|----|
//! | XY    | X  | Y  | Z  |
//! | XZ    | Z  | X  | Y  |
//! | YZ    | Y  | Z  | X  |
//!
//! Positive angles in the canonical frame are counter-clockwise when looking
//! down the height axis, which keeps G2/G3 right-handed in every plane.

use std::f64::consts::TAU;

use super::{Plane, VmConfig};
use crate::error::{VmError, VmResult};

/// A circular (or helical) move to approximate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcMove {
    /// Start point, physical X/Y/Z
    pub start: [f64; 3],
    /// End point, physical X/Y/Z
    pub end: [f64; 3],
    /// Absolute arc center, physical X/Y/Z
    pub center: [f64; 3],
    /// G2 when true, G3 otherwise
    pub clockwise: bool,
    /// Extra full revolutions (P word)
    pub turns: u32,
    /// Active arc plane
    pub plane: Plane,
}

impl Plane {
    /// Physical axis index for each canonical axis `[s1, s2, s3]`
    pub fn axes(self) -> [usize; 3] {
        match self {
            Plane::XY => [0, 1, 2],
            Plane::XZ => [2, 0, 1],
            Plane::YZ => [1, 2, 0],
        }
    }

    fn to_canonical(self, p: [f64; 3]) -> [f64; 3] {
        let [a, b, c] = self.axes();
        [p[a], p[b], p[c]]
    }

    fn to_physical(self, c: [f64; 3]) -> [f64; 3] {
        let axes = self.axes();
        let mut p = [0.0; 3];
        for (n, &axis) in axes.iter().enumerate() {
            p[axis] = c[n];
        }
        p
    }
}

/// Number of chords for an arc of `radius` sweeping `sweep` radians while
/// rising `height` along the plane normal
///
/// The count is the smaller of the chordal-deviation bound and the
/// minimum-segment-length bound, and never less than one.
pub fn segment_count(radius: f64, sweep: f64, height: f64, config: &VmConfig) -> usize {
    let sweep = sweep.abs();

    let by_deviation = if config.max_arc_deviation < radius {
        let step = 2.0 * (1.0 - config.max_arc_deviation / radius).acos();
        (sweep / step).ceil()
    } else {
        1.0
    };

    let length = (radius * sweep).hypot(height);
    let by_length = (length / config.min_arc_segment_length).floor();

    let steps = by_deviation.min(by_length);
    if steps.is_finite() && steps > 1.0 {
        steps as usize
    } else {
        1
    }
}

/// Signed angular sweep from `start_angle` to `end_angle` in the requested
/// direction, including `turns` extra revolutions
pub fn sweep_angle(start_angle: f64, end_angle: f64, clockwise: bool, turns: u32) -> f64 {
    let mut sweep = end_angle - start_angle;
    if sweep == 0.0 {
        // Coincident endpoints describe a full circle.
        sweep = if clockwise { -TAU } else { TAU };
    } else if sweep < 0.0 && !clockwise {
        sweep += TAU;
    } else if sweep > 0.0 && clockwise {
        sweep -= TAU;
    }

    let extra = TAU * f64::from(turns);
    if clockwise {
        sweep - extra
    } else {
        sweep + extra
    }
}

/// Approximate an arc with chords
///
/// Returns the physical points to visit in order. The final point is always
/// the exact requested end point. Endpoints closer than `config.tolerance`
/// in the arc plane make a full circle.
pub fn approximate(arc: &ArcMove, config: &VmConfig) -> VmResult<Vec<[f64; 3]>> {
    let plane = arc.plane;
    let [s1, s2, s3] = plane.to_canonical(arc.start);
    let [e1, e2, e3] = plane.to_canonical(arc.end);
    let [c1, c2, _] = plane.to_canonical(arc.center);

    let start_radius = (s1 - c1).hypot(s2 - c2);
    let end_radius = (e1 - c1).hypot(e2 - c2);
    if start_radius == 0.0 || end_radius == 0.0 {
        return Err(VmError::DegenerateArc);
    }
    if (start_radius - end_radius).abs() / start_radius > config.radius_tolerance {
        return Err(VmError::RadiusMismatch {
            start_radius,
            end_radius,
        });
    }

    let start_angle = (s2 - c2).atan2(s1 - c1);
    let end_angle = if (e1 - s1).hypot(e2 - s2) <= config.tolerance {
        start_angle
    } else {
        (e2 - c2).atan2(e1 - c1)
    };
    let sweep = sweep_angle(start_angle, end_angle, arc.clockwise, arc.turns);
    let steps = segment_count(start_radius, sweep, e3 - s3, config);
    if steps > config.max_arc_segments {
        return Err(VmError::TooManyArcSegments {
            segments: steps,
            limit: config.max_arc_segments,
        });
    }

    tracing::debug!(
        radius = start_radius,
        sweep,
        steps,
        "approximating arc"
    );

    let mut points = Vec::with_capacity(steps + 1);
    for i in 1..=steps {
        let fraction = i as f64 / steps as f64;
        let angle = start_angle + sweep * fraction;
        let canonical = [
            c1 + start_radius * angle.cos(),
            c2 + start_radius * angle.sin(),
            s3 + (e3 - s3) * fraction,
        ];
        points.push(plane.to_physical(canonical));
    }
    points.push(arc.end);

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_plane_permutation_round_trip() {
        for plane in [Plane::XY, Plane::XZ, Plane::YZ] {
            let p = [1.0, 2.0, 3.0];
            assert_eq!(plane.to_physical(plane.to_canonical(p)), p);
        }
        assert_eq!(Plane::XZ.to_canonical([1.0, 2.0, 3.0]), [3.0, 1.0, 2.0]);
        assert_eq!(Plane::YZ.to_canonical([1.0, 2.0, 3.0]), [2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_sweep_direction() {
        // Quarter turn counter-clockwise from +X to +Y
        assert!(close(sweep_angle(0.0, FRAC_PI_2, false, 0), FRAC_PI_2));
        // Same endpoints clockwise go the long way round
        assert!(close(sweep_angle(0.0, FRAC_PI_2, true, 0), FRAC_PI_2 - TAU));
        // Clockwise from +Y to +X
        assert!(close(sweep_angle(FRAC_PI_2, 0.0, true, 0), -FRAC_PI_2));
        // Counter-clockwise from +Y to +X
        assert!(close(sweep_angle(FRAC_PI_2, 0.0, false, 0), TAU - FRAC_PI_2));
    }

    #[test]
    fn test_sweep_full_circle_and_turns() {
        assert!(close(sweep_angle(1.0, 1.0, false, 0), TAU));
        assert!(close(sweep_angle(1.0, 1.0, true, 0), -TAU));
        assert!(close(sweep_angle(0.0, PI, false, 2), PI + 2.0 * TAU));
        assert!(close(sweep_angle(0.0, PI, true, 1), -PI - TAU));
    }

    #[test]
    fn test_segment_count_bounds() {
        let config = VmConfig::default();
        // Tiny radius: deviation larger than radius gives a single chord
        assert_eq!(segment_count(0.001, PI, 0.0, &config), 1);

        // Loose minimum length wins on a small arc
        let config = VmConfig {
            max_arc_deviation: 0.0001,
            min_arc_segment_length: 1.0,
            ..VmConfig::default()
        };
        // Half circle of radius 1 is ~3.14mm long
        assert_eq!(segment_count(1.0, PI, 0.0, &config), 3);

        // Deviation bound wins with a tiny minimum length
        let config = VmConfig {
            max_arc_deviation: 0.01,
            min_arc_segment_length: 0.0001,
            ..VmConfig::default()
        };
        let expected = (PI / (2.0 * (1.0 - 0.01_f64 / 10.0).acos())).ceil() as usize;
        assert_eq!(segment_count(10.0, PI, 0.0, &config), expected);
    }

    #[test]
    fn test_approximate_quarter_circle() {
        let arc = ArcMove {
            start: [10.0, 0.0, 0.0],
            end: [0.0, 10.0, 0.0],
            center: [0.0, 0.0, 0.0],
            clockwise: false,
            turns: 0,
            plane: Plane::XY,
        };
        let config = VmConfig::default();
        let points = approximate(&arc, &config).unwrap();
        let steps = segment_count(10.0, FRAC_PI_2, 0.0, &config);
        assert_eq!(points.len(), steps + 1);
        assert_eq!(*points.last().unwrap(), [0.0, 10.0, 0.0]);
        for p in &points {
            assert!(close(p[0].hypot(p[1]), 10.0));
            assert!(p[0] >= -1e-9 && p[1] >= -1e-9);
        }
    }

    #[test]
    fn test_approximate_errors() {
        let config = VmConfig::default();
        let degenerate = ArcMove {
            start: [0.0, 0.0, 0.0],
            end: [10.0, 0.0, 0.0],
            center: [0.0, 0.0, 0.0],
            clockwise: true,
            turns: 0,
            plane: Plane::XY,
        };
        assert_eq!(approximate(&degenerate, &config), Err(VmError::DegenerateArc));

        let mismatch = ArcMove {
            center: [3.0, 2.0, 0.0],
            ..degenerate
        };
        assert!(matches!(
            approximate(&mismatch, &config),
            Err(VmError::RadiusMismatch { .. })
        ));
    }

    #[test]
    fn test_nearly_coincident_endpoints_make_full_circle() {
        let config = VmConfig::default();
        let arc = ArcMove {
            start: [10.0, 0.0, 0.0],
            end: [10.0, 0.0005, 0.0],
            center: [0.0, 0.0, 0.0],
            clockwise: false,
            turns: 0,
            plane: Plane::XY,
        };
        let points = approximate(&arc, &config).unwrap();
        assert_eq!(points.len(), segment_count(10.0, TAU, 0.0, &config) + 1);
    }

    #[test]
    fn test_segment_limit() {
        let arc = ArcMove {
            start: [10.0, 0.0, 0.0],
            end: [-10.0, 0.0, 0.0],
            center: [0.0, 0.0, 0.0],
            clockwise: false,
            turns: 100_000,
            plane: Plane::XY,
        };
        let config = VmConfig::default();
        assert!(matches!(
            approximate(&arc, &config),
            Err(VmError::TooManyArcSegments { limit: 200_000, .. })
        ));

        let small = ArcMove { turns: 0, ..arc };
        let config = VmConfig {
            max_arc_segments: 4,
            ..VmConfig::default()
        };
        assert!(matches!(
            approximate(&small, &config),
            Err(VmError::TooManyArcSegments { limit: 4, .. })
        ));
    }
}
