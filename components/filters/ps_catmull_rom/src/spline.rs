//! Non-uniform Catmull-Rom segment between the two middle points of a
//! four point window, evaluated in Hermite form.

use glam::Vec3;
use posestream::prelude::*;

/// Knot spacing below this is treated as coincident points.
const MIN_KNOT_SPACING: f32 = 1e-4;

/// Cubic segment from `p1` to `p2`, shaped by the outer points `p0` and `p3`.
///
/// `alpha` selects the knot parametrisation: 0 uniform, 0.5 centripetal,
/// 1 chordal. Coincident neighbours (the duplicated end points of an entry
/// or exit segment) fall back to the spacing of the middle chord.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatmullRomSegment {
    start: Vec3,
    end: Vec3,
    start_tangent: Vec3,
    end_tangent: Vec3,
}

impl CatmullRomSegment {
    pub fn new(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, alpha: f32) -> Self {
        let knot = |a: Vec3, b: Vec3| a.distance(b).powf(alpha);
        let mut dt1 = knot(p1, p2);
        if dt1 < MIN_KNOT_SPACING {
            dt1 = 1.0;
        }
        let mut dt0 = knot(p0, p1);
        if dt0 < MIN_KNOT_SPACING {
            dt0 = dt1;
        }
        let mut dt2 = knot(p2, p3);
        if dt2 < MIN_KNOT_SPACING {
            dt2 = dt1;
        }

        let start_tangent =
            ((p1 - p0) / dt0 - (p2 - p0) / (dt0 + dt1) + (p2 - p1) / dt1) * dt1;
        let end_tangent =
            ((p2 - p1) / dt1 - (p3 - p1) / (dt1 + dt2) + (p3 - p2) / dt2) * dt1;

        Self {
            start: p1,
            end: p2,
            start_tangent,
            end_tangent,
        }
    }

    /// Point at `t` in [0, 1]. The end points are returned exactly.
    pub fn position(&self, t: f32) -> Vec3 {
        if t <= 0.0 {
            return self.start;
        }
        if t >= 1.0 {
            return self.end;
        }
        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        self.start * h00 + self.start_tangent * h10 + self.end * h01 + self.end_tangent * h11
    }
}

/// Pose at `t` on the segment between `b` and `c`: spline position, rotation
/// slerped between the two segment end rotations.
pub fn sample_pose(segment: &CatmullRomSegment, b: &Pose, c: &Pose, t: f32) -> Pose {
    let rotation = if t <= 0.0 {
        b.rotation
    } else if t >= 1.0 {
        c.rotation
    } else {
        b.rotation.slerp(c.rotation, t).normalize()
    };
    Pose::new(segment.position(t), rotation)
}
