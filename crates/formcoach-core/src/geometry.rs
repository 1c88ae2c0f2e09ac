//! Geometric utilities for joint angles and body orientation.

use nalgebra::Vector3;

use crate::types::{PoseFrame, PoseLandmark};

/// Guard added to norm products before dividing
pub const ANGLE_EPSILON: f64 = 1e-8;

/// Angle at `b` formed by the segments `b→a` and `b→c`, in degrees.
///
/// Degenerate segments (zero length) yield 90° because the cosine collapses to
/// zero under the epsilon guard; callers treat missing points separately.
pub fn joint_angle_degrees(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    let ba = a - b;
    let bc = c - b;
    let den = ba.norm() * bc.norm() + ANGLE_EPSILON;
    let cos_angle = (ba.dot(&bc) / den).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Calculate angle between two vectors (radians)
pub fn angle_between(v1: &Vector3<f64>, v2: &Vector3<f64>) -> f64 {
    let dot = v1.dot(v2);
    let norms = v1.norm() * v2.norm();
    if norms < 1e-10 {
        0.0
    } else {
        (dot / norms).clamp(-1.0, 1.0).acos()
    }
}

/// Cosine of the angle between two vectors, clipped to [-1, 1]
pub fn cosine_similarity(v1: &Vector3<f64>, v2: &Vector3<f64>) -> f64 {
    let norms = v1.norm() * v2.norm();
    if norms < 1e-10 {
        return 0.0;
    }
    (v1.dot(v2) / norms).clamp(-1.0, 1.0)
}

/// Coarse torso facing direction for one frame.
///
/// Cross product of the shoulder line (left → right) with the torso up vector
/// (hip midpoint → shoulder midpoint). Returns a unit vector, or `None` when a
/// torso landmark is missing or the torso is degenerate.
pub fn forward_vector(frame: &PoseFrame) -> Option<Vector3<f64>> {
    let ls = frame.get(PoseLandmark::LeftShoulder)?;
    let rs = frame.get(PoseLandmark::RightShoulder)?;
    let lh = frame.get(PoseLandmark::LeftHip)?;
    let rh = frame.get(PoseLandmark::RightHip)?;

    let mid_shoulder = ls.midpoint(rs).to_vector();
    let mid_hip = lh.midpoint(rh).to_vector();
    let shoulder_line = rs.to_vector() - ls.to_vector();
    let up = mid_shoulder - mid_hip;

    let forward = shoulder_line.cross(&up);
    let norm = forward.norm() + ANGLE_EPSILON;
    if norm < 1e-6 {
        return None;
    }
    Some(forward / norm)
}

/// Mean facing direction over a sequence, renormalized to unit length
pub fn average_forward_vector<'a, I>(frames: I) -> Option<Vector3<f64>>
where
    I: IntoIterator<Item = &'a PoseFrame>,
{
    let mut acc = Vector3::zeros();
    let mut count = 0usize;

    for v in frames.into_iter().filter_map(forward_vector) {
        if v.iter().all(|c| c.is_finite()) {
            acc += v;
            count += 1;
        }
    }

    if count == 0 {
        return None;
    }
    Some(acc / (acc.norm() + ANGLE_EPSILON))
}
