//! Range-of-motion estimates over angle sequences.
//!
//! Amplitude is the robust per-joint spread `p90 - p10`, summed over the
//! included joints. Percentiles use linear interpolation between order
//! statistics.

use formcoach_core::{joint_column, AngleVector, Joint};

use crate::priority::PriorityMask;

/// Linear-interpolated percentile, `q` in [0, 100]; 0.0 for no values
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// `max(p90 - p10, 0)` of one joint's values
pub fn robust_range(values: &[f64]) -> f64 {
    (percentile(values, 90.0) - percentile(values, 10.0)).max(0.0)
}

/// Summed robust range over the joints selected by `mask`.
///
/// An all-false mask yields 0.0; `None` includes every joint.
pub fn motion_amplitude(seq: &[AngleVector], mask: Option<&PriorityMask>) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    Joint::ALL
        .iter()
        .filter(|j| mask.map_or(true, |m| m.contains(**j)))
        .map(|j| robust_range(&joint_column(seq, *j)))
        .sum()
}

/// Amplitude over every joint
pub fn total_motion_amplitude(seq: &[AngleVector]) -> f64 {
    motion_amplitude(seq, None)
}

/// Full `max - min` spread of one joint; 0.0 for an empty sequence
pub fn joint_range(seq: &[AngleVector], joint: Joint) -> f64 {
    let col = joint_column(seq, joint);
    if col.is_empty() {
        return 0.0;
    }
    let max = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = col.iter().copied().fold(f64::INFINITY, f64::min);
    max - min
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcoach_core::ANGLE_DIMS;

    fn sweep(joint: Joint, n: usize) -> Vec<AngleVector> {
        (0..n)
            .map(|i| {
                let mut v = [90.0; ANGLE_DIMS];
                v[joint.index()] = i as f64 * 10.0;
                v
            })
            .collect()
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&values, 50.0), 20.0);
        assert!((percentile(&values, 90.0) - 36.0).abs() < 1e-9);
        assert!((percentile(&values, 15.0) - 6.0).abs() < 1e-9);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_all_false_mask_is_zero() {
        let seq = sweep(Joint::ElbowL, 11);
        assert_eq!(motion_amplitude(&seq, Some(&PriorityMask::none())), 0.0);
    }

    #[test]
    fn test_masked_amplitude_only_counts_selected_joints() {
        let seq = sweep(Joint::ElbowL, 11);
        let mut elbow = PriorityMask::none();
        elbow.0[Joint::ElbowL.index()] = true;
        let mut knee = PriorityMask::none();
        knee.0[Joint::KneeL.index()] = true;

        // p90 - p10 over 0..=100 in steps of 10
        assert!((motion_amplitude(&seq, Some(&elbow)) - 80.0).abs() < 1e-9);
        assert_eq!(motion_amplitude(&seq, Some(&knee)), 0.0);
        assert!((total_motion_amplitude(&seq) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_joint_range() {
        let seq = sweep(Joint::HipR, 5);
        assert_eq!(joint_range(&seq, Joint::HipR), 40.0);
        assert_eq!(joint_range(&seq, Joint::HipL), 0.0);
        assert_eq!(joint_range(&[], Joint::HipL), 0.0);
    }
}
