//! Dynamic time warping between angle sequences.
//!
//! ## Recurrence
//!
//! D[0][0] = 0, every other boundary cell = +∞
//! D[i][j] = cost(i, j) + min(D[i-1][j], D[i][j-1], D[i-1][j-1])
//!
//! The reported distance is `D[Ta][Tb] / (Ta + Tb)`, i.e. the accumulated cost
//! normalized by the combined sequence length.

use formcoach_core::AngleVector;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::conditioning::mirror;
use crate::priority::JointWeights;

/// Distance reported when either angle sequence is empty
pub const EMPTY_ANGLE_DISTANCE: f64 = 180.0;

/// Distance reported when either embedding sequence is empty
pub const EMPTY_EMBEDDING_DISTANCE: f64 = 1.0;

/// Decay for angle distances (degrees)
pub const ANGLE_SIMILARITY_DECAY: f64 = 0.03;

/// Decay for cosine distances between unit embeddings
pub const EMBEDDING_SIMILARITY_DECAY: f64 = 3.0;

fn accumulate<F>(ta: usize, tb: usize, cost: F) -> f64
where
    F: Fn(usize, usize) -> f64,
{
    let mut d = Array2::from_elem((ta + 1, tb + 1), f64::INFINITY);
    d[[0, 0]] = 0.0;

    for i in 1..=ta {
        for j in 1..=tb {
            let best = d[[i - 1, j]].min(d[[i, j - 1]]).min(d[[i - 1, j - 1]]);
            d[[i, j]] = cost(i - 1, j - 1) + best;
        }
    }

    d[[ta, tb]] / (ta + tb) as f64
}

/// DTW distance with a per-joint L1 cost.
///
/// With `weights` the cost is the weighted mean absolute difference (weights
/// scaled to sum to one); without, or when every weight is ~zero, the plain
/// mean across all joints.
pub fn dtw_distance(a: &[AngleVector], b: &[AngleVector], weights: Option<&JointWeights>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return EMPTY_ANGLE_DISTANCE;
    }

    let unit = weights.and_then(JointWeights::unit);
    accumulate(a.len(), b.len(), |i, j| {
        let diffs = a[i].iter().zip(b[j].iter()).map(|(x, y)| (x - y).abs());
        match &unit {
            Some(w) => diffs.zip(w.iter()).map(|(d, w)| d * w).sum(),
            None => diffs.sum::<f64>() / a[i].len() as f64,
        }
    })
}

/// DTW distance between sequences of unit-norm embeddings; cell cost is
/// `1 - clip(dot, -1, 1)`.
pub fn dtw_distance_cosine<S: AsRef<[f64]>>(a: &[S], b: &[S]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return EMPTY_EMBEDDING_DISTANCE;
    }

    accumulate(a.len(), b.len(), |i, j| {
        let dot: f64 = a[i]
            .as_ref()
            .iter()
            .zip(b[j].as_ref().iter())
            .map(|(x, y)| x * y)
            .sum();
        1.0 - dot.clamp(-1.0, 1.0)
    })
}

/// Similarity in (0, 1] for an angle distance
pub fn angle_similarity(distance: f64) -> f64 {
    (-ANGLE_SIMILARITY_DECAY * distance).exp()
}

/// Similarity in (0, 1] for a cosine DTW distance
pub fn embedding_similarity(distance: f64) -> f64 {
    (-EMBEDDING_SIMILARITY_DECAY * distance).exp()
}

/// Nominal and left/right-mirrored distances of one user sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MirroredAlignment {
    pub nominal: f64,
    pub mirrored: f64,
}

impl MirroredAlignment {
    pub fn compute(
        user: &[AngleVector],
        reference: &[AngleVector],
        weights: Option<&JointWeights>,
    ) -> Self {
        Self {
            nominal: dtw_distance(user, reference, weights),
            mirrored: dtw_distance(&mirror(user), reference, weights),
        }
    }

    pub fn best(&self) -> f64 {
        self.nominal.min(self.mirrored)
    }

    /// True when the mirrored reading is strictly better
    pub fn prefers_mirror(&self) -> bool {
        self.mirrored < self.nominal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcoach_core::{Joint, ANGLE_DIMS};

    fn wave(n: usize, phase: f64) -> Vec<AngleVector> {
        (0..n)
            .map(|i| {
                let t = i as f64 / n as f64 * std::f64::consts::TAU + phase;
                let mut v = [90.0; ANGLE_DIMS];
                v[Joint::ElbowL.index()] = 90.0 + 60.0 * t.sin();
                v[Joint::KneeR.index()] = 120.0 + 30.0 * t.cos();
                v
            })
            .collect()
    }

    #[test]
    fn test_identical_sequences_have_zero_distance() {
        let a = wave(30, 0.0);
        let w = JointWeights([1.0, 2.0, 0.5, 0.5, 0.1, 0.1, 3.0, 0.8]);
        assert!(dtw_distance(&a, &a, Some(&w)).abs() < 1e-12);
        assert!(dtw_distance(&a, &a, None).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sentinels() {
        let a = wave(5, 0.0);
        assert_eq!(dtw_distance(&a, &[], None), EMPTY_ANGLE_DISTANCE);
        assert_eq!(dtw_distance(&[], &a, None), EMPTY_ANGLE_DISTANCE);

        let e: Vec<Vec<f64>> = Vec::new();
        assert_eq!(dtw_distance_cosine(&e, &e), EMPTY_EMBEDDING_DISTANCE);
    }

    #[test]
    fn test_time_stretch_is_cheaper_than_offset() {
        let a = wave(30, 0.0);
        let stretched = wave(45, 0.0);
        let shifted: Vec<AngleVector> = a
            .iter()
            .map(|v| {
                let mut v = *v;
                v.iter_mut().for_each(|x| *x += 20.0);
                v
            })
            .collect();

        let stretch = dtw_distance(&a, &stretched, None);
        let offset = dtw_distance(&a, &shifted, None);
        assert!(stretch < offset);
    }

    #[test]
    fn test_constant_offset_distance() {
        let a = vec![[10.0; ANGLE_DIMS]; 4];
        let b = vec![[14.0; ANGLE_DIMS]; 4];
        // Diagonal path: 4 cells of cost 4, normalized by 8.
        assert!((dtw_distance(&a, &b, None) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weights_fall_back_to_mean() {
        let a = vec![[10.0; ANGLE_DIMS]; 3];
        let b = vec![[12.0; ANGLE_DIMS]; 3];
        let zero = JointWeights([0.0; ANGLE_DIMS]);
        assert_eq!(
            dtw_distance(&a, &b, Some(&zero)),
            dtw_distance(&a, &b, None)
        );
    }

    #[test]
    fn test_cosine_dtw() {
        let a = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert!(dtw_distance_cosine(&a, &a).abs() < 1e-12);

        let opposite = vec![vec![-1.0, 0.0], vec![0.0, -1.0]];
        assert!((dtw_distance_cosine(&a, &opposite) - 1.0).abs() < 1e-9);
        assert!((embedding_similarity(0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mirrored_alignment_detects_swapped_sides() {
        let reference = wave(20, 0.0);
        let swapped = mirror(&reference);

        let alignment = MirroredAlignment::compute(&swapped, &reference, None);
        assert!(alignment.prefers_mirror());
        assert!(alignment.best().abs() < 1e-12);
        assert!((angle_similarity(alignment.best()) - 1.0).abs() < 1e-12);
    }
}
