//! Per-cycle scoring of a user's motion against the reference cycle.
//!
//! ## Score
//!
//! score = exp(-0.03 · d) · clip(A_user / A_template, 0, 1)
//!
//! Where:
//! - d is the smaller of the nominal and left/right-mirrored weighted DTW
//!   distances
//! - A is the priority-joint motion amplitude
//!
//! Cycles that already score well (≥ 0.4) are cut to 30 % when the user's
//! non-priority joints move more than 2.5× as much as the template's.

use formcoach_core::{AngleExtractor, AngleVector, Error, PoseFrame, Result, ANGLE_DIMS};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amplitude::motion_amplitude;
use crate::conditioning::condition;
use crate::dtw::{MirroredAlignment, ANGLE_SIMILARITY_DECAY};
use crate::priority::{JointWeights, PriorityMask};
use crate::template::MotionTemplate;

/// Guard added to amplitude denominators
pub const AMPLITUDE_EPSILON: f64 = 1e-6;

/// Scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Decay applied to the DTW distance
    pub similarity_decay: f64,
    /// Base score at or above which non-priority motion is checked
    pub penalty_gate: f64,
    /// Non-priority amplitude ratio above which the penalty applies
    pub nonpriority_ratio_limit: f64,
    /// Multiplier applied to penalized cycles
    pub penalty_factor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            similarity_decay: ANGLE_SIMILARITY_DECAY,
            penalty_gate: 0.4,
            nonpriority_ratio_limit: 2.5,
            penalty_factor: 0.3,
        }
    }
}

/// Result of scoring one cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleScore {
    /// Final score in [0, 1]
    pub score: f64,
    /// Score before the non-priority penalty
    pub base_score: f64,
    pub similarity: f64,
    pub distance: f64,
    /// True when the mirrored reading was used
    pub mirrored: bool,
    pub amplitude_ratio: f64,
    pub user_amplitude: f64,
    pub template_amplitude: f64,
    /// Non-priority amplitude ratio, when it was checked
    pub nonpriority_ratio: Option<f64>,
    pub penalized: bool,
    /// Mean absolute difference per joint after alignment to template length
    pub joint_differences: [f64; ANGLE_DIMS],
}

impl CycleScore {
    /// Score for a cycle with no usable user data
    pub fn zero() -> Self {
        Self {
            score: 0.0,
            base_score: 0.0,
            similarity: 0.0,
            distance: f64::INFINITY,
            mirrored: false,
            amplitude_ratio: 0.0,
            user_amplitude: 0.0,
            template_amplitude: 0.0,
            nonpriority_ratio: None,
            penalized: false,
            joint_differences: [0.0; ANGLE_DIMS],
        }
    }
}

/// Scores user cycles against a reference with fixed weights and mask
#[derive(Debug, Clone)]
pub struct CycleScorer {
    config: ScoringConfig,
    weights: JointWeights,
    mask: PriorityMask,
    extractor: AngleExtractor,
}

impl CycleScorer {
    pub fn new(weights: JointWeights, mask: PriorityMask) -> Self {
        Self::with_config(ScoringConfig::default(), weights, mask)
    }

    pub fn with_config(config: ScoringConfig, weights: JointWeights, mask: PriorityMask) -> Self {
        Self {
            config,
            weights,
            mask,
            extractor: AngleExtractor::default(),
        }
    }

    pub fn weights(&self) -> &JointWeights {
        &self.weights
    }

    pub fn mask(&self) -> &PriorityMask {
        &self.mask
    }

    pub fn extractor(&self) -> &AngleExtractor {
        &self.extractor
    }

    /// Score the most recent `cycle_len` user frames
    pub fn score_frames(&self, user: &[PoseFrame], template: &MotionTemplate) -> Result<CycleScore> {
        if user.is_empty() {
            return Ok(CycleScore::zero());
        }
        let recent = &user[user.len().saturating_sub(template.cycle_len())..];
        let raw = self.extractor.extract_sequence(recent);
        self.score_angles(&raw, template.angles())
    }

    /// Score raw (unsmoothed) user angles against reference angles
    pub fn score_angles(&self, user_raw: &[AngleVector], reference: &[AngleVector]) -> Result<CycleScore> {
        if reference.is_empty() {
            return Err(Error::Scoring("reference cycle is empty".into()));
        }
        if user_raw.is_empty() {
            return Ok(CycleScore::zero());
        }

        let user = condition(user_raw, reference.len());
        let alignment = MirroredAlignment::compute(&user, reference, Some(&self.weights));
        let distance = alignment.best();
        if !distance.is_finite() {
            return Err(Error::Scoring(format!("non-finite distance {distance}")));
        }
        let similarity = (-self.config.similarity_decay * distance).exp();

        let amp_mask = self.mask.amplitude_mask();
        let user_amplitude = motion_amplitude(&user, Some(&amp_mask));
        let template_amplitude = motion_amplitude(reference, Some(&amp_mask));
        let amplitude_ratio = if template_amplitude <= AMPLITUDE_EPSILON {
            1.0
        } else {
            (user_amplitude / (template_amplitude + AMPLITUDE_EPSILON)).clamp(0.0, 1.0)
        };

        let base_score = similarity * amplitude_ratio;
        let mut score = base_score;
        let mut nonpriority_ratio = None;
        let mut penalized = false;

        if base_score >= self.config.penalty_gate {
            let non_mask = self.mask.non_priority();
            let user_np = motion_amplitude(&user, Some(&non_mask));
            let template_np = motion_amplitude(reference, Some(&non_mask));
            let ratio = user_np / (template_np + AMPLITUDE_EPSILON);
            nonpriority_ratio = Some(ratio);

            if ratio > self.config.nonpriority_ratio_limit {
                score = base_score * self.config.penalty_factor;
                penalized = true;
                debug!(
                    user_np,
                    template_np,
                    ratio,
                    score,
                    "excessive non-priority motion"
                );
            }
        }

        debug!(
            distance,
            similarity,
            amplitude_ratio,
            score,
            mirrored = alignment.prefers_mirror(),
            "cycle scored"
        );

        Ok(CycleScore {
            score,
            base_score,
            similarity,
            distance,
            mirrored: alignment.prefers_mirror(),
            amplitude_ratio,
            user_amplitude,
            template_amplitude,
            nonpriority_ratio,
            penalized,
            joint_differences: joint_differences(&user, reference),
        })
    }
}

/// Mean absolute difference per joint over the common prefix
pub fn joint_differences(a: &[AngleVector], b: &[AngleVector]) -> [f64; ANGLE_DIMS] {
    let n = a.len().min(b.len());
    let mut out = [0.0; ANGLE_DIMS];
    if n == 0 {
        return out;
    }
    for (x, y) in a.iter().zip(b.iter()) {
        for d in 0..ANGLE_DIMS {
            out[d] += (x[d] - y[d]).abs();
        }
    }
    out.iter_mut().for_each(|v| *v /= n as f64);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::{build_priority_mask, build_weights};
    use crate::fixtures::curl_frames;
    use formcoach_core::Joint;

    fn elbow_scorer() -> CycleScorer {
        CycleScorer::new(
            build_weights(&["elbow"], 1.8, 0.2).unwrap(),
            build_priority_mask(&["elbow"]).unwrap(),
        )
    }

    fn sweep(n: usize, elbow_amp: f64, knee_amp: f64) -> Vec<AngleVector> {
        (0..n)
            .map(|i| {
                let t = (std::f64::consts::TAU * i as f64 / n as f64).sin();
                let mut v = [170.0; ANGLE_DIMS];
                v[Joint::ElbowL.index()] = 100.0 + elbow_amp * t;
                v[Joint::ElbowR.index()] = 100.0 + elbow_amp * t;
                v[Joint::KneeL.index()] = 170.0 + knee_amp * t;
                v[Joint::KneeR.index()] = 170.0 + knee_amp * t;
                v
            })
            .collect()
    }

    #[test]
    fn test_identical_constant_frames_score_one() {
        let reference = vec![[120.0; ANGLE_DIMS]; 30];
        let result = elbow_scorer().score_angles(&reference, &reference).unwrap();

        assert!(result.distance.abs() < 1e-12);
        assert!((result.score - 1.0).abs() < 1e-9);
        assert!(!result.penalized);
    }

    #[test]
    fn test_identical_cycle_scores_near_one() {
        let frames = curl_frames(90, 30, 30.0);
        let template = MotionTemplate::from_frames(frames.clone()).unwrap();
        let start = template.cycle().segment.start;
        let user = &frames[start..start + template.cycle_len()];

        let result = elbow_scorer().score_frames(user, &template).unwrap();
        assert!(result.distance < 1e-9);
        assert!(result.score > 0.99);
    }

    #[test]
    fn test_static_user_scores_zero() {
        let reference = sweep(30, 60.0, 0.0);
        let user = vec![[100.0; ANGLE_DIMS]; 30];

        let result = elbow_scorer().score_angles(&user, &reference).unwrap();
        assert_eq!(result.amplitude_ratio, 0.0);
        assert_eq!(result.score, 0.0);
        assert!(result.nonpriority_ratio.is_none());
    }

    #[test]
    fn test_excessive_nonpriority_motion_is_penalized() {
        let reference = sweep(40, 60.0, 4.0);
        let user = sweep(40, 60.0, 20.0);

        let result = elbow_scorer().score_angles(&user, &reference).unwrap();
        assert!(result.base_score >= 0.4);
        assert!(result.penalized);
        assert!((result.score - result.base_score * 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_empty_inputs() {
        let scorer = elbow_scorer();
        let reference = sweep(10, 30.0, 0.0);

        assert_eq!(scorer.score_angles(&[], &reference).unwrap().score, 0.0);
        assert!(matches!(
            scorer.score_angles(&reference, &[]),
            Err(Error::Scoring(_))
        ));
    }

    #[test]
    fn test_joint_differences() {
        let a = vec![[10.0; ANGLE_DIMS]; 3];
        let mut b = a.clone();
        b[1][Joint::HipL.index()] = 13.0;

        let diffs = joint_differences(&a, &b);
        assert!((diffs[Joint::HipL.index()] - 1.0).abs() < 1e-12);
        assert_eq!(diffs[Joint::HipR.index()], 0.0);
    }
}
