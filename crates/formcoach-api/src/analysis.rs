//! Session-less pose analysis.
//!
//! Compares a user recording with a trainer recording directly: no template
//! cycle, no priority weights, no gates. Useful for one-off checks of a clip.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use formcoach_core::{AngleExtractor, Error, Joint, PoseFrame, Result};
use formcoach_motion::{
    angle_similarity, condition, dtw_distance, joint_differences, total_motion_amplitude,
};

/// Coarse grading of a standalone score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormBand {
    /// score ≥ 0.8
    Excellent,
    /// 0.6 ≤ score < 0.8
    Good,
    /// 0.4 ≤ score < 0.6
    Fair,
    /// score < 0.4
    Poor,
}

impl FormBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            FormBand::Excellent
        } else if score >= 0.6 {
            FormBand::Good
        } else if score >= 0.4 {
            FormBand::Fair
        } else {
            FormBand::Poor
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FormBand::Excellent => "Excellent form!",
            FormBand::Good => "Good form, keep it up!",
            FormBand::Fair => "Not bad, try to improve your form",
            FormBand::Poor => "Focus on matching the trainer's movement",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandaloneAnalysis {
    pub score: f64,
    pub band: FormBand,
    pub feedback: String,
    /// Mean absolute angle difference per joint, keyed by joint token
    pub joint_analysis: BTreeMap<String, f64>,
    pub motion_amplitude: f64,
    pub trainer_amplitude: f64,
}

/// Score `user_frames` against `trainer_frames` with unweighted DTW.
///
/// Both sequences are smoothed and the user's is resampled to the trainer's
/// length before alignment.
pub fn analyze_standalone(
    user_frames: &[PoseFrame],
    trainer_frames: &[PoseFrame],
) -> Result<StandaloneAnalysis> {
    if user_frames.is_empty() {
        return Err(Error::InvalidInput("no user frames supplied".into()));
    }
    if trainer_frames.is_empty() {
        return Err(Error::InvalidInput("no trainer frames supplied".into()));
    }

    let extractor = AngleExtractor::default();
    let trainer_raw = extractor.extract_sequence(trainer_frames);
    let user_raw = extractor.extract_sequence(user_frames);

    let trainer = condition(&trainer_raw, trainer_raw.len());
    let user = condition(&user_raw, trainer.len());

    let distance = dtw_distance(&user, &trainer, None);
    let score = angle_similarity(distance);
    let band = FormBand::from_score(score);
    debug!(distance, score, ?band, "standalone analysis");

    let diffs = joint_differences(&user, &trainer);
    let joint_analysis = Joint::ALL
        .iter()
        .map(|j| (j.token().to_string(), diffs[j.index()]))
        .collect();

    Ok(StandaloneAnalysis {
        score,
        band,
        feedback: band.message().to_string(),
        joint_analysis,
        motion_amplitude: total_motion_amplitude(&user_raw),
        trainer_amplitude: total_motion_amplitude(&trainer_raw),
    })
}
