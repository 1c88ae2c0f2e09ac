//! Orientation check: is the user facing the same way as the trainer?
//!
//! Two signals must agree. The recent user window, aligned with DTW against
//! the start of the reference cycle, must not read better when left and right
//! are swapped. The user's averaged torso direction must also point within
//! 60° of the trainer's.

use std::sync::Arc;

use formcoach_core::{average_forward_vector, cosine_similarity, AngleExtractor, PoseFrame};
use formcoach_motion::{condition, JointWeights, MirroredAlignment, MotionTemplate};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Orientation check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrientationConfig {
    /// Recent frames retained for the check
    pub window_capacity: usize,
    /// Frames compared against the reference prefix (capped by the cycle length)
    pub min_frames: usize,
    /// Nominal may exceed mirrored by this fraction and still pass.
    ///
    /// The margins are tolerant: a nominal distance slightly worse than the
    /// mirrored one still counts as facing the right way. The stricter
    /// variant, where nominal must beat mirrored by the margin, rejects
    /// symmetric movements whose two distances are nearly equal.
    pub relative_margin: f64,
    /// Nominal may exceed mirrored by this many degrees and still pass.
    /// Tolerant in the same direction as `relative_margin`.
    pub absolute_margin_deg: f64,
    /// Minimum cosine between user and trainer torso directions
    pub min_facing_cosine: f64,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            window_capacity: 36,
            min_frames: 24,
            relative_margin: 0.01,
            absolute_margin_deg: 2.0,
            min_facing_cosine: 0.5,
        }
    }
}

/// Outcome of one orientation evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationVerdict {
    pub aligned: bool,
    pub nominal: f64,
    pub mirrored: f64,
    /// Torso direction agreement; `None` when either direction is undefined
    pub facing_cosine: Option<f64>,
}

/// Compares recent user frames with the start of the reference cycle
#[derive(Debug, Clone)]
pub struct OrientationGate {
    config: OrientationConfig,
    template: Arc<MotionTemplate>,
    weights: JointWeights,
    extractor: AngleExtractor,
}

impl OrientationGate {
    pub fn new(config: OrientationConfig, template: Arc<MotionTemplate>, weights: JointWeights) -> Self {
        Self {
            config,
            template,
            weights,
            extractor: AngleExtractor::default(),
        }
    }

    pub fn config(&self) -> &OrientationConfig {
        &self.config
    }

    /// Frames needed before a verdict is possible
    pub fn required_frames(&self) -> usize {
        self.config.min_frames.min(self.template.cycle_len())
    }

    /// Evaluate the most recent frames; `None` until enough are buffered
    pub fn evaluate(&self, recent: &[PoseFrame]) -> Option<OrientationVerdict> {
        let needed = self.required_frames();
        if needed == 0 || recent.len() < needed {
            return None;
        }
        let window = &recent[recent.len() - needed..];
        let reference = self.template.prefix(needed);

        let user = condition(&self.extractor.extract_sequence(window), reference.len());
        let alignment = MirroredAlignment::compute(&user, reference, Some(&self.weights));

        let facing_cosine = match (average_forward_vector(window), self.template.forward()) {
            (Some(u), Some(t)) => Some(cosine_similarity(&u, &t)),
            _ => None,
        };

        Some(OrientationVerdict {
            aligned: self.is_aligned(alignment.nominal, alignment.mirrored, facing_cosine),
            nominal: alignment.nominal,
            mirrored: alignment.mirrored,
            facing_cosine,
        })
    }

    fn is_aligned(&self, nominal: f64, mirrored: f64, facing_cosine: Option<f64>) -> bool {
        let c = &self.config;
        let not_mirrored = nominal <= mirrored * (1.0 + c.relative_margin)
            || nominal <= mirrored + c.absolute_margin_deg;
        let facing = facing_cosine.map_or(true, |cos| cos >= c.min_facing_cosine);
        not_mirrored && facing
    }

    /// Trainer torso direction used for the facing test
    pub fn template_forward(&self) -> Option<Vector3<f64>> {
        self.template.forward()
    }
}
