//! Reference motion templates.

use formcoach_core::{
    average_forward_vector, AngleExtractor, AngleSequence, AngleVector, Error, PoseFrame, Result,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::conditioning::{smooth, DEFAULT_SMOOTHING_WINDOW};
use crate::segmenter::{select_template_cycle, TemplateCycle};

/// A trainer recording reduced to a single reference cycle.
///
/// The full recording is kept for looping playback; scoring uses only the
/// cycle's smoothed angles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionTemplate {
    frames: Vec<PoseFrame>,
    cycle: TemplateCycle,
    angles: AngleSequence,
    forward: Option<Vector3<f64>>,
}

impl MotionTemplate {
    /// Build from detected trainer frames with planar angles
    pub fn from_frames(frames: Vec<PoseFrame>) -> Result<Self> {
        Self::build(frames, &AngleExtractor::default())
    }

    pub fn build(frames: Vec<PoseFrame>, extractor: &AngleExtractor) -> Result<Self> {
        if frames.is_empty() {
            return Err(Error::TemplateUnavailable(
                "recording contains no detected frames".into(),
            ));
        }

        let raw = extractor.extract_sequence(&frames);
        let cycle = select_template_cycle(&raw);
        let cycle_frames = &frames[cycle.segment.start..=cycle.segment.end];

        let angles = smooth(
            &extractor.extract_sequence(cycle_frames),
            DEFAULT_SMOOTHING_WINDOW,
        );
        let forward = average_forward_vector(cycle_frames);

        info!(
            frames = frames.len(),
            cycle_start = cycle.segment.start,
            cycle_end = cycle.segment.end,
            channel = %cycle.channel,
            detected = cycle.detected,
            "template built"
        );

        Ok(Self {
            frames,
            cycle,
            angles,
            forward,
        })
    }

    /// Every frame of the recording, in playback order
    pub fn frames(&self) -> &[PoseFrame] {
        &self.frames
    }

    pub fn cycle(&self) -> &TemplateCycle {
        &self.cycle
    }

    /// Smoothed angles of the reference cycle
    pub fn angles(&self) -> &[AngleVector] {
        &self.angles
    }

    /// Number of samples in the reference cycle
    pub fn cycle_len(&self) -> usize {
        self.angles.len()
    }

    /// First `n` samples of the reference cycle (fewer if the cycle is shorter)
    pub fn prefix(&self, n: usize) -> &[AngleVector] {
        &self.angles[..n.min(self.angles.len())]
    }

    /// Mean torso facing direction over the cycle
    pub fn forward(&self) -> Option<Vector3<f64>> {
        self.forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{arm_frame, curl_frames};
    use formcoach_core::{extract_angles, Joint};

    #[test]
    fn test_arm_frame_elbow_angle() {
        let angles = extract_angles(&arm_frame(0.0, 70.0));
        assert!((angles[Joint::ElbowL.index()] - 70.0).abs() < 1e-3);
    }

    #[test]
    fn test_template_from_curls() {
        let template = MotionTemplate::from_frames(curl_frames(90, 30, 30.0)).unwrap();

        assert_eq!(template.frames().len(), 90);
        assert_eq!(template.cycle().channel, Joint::ElbowL);
        assert!(template.cycle_len() > 3);
        assert!(template.cycle_len() < 90);
        assert!(template.forward().is_some());
        assert_eq!(template.prefix(1000).len(), template.cycle_len());
    }

    #[test]
    fn test_empty_template_is_unavailable() {
        let err = MotionTemplate::from_frames(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::TemplateUnavailable(_)));
    }
}
