//! Joint-angle extraction from pose landmarks.

use serde::{Deserialize, Serialize};

use crate::geometry::joint_angle_degrees;
use crate::types::{AngleSequence, AngleVector, Joint, Landmark, PoseFrame, ANGLE_DIMS};

/// Which coordinates take part in the 3-point angle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Projection {
    /// Image plane only (x, y); monocular depth is too noisy for joint angles
    #[default]
    Planar,
    /// Full (x, y, z)
    Spatial,
}

/// Converts landmark frames into [`AngleVector`]s.
///
/// Extraction never fails: a joint whose landmarks are missing or non-finite
/// reads 0.0 while the remaining joints are still computed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AngleExtractor {
    projection: Projection,
}

impl AngleExtractor {
    pub fn new(projection: Projection) -> Self {
        Self { projection }
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Angle of a single joint in degrees
    pub fn joint_angle(&self, frame: &PoseFrame, joint: Joint) -> f64 {
        let (a, b, c) = joint.landmarks();
        match (frame.get(a), frame.get(b), frame.get(c)) {
            (Some(a), Some(b), Some(c)) => {
                let angle = joint_angle_degrees(
                    &self.project(a),
                    &self.project(b),
                    &self.project(c),
                );
                if angle.is_finite() {
                    angle
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// All eight joint angles for one frame
    pub fn extract(&self, frame: &PoseFrame) -> AngleVector {
        let mut angles = [0.0; ANGLE_DIMS];
        for joint in Joint::ALL {
            angles[joint.index()] = self.joint_angle(frame, joint);
        }
        angles
    }

    /// Angle sequence for consecutive frames
    pub fn extract_sequence<'a, I>(&self, frames: I) -> AngleSequence
    where
        I: IntoIterator<Item = &'a PoseFrame>,
    {
        frames.into_iter().map(|f| self.extract(f)).collect()
    }

    /// Angle sequence for a raw stream, dropping frames without a detection
    pub fn extract_detected<'a, I>(&self, frames: I) -> AngleSequence
    where
        I: IntoIterator<Item = &'a Option<PoseFrame>>,
    {
        frames
            .into_iter()
            .flatten()
            .map(|f| self.extract(f))
            .collect()
    }

    fn project(&self, lm: &Landmark) -> nalgebra::Vector3<f64> {
        match self.projection {
            Projection::Planar => lm.to_planar_vector(),
            Projection::Spatial => lm.to_vector(),
        }
    }
}

/// Planar angles for one frame
pub fn extract_angles(frame: &PoseFrame) -> AngleVector {
    AngleExtractor::default().extract(frame)
}

/// Planar angles for a frame sequence
pub fn compute_angle_sequence(frames: &[PoseFrame]) -> AngleSequence {
    AngleExtractor::default().extract_sequence(frames)
}

/// One joint's values across a sequence
pub fn joint_column(angles: &[AngleVector], joint: Joint) -> Vec<f64> {
    angles.iter().map(|v| v[joint.index()]).collect()
}

/// Swap every left/right joint pair
pub fn mirror_vector(v: &AngleVector) -> AngleVector {
    let mut out = [0.0; ANGLE_DIMS];
    for joint in Joint::ALL {
        out[joint.mirrored().index()] = v[joint.index()];
    }
    out
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by `n`)
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}
