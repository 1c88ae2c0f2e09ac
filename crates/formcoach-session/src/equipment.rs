//! Equipment check: is the user holding a weight?
//!
//! Once both wrists have been in frame for a warmup period, crops around the
//! left wrist are classified at a fixed interval. A majority vote over a fixed
//! number of samples decides; an equipped verdict latches for the rest of the
//! session, anything else restarts sampling.

use std::collections::HashMap;
use std::sync::Arc;

use formcoach_core::{PoseFrame, PoseLandmark, Result, Side, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Label recorded for samples below the confidence floor
pub const UNCERTAIN_LABEL: &str = "uncertain";

/// Pixel rectangle around a wrist in the current camera image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub side: Side,
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRegion {
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }
}

/// Classifier output for one crop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    /// Probability of `label` in [0, 1]
    pub confidence: f64,
}

/// Visual classifier for the object held at a wrist.
///
/// Implementations own the camera image; the detector only tells them which
/// region of the latest image to look at.
pub trait EquipmentClassifier: Send + Sync {
    fn classify(&self, region: &CropRegion) -> Result<Classification>;
}

/// Equipment check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentConfig {
    /// Both wrists must stay in frame this long before sampling
    pub warmup_secs: f64,
    pub sample_interval_secs: f64,
    /// Samples per majority vote
    pub num_samples: usize,
    /// Samples below this confidence are recorded as uncertain
    pub confidence_threshold: f64,
    /// Labels that count as holding equipment
    pub equipped_labels: Vec<String>,
    /// Camera image size used to map normalized landmarks to pixels
    pub frame_width: u32,
    pub frame_height: u32,
    /// Half-size of the square crop around a wrist, in pixels
    pub crop_margin_px: u32,
}

impl Default for EquipmentConfig {
    fn default() -> Self {
        Self {
            warmup_secs: 5.0,
            sample_interval_secs: 2.0,
            num_samples: 5,
            confidence_threshold: 0.60,
            equipped_labels: vec!["dumbbell".to_string(), "bottle".to_string()],
            frame_width: 640,
            frame_height: 480,
            crop_margin_px: 40,
        }
    }
}

/// Stateful majority-vote equipment detector
pub struct EquipmentDetector {
    config: EquipmentConfig,
    classifier: Option<Arc<dyn EquipmentClassifier>>,
    visible_since: Option<Timestamp>,
    window_active: bool,
    samples: Vec<String>,
    last_sample_at: Option<Timestamp>,
    equipped: bool,
}

impl EquipmentDetector {
    pub fn new(config: EquipmentConfig, classifier: Option<Arc<dyn EquipmentClassifier>>) -> Self {
        Self {
            config,
            classifier,
            visible_since: None,
            window_active: false,
            samples: Vec::new(),
            last_sample_at: None,
            equipped: false,
        }
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn is_equipped(&self) -> bool {
        self.equipped
    }

    /// Labels collected in the current voting window
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Feed one tick; returns whether equipment has been confirmed.
    ///
    /// Ticks without a detected pose leave the state untouched.
    pub fn update(&mut self, frame: Option<&PoseFrame>, now: Timestamp) -> bool {
        if self.equipped {
            return true;
        }
        let Some(frame) = frame else {
            return self.equipped;
        };

        if both_wrists_visible(frame) {
            match self.visible_since {
                None => self.visible_since = Some(now),
                Some(since) => {
                    if !self.window_active && now.secs_since(since) >= self.config.warmup_secs {
                        self.window_active = true;
                        self.samples.clear();
                        self.last_sample_at = Some(now);
                        debug!("equipment sampling window opened");
                    }
                }
            }
        } else {
            self.reset();
        }

        if self.window_active && self.samples.len() < self.config.num_samples {
            self.maybe_sample(frame, now);
        }

        if self.window_active && self.samples.len() >= self.config.num_samples {
            self.window_active = false;
            let verdict = majority(&self.samples);
            info!(verdict = %verdict, samples = ?self.samples, "equipment vote");
            if self.config.equipped_labels.iter().any(|l| *l == verdict) {
                self.equipped = true;
                return true;
            }
        }
        false
    }

    fn maybe_sample(&mut self, frame: &PoseFrame, now: Timestamp) {
        let due = self
            .last_sample_at
            .map_or(true, |t| now.secs_since(t) >= self.config.sample_interval_secs);
        if !due {
            return;
        }
        self.last_sample_at = Some(now);

        let (Some(classifier), Some(region)) = (&self.classifier, self.wrist_region(frame, Side::Left))
        else {
            return;
        };

        match classifier.classify(&region) {
            Ok(c) => {
                let label = if c.confidence >= self.config.confidence_threshold {
                    c.label
                } else {
                    UNCERTAIN_LABEL.to_string()
                };
                debug!(sample = self.samples.len() + 1, label = %label, confidence = c.confidence, "equipment sample");
                self.samples.push(label);
            }
            Err(e) => warn!("Equipment classifier error: {}", e),
        }
    }

    /// Square crop around a wrist, clipped to the image
    pub fn wrist_region(&self, frame: &PoseFrame, side: Side) -> Option<CropRegion> {
        let landmark = match side {
            Side::Left => PoseLandmark::LeftWrist,
            Side::Right => PoseLandmark::RightWrist,
        };
        let wrist = frame.get(landmark)?;
        let (w, h) = (self.config.frame_width as i64, self.config.frame_height as i64);
        let m = self.config.crop_margin_px as i64;
        let x = (wrist.x * w as f64) as i64;
        let y = (wrist.y * h as f64) as i64;

        Some(CropRegion {
            side,
            x1: (x - m).clamp(0, w) as u32,
            y1: (y - m).clamp(0, h) as u32,
            x2: (x + m).clamp(0, w) as u32,
            y2: (y + m).clamp(0, h) as u32,
        })
    }

    /// Forget warmup and samples (equipped verdicts are kept)
    pub fn reset(&mut self) {
        self.visible_since = None;
        self.window_active = false;
        self.samples.clear();
        self.last_sample_at = None;
    }
}

impl std::fmt::Debug for EquipmentDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EquipmentDetector")
            .field("has_classifier", &self.has_classifier())
            .field("window_active", &self.window_active)
            .field("samples", &self.samples)
            .field("equipped", &self.equipped)
            .finish()
    }
}

fn both_wrists_visible(frame: &PoseFrame) -> bool {
    [PoseLandmark::LeftWrist, PoseLandmark::RightWrist]
        .iter()
        .all(|lm| frame.get(*lm).map_or(false, |p| p.in_frame()))
}

/// Most common label; ties go to the label seen first
fn majority(labels: &[String]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label.as_str()).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for label in labels {
        let count = counts[label.as_str()];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((label.as_str(), count));
        }
    }
    best.map(|(l, _)| l.to_string())
        .unwrap_or_else(|| UNCERTAIN_LABEL.to_string())
}
