//! Rep segmentation over a 1-D angle signal.
//!
//! A hysteresis state machine: the signal is smoothed by a short trailing
//! moving average, then a cycle closes each time it rises above
//! `high + hysteresis` and falls back below `low - hysteresis`.

use std::collections::VecDeque;

use formcoach_core::{joint_column, variance, AngleVector, Joint, RepSegment};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amplitude::percentile;

/// Segmenter configuration
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Trailing moving-average window
    pub window: usize,
    /// Lower percentile for the low threshold
    pub low_percentile: f64,
    /// Upper percentile for the high threshold
    pub high_percentile: f64,
    /// Floor on the estimated amplitude (degrees)
    pub min_amplitude: f64,
    /// Hysteresis as a fraction of amplitude
    pub hysteresis_ratio: f64,
    /// Floor on the hysteresis (degrees)
    pub min_hysteresis: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            window: 5,
            low_percentile: 15.0,
            high_percentile: 85.0,
            min_amplitude: 20.0,
            hysteresis_ratio: 0.05,
            min_hysteresis: 5.0,
        }
    }
}

/// Thresholds adapted from a reference signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low: f64,
    pub high: f64,
    pub amplitude: f64,
    pub hysteresis: f64,
}

impl Thresholds {
    pub fn new(low: f64, high: f64, hysteresis: f64) -> Self {
        Self {
            low,
            high,
            amplitude: high - low,
            hysteresis,
        }
    }

    pub fn from_reference(values: &[f64]) -> Self {
        Self::from_reference_with(values, &SegmenterConfig::default())
    }

    pub fn from_reference_with(values: &[f64], config: &SegmenterConfig) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let low = percentile(values, config.low_percentile);
        let high = percentile(values, config.high_percentile);
        let amplitude = (high - low).max(config.min_amplitude);
        Self {
            low,
            high,
            amplitude,
            hysteresis: (config.hysteresis_ratio * amplitude).max(config.min_hysteresis),
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) * 0.5
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: 40.0,
            high: 140.0,
            amplitude: 20.0,
            hysteresis: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmenterState {
    Idle,
    Down,
    Up,
}

/// Incremental cycle detector
#[derive(Debug, Clone)]
pub struct RepSegmenter {
    window: usize,
    buffer: VecDeque<f64>,
    state: SegmenterState,
    thresholds: Thresholds,
    pending_start: Option<usize>,
    segments: Vec<RepSegment>,
}

impl RepSegmenter {
    pub fn new(thresholds: Thresholds) -> Self {
        Self::with_window(thresholds, SegmenterConfig::default().window)
    }

    pub fn with_window(thresholds: Thresholds, window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            buffer: VecDeque::with_capacity(window),
            state: SegmenterState::Idle,
            thresholds,
            pending_start: None,
            segments: Vec::new(),
        }
    }

    pub fn state(&self) -> SegmenterState {
        self.state
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Closed cycles so far, in detection order
    pub fn segments(&self) -> &[RepSegment] {
        &self.segments
    }

    fn smooth(&mut self, value: f64) -> f64 {
        if self.buffer.len() == self.window {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
        self.buffer.iter().sum::<f64>() / self.buffer.len() as f64
    }

    /// Feed one sample; returns the cycle it closes, if any
    pub fn update(&mut self, index: usize, value: f64) -> Option<RepSegment> {
        let val = self.smooth(value);
        let t = self.thresholds;

        match self.state {
            SegmenterState::Idle => {
                self.pending_start = Some(index);
                self.state = if val >= t.midpoint() {
                    SegmenterState::Up
                } else {
                    SegmenterState::Down
                };
                None
            }
            SegmenterState::Down => {
                if val >= t.high + t.hysteresis {
                    self.state = SegmenterState::Up;
                }
                None
            }
            SegmenterState::Up => {
                if val > t.low - t.hysteresis {
                    return None;
                }
                self.state = SegmenterState::Down;
                let closed = self.pending_start.map(|start| RepSegment::new(start, index));
                self.pending_start = Some(index);
                if let Some(seg) = closed {
                    self.segments.push(seg);
                }
                closed
            }
        }
    }

    /// Run over a whole signal and return every closed cycle
    pub fn segment(mut self, values: &[f64]) -> Vec<RepSegment> {
        for (i, &v) in values.iter().enumerate() {
            self.update(i, v);
        }
        self.segments
    }
}

/// The reference cycle carved out of a template recording
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemplateCycle {
    /// Closed index range into the recording
    pub segment: RepSegment,
    /// Channel the segmenter ran on
    pub channel: Joint,
    pub thresholds: Thresholds,
    /// False when no usable cycle was found and the full recording is used
    pub detected: bool,
}

/// Pick the highest-variance hinge joint (first wins ties)
pub fn dominant_channel(angles: &[AngleVector]) -> Joint {
    let mut best = Joint::HINGES[0];
    let mut best_var = f64::NEG_INFINITY;
    for joint in Joint::HINGES {
        let v = variance(&joint_column(angles, joint));
        if v > best_var {
            best = joint;
            best_var = v;
        }
    }
    best
}

/// Carve a single cycle from a template's raw angle sequence.
///
/// Segments on the dominant hinge channel, keeps the longest closed cycle
/// (earliest on ties) and falls back to the whole sequence when that cycle
/// spans fewer than three steps.
pub fn select_template_cycle(angles: &[AngleVector]) -> TemplateCycle {
    let full = RepSegment::new(0, angles.len().saturating_sub(1));
    let channel = dominant_channel(angles);
    let signal = joint_column(angles, channel);
    let thresholds = Thresholds::from_reference(&signal);

    let segments = RepSegmenter::new(thresholds).segment(&signal);
    let longest = segments
        .iter()
        .copied()
        .fold(None::<RepSegment>, |best, seg| match best {
            Some(b) if b.duration() >= seg.duration() => Some(b),
            _ => Some(seg),
        });

    let chosen = longest
        .map(|seg| RepSegment::new(seg.start, seg.end.min(full.end)))
        .filter(|seg| seg.end > seg.start + 2);

    debug!(
        channel = %channel,
        cycles = segments.len(),
        chosen = ?chosen,
        "template cycle selection"
    );

    TemplateCycle {
        segment: chosen.unwrap_or(full),
        channel,
        thresholds,
        detected: chosen.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcoach_core::ANGLE_DIMS;

    fn sinusoid(n: usize, period: f64) -> Vec<f64> {
        (0..n)
            .map(|i| 90.0 + 70.0 * (std::f64::consts::TAU * i as f64 / period).sin())
            .collect()
    }

    #[test]
    fn test_thresholds_from_reference() {
        let t = Thresholds::from_reference(&[]);
        assert_eq!(t, Thresholds::default());

        let flat = Thresholds::from_reference(&[100.0; 10]);
        assert_eq!(flat.amplitude, 20.0);
        assert_eq!(flat.hysteresis, 5.0);

        let values: Vec<f64> = (0..=100).map(|i| i as f64 * 2.0).collect();
        let wide = Thresholds::from_reference(&values);
        assert!((wide.low - 30.0).abs() < 1e-9);
        assert!((wide.high - 170.0).abs() < 1e-9);
        assert!((wide.hysteresis - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_sinusoid_yields_cycles() {
        let signal = sinusoid(100, 50.0);
        let segments = RepSegmenter::new(Thresholds::new(40.0, 140.0, 5.0)).segment(&signal);

        assert!(!segments.is_empty());
        for seg in &segments {
            assert!(seg.end > seg.start);
        }
        // Consecutive cycles share their boundary index.
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_flat_signal_never_closes() {
        let mut seg = RepSegmenter::new(Thresholds::new(40.0, 140.0, 5.0));
        for i in 0..50 {
            assert!(seg.update(i, 90.0).is_none());
        }
        assert_eq!(seg.state(), SegmenterState::Up);
    }

    fn triangle(n: usize, period: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let phase = (i % period) as f64 / period as f64;
                if phase < 0.5 {
                    20.0 + 280.0 * phase
                } else {
                    160.0 - 280.0 * (phase - 0.5)
                }
            })
            .collect()
    }

    #[test]
    fn test_template_cycle_uses_dominant_channel() {
        let knee = triangle(120, 60);
        let angles: Vec<AngleVector> = knee
            .iter()
            .enumerate()
            .map(|(i, &k)| {
                let mut v = [170.0; ANGLE_DIMS];
                v[Joint::KneeR.index()] = k;
                v[Joint::ElbowL.index()] = 160.0 + (i % 3) as f64;
                v
            })
            .collect();

        let cycle = select_template_cycle(&angles);
        assert_eq!(cycle.channel, Joint::KneeR);
        assert!(cycle.detected);
        assert!(cycle.segment.end > cycle.segment.start + 2);
        assert!(cycle.segment.end < angles.len());
    }

    #[test]
    fn test_template_cycle_falls_back_to_full_sequence() {
        let angles = vec![[90.0; ANGLE_DIMS]; 12];
        let cycle = select_template_cycle(&angles);
        assert!(!cycle.detected);
        assert_eq!(cycle.segment, RepSegment::new(0, 11));

        let empty = select_template_cycle(&[]);
        assert_eq!(empty.segment, RepSegment::new(0, 0));
    }
}
