//! End-of-session statistics.

use serde::{Deserialize, Serialize};

pub const EXCELLENT_THRESHOLD: f64 = 0.8;
pub const GOOD_THRESHOLD: f64 = 0.5;
/// Half-to-half mean change needed to call a trend
pub const TREND_MARGIN: f64 = 0.1;
pub const TREND_MIN_REPS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    /// Compare the mean of the first half against the second half
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.len() < TREND_MIN_REPS {
            return Trend::Stable;
        }
        let (first, second) = scores.split_at(scores.len() / 2);
        let first_mean = mean(first);
        let second_mean = mean(second);

        if second_mean > first_mean + TREND_MARGIN {
            Trend::Improving
        } else if second_mean < first_mean - TREND_MARGIN {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_reps: usize,
    pub average_score: f64,
    /// score ≥ 0.8
    pub excellent_reps: usize,
    /// 0.5 ≤ score < 0.8. Excellent reps are not counted here, so the
    /// three bands partition `total_reps`.
    pub good_reps: usize,
    /// score < 0.5
    pub poor_reps: usize,
    pub best_score: f64,
    pub worst_score: f64,
    pub trend: Trend,
}

impl SessionSummary {
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self::empty();
        }

        let mut excellent_reps = 0;
        let mut good_reps = 0;
        let mut poor_reps = 0;
        for &s in scores {
            if s >= EXCELLENT_THRESHOLD {
                excellent_reps += 1;
            } else if s >= GOOD_THRESHOLD {
                good_reps += 1;
            } else {
                poor_reps += 1;
            }
        }

        Self {
            total_reps: scores.len(),
            average_score: mean(scores),
            excellent_reps,
            good_reps,
            poor_reps,
            best_score: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            worst_score: scores.iter().copied().fold(f64::INFINITY, f64::min),
            trend: Trend::from_scores(scores),
        }
    }

    pub fn empty() -> Self {
        Self {
            total_reps: 0,
            average_score: 0.0,
            excellent_reps: 0,
            good_reps: 0,
            poor_reps: 0,
            best_score: 0.0,
            worst_score: 0.0,
            trend: Trend::Stable,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
