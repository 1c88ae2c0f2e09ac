//! Coaching feedback for completed cycles.
//!
//! Rules are evaluated in a fixed order and the first one that fires wins,
//! so every cycle produces exactly one message:
//!
//! 1. Score bands (excellent, good)
//! 2. No motion at all
//! 3. A non-priority joint moving far more than the trainer's
//! 4. Priority range-of-motion shortfall
//! 5. Worst priority joint: range shortfall, then direction by joint family
//! 6. Default encouragement

use std::fmt;

use formcoach_core::{joint_column, mean, AngleVector, Joint, JointFamily};
use formcoach_motion::{joint_range, motion_amplitude, resample, PriorityMask};
use serde::{Deserialize, Serialize};

/// Feedback thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Minimum amplitude considered "moving"
    pub motion_threshold: f64,
    pub good_rep_threshold: f64,
    pub excellent_rep_threshold: f64,
    /// Per-joint range above which non-priority motion is considered vigorous
    pub vigorous_motion_threshold: f64,
    /// Non-priority joint range relative to the trainer's that triggers a warning
    pub wrong_motion_ratio: f64,
    pub move_more_ratio: f64,
    pub move_further_ratio: f64,
    pub joint_more_ratio: f64,
    pub joint_further_ratio: f64,
    /// Frames considered by the between-cycle hint
    pub hint_window: usize,
    pub hint_start_threshold: f64,
    pub hint_more_threshold: f64,
    /// How long a message stays on display
    pub display_secs: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            motion_threshold: 0.02,
            good_rep_threshold: 0.5,
            excellent_rep_threshold: 0.8,
            vigorous_motion_threshold: 0.25,
            wrong_motion_ratio: 2.0,
            move_more_ratio: 0.3,
            move_further_ratio: 0.6,
            joint_more_ratio: 0.4,
            joint_further_ratio: 0.7,
            hint_window: 10,
            hint_start_threshold: 0.02,
            hint_more_threshold: 0.05,
            display_secs: 3.0,
        }
    }
}

/// Which rule produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackKind {
    Excellent,
    Good,
    StartMoving,
    StopMoving(Joint),
    MoveMore,
    MoveFurther,
    MoveJointMore(Joint),
    ExtendJoint(Joint),
    Straighten(Joint),
    Bend(Joint),
    Lower(Joint),
    Raise(Joint),
    AdjustPosition(Joint),
    KeepGoing,
}

impl FeedbackKind {
    pub fn message(&self) -> String {
        match self {
            FeedbackKind::Excellent => "Excellent rep! Perfect form!".to_string(),
            FeedbackKind::Good => "Good rep! Keep it up!".to_string(),
            FeedbackKind::StartMoving => "Start moving! Follow the trainer's motion".to_string(),
            FeedbackKind::StopMoving(j) => format!(
                "Stop moving your {}! Focus on the exercise",
                j.display_name()
            ),
            FeedbackKind::MoveMore => "Move more! Increase your range of motion".to_string(),
            FeedbackKind::MoveFurther => "Move further! Extend your range".to_string(),
            FeedbackKind::MoveJointMore(j) => format!("Move your {} more!", j.display_name()),
            FeedbackKind::ExtendJoint(j) => format!("Extend your {} further!", j.display_name()),
            FeedbackKind::Straighten(j) => format!("Straighten your {} more!", j.display_name()),
            FeedbackKind::Bend(j) => format!("Bend your {} more!", j.display_name()),
            FeedbackKind::Lower(j) => format!("Lower your {} more!", j.display_name()),
            FeedbackKind::Raise(j) => format!("Raise your {} more!", j.display_name()),
            FeedbackKind::AdjustPosition(j) => {
                format!("Adjust your {} position!", j.display_name())
            }
            FeedbackKind::KeepGoing => "Keep going! You're doing well".to_string(),
        }
    }

    /// Positive messages; everything else is corrective
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            FeedbackKind::Excellent | FeedbackKind::Good | FeedbackKind::KeepGoing
        )
    }
}

/// One coaching message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub kind: FeedbackKind,
    pub message: String,
}

impl From<FeedbackKind> for Feedback {
    fn from(kind: FeedbackKind) -> Self {
        Self {
            message: kind.message(),
            kind,
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Everything the generator looks at for one cycle
#[derive(Debug, Clone, Copy)]
pub struct FeedbackInput<'a> {
    /// User angles over the scored window (unsmoothed)
    pub user_angles: &'a [AngleVector],
    /// Reference cycle angles
    pub template_angles: &'a [AngleVector],
    /// Priority amplitude of the user window
    pub user_amplitude: f64,
    /// Priority amplitude of the reference cycle
    pub template_amplitude: f64,
    pub score: f64,
    pub mask: &'a PriorityMask,
}

/// Rule-based coaching message generator
#[derive(Debug, Clone, Default)]
pub struct FeedbackGenerator {
    config: FeedbackConfig,
}

impl FeedbackGenerator {
    pub fn new(config: FeedbackConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    /// Pick the single message for a completed cycle
    pub fn analyze(&self, input: &FeedbackInput<'_>) -> Feedback {
        self.classify(input).into()
    }

    fn classify(&self, input: &FeedbackInput<'_>) -> FeedbackKind {
        let c = &self.config;

        if input.score >= c.excellent_rep_threshold {
            return FeedbackKind::Excellent;
        }
        if input.score >= c.good_rep_threshold {
            return FeedbackKind::Good;
        }
        if input.user_amplitude < c.motion_threshold {
            return FeedbackKind::StartMoving;
        }

        let user = self.aligned_user(input);

        if input.user_amplitude >= c.motion_threshold * 2.0 {
            if let Some(joint) = self.wrong_body_part(&user, input) {
                return FeedbackKind::StopMoving(joint);
            }
        }

        if input.user_amplitude < input.template_amplitude * c.move_more_ratio {
            return FeedbackKind::MoveMore;
        }
        if input.user_amplitude < input.template_amplitude * c.move_further_ratio {
            return FeedbackKind::MoveFurther;
        }

        self.joint_movement(&user, input)
            .unwrap_or(FeedbackKind::KeepGoing)
    }

    /// User angles stretched to the template length for per-joint comparison
    fn aligned_user(&self, input: &FeedbackInput<'_>) -> Vec<AngleVector> {
        if input.user_angles.len() == input.template_angles.len() {
            input.user_angles.to_vec()
        } else {
            resample(input.user_angles, input.template_angles.len())
        }
    }

    fn wrong_body_part(&self, user: &[AngleVector], input: &FeedbackInput<'_>) -> Option<Joint> {
        let mut ranges: Vec<(Joint, f64)> = input
            .mask
            .inverted()
            .joints()
            .map(|j| (j, joint_range(user, j)))
            .collect();
        ranges.sort_by(|a, b| b.1.total_cmp(&a.1));

        ranges.into_iter().find_map(|(joint, range)| {
            let trainer_range = joint_range(input.template_angles, joint);
            (range > self.config.vigorous_motion_threshold
                && range > trainer_range * self.config.wrong_motion_ratio)
                .then_some(joint)
        })
    }

    fn joint_movement(&self, user: &[AngleVector], input: &FeedbackInput<'_>) -> Option<FeedbackKind> {
        if !input.mask.any() || user.is_empty() || input.template_angles.is_empty() {
            return None;
        }

        // Largest mean deviation across all joints, first wins ties.
        let mut worst = Joint::ALL[0];
        let mut worst_diff = f64::NEG_INFINITY;
        for joint in Joint::ALL {
            let diffs: Vec<f64> = user
                .iter()
                .zip(input.template_angles)
                .map(|(u, t)| (u[joint.index()] - t[joint.index()]).abs())
                .collect();
            let d = mean(&diffs);
            if d > worst_diff {
                worst = joint;
                worst_diff = d;
            }
        }

        let user_range = joint_range(user, worst);
        let trainer_range = joint_range(input.template_angles, worst);
        if user_range < trainer_range * self.config.joint_more_ratio {
            return Some(FeedbackKind::MoveJointMore(worst));
        }
        if user_range < trainer_range * self.config.joint_further_ratio {
            return Some(FeedbackKind::ExtendJoint(worst));
        }

        let user_avg = mean(&joint_column(user, worst));
        let trainer_avg = mean(&joint_column(input.template_angles, worst));
        Some(direction_for(worst, user_avg, trainer_avg))
    }

    /// Score-tiered encouragement line
    pub fn encouragement(score: f64) -> &'static str {
        if score >= 0.9 {
            "Perfect! You're a natural!"
        } else if score >= 0.8 {
            "Amazing form! Keep it up!"
        } else if score >= 0.7 {
            "Great job! You're improving!"
        } else if score >= 0.6 {
            "Good work! Almost there!"
        } else if score >= 0.5 {
            "Not bad! Keep practicing!"
        } else if score >= 0.3 {
            "Keep trying! You'll get it!"
        } else {
            "Don't give up! Practice makes perfect!"
        }
    }

    /// Between-cycle nudge from the most recent frames.
    ///
    /// Looks at the last `hint_window` angle vectors; `None` when there are
    /// too few or the user is moving enough.
    pub fn continuous_hint(&self, recent: &[AngleVector], mask: &PriorityMask) -> Option<&'static str> {
        let c = &self.config;
        if recent.len() < c.hint_window {
            return None;
        }
        let window = &recent[recent.len() - c.hint_window..];
        let amplitude = motion_amplitude(window, Some(&mask.amplitude_mask()));

        if amplitude < c.hint_start_threshold {
            Some("Start moving! Follow the trainer")
        } else if amplitude < c.hint_more_threshold {
            Some("Move more! Increase your range")
        } else {
            None
        }
    }

    /// On-screen form of a message
    pub fn format_for_display(&self, message: &str, score: Option<f64>) -> String {
        match score {
            Some(s) if s >= self.config.good_rep_threshold => format!("Target: {message}"),
            Some(_) => format!("Tip: {message}"),
            None => message.to_string(),
        }
    }
}

fn direction_for(joint: Joint, user_avg: f64, trainer_avg: f64) -> FeedbackKind {
    let (margin, above, below): (f64, fn(Joint) -> FeedbackKind, fn(Joint) -> FeedbackKind) =
        match joint.family() {
            JointFamily::Elbow => (20.0, FeedbackKind::Straighten, FeedbackKind::Bend),
            JointFamily::Knee => (15.0, FeedbackKind::Bend, FeedbackKind::Straighten),
            JointFamily::Shoulder | JointFamily::Hip => {
                (20.0, FeedbackKind::Lower, FeedbackKind::Raise)
            }
        };

    if user_avg > trainer_avg + margin {
        above(joint)
    } else if user_avg < trainer_avg - margin {
        below(joint)
    } else {
        FeedbackKind::AdjustPosition(joint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcoach_core::ANGLE_DIMS;
    use formcoach_motion::build_priority_mask;

    fn sweep(n: usize, base: f64, joint: Joint, amp: f64) -> Vec<AngleVector> {
        (0..n)
            .map(|i| {
                let mut v = [base; ANGLE_DIMS];
                v[joint.index()] = base + amp * (i as f64 / n as f64 * 6.28).sin();
                v
            })
            .collect()
    }

    fn input<'a>(
        user: &'a [AngleVector],
        template: &'a [AngleVector],
        mask: &'a PriorityMask,
        score: f64,
    ) -> FeedbackInput<'a> {
        FeedbackInput {
            user_angles: user,
            template_angles: template,
            user_amplitude: motion_amplitude(user, Some(mask)),
            template_amplitude: motion_amplitude(template, Some(mask)),
            score,
            mask,
        }
    }

    #[test]
    fn test_score_bands_take_precedence() {
        let gen = FeedbackGenerator::default();
        let mask = build_priority_mask(&["elbow"]).unwrap();
        let still = vec![[90.0; ANGLE_DIMS]; 20];

        let fb = gen.analyze(&input(&still, &still, &mask, 0.85));
        assert_eq!(fb.kind, FeedbackKind::Excellent);
        assert_eq!(fb.message, "Excellent rep! Perfect form!");

        let fb = gen.analyze(&input(&still, &still, &mask, 0.5));
        assert_eq!(fb.kind, FeedbackKind::Good);
    }

    #[test]
    fn test_static_user_is_told_to_start_moving() {
        let gen = FeedbackGenerator::default();
        let mask = build_priority_mask(&["elbow"]).unwrap();
        let template = sweep(30, 90.0, Joint::ElbowL, 50.0);
        let still = vec![[90.0; ANGLE_DIMS]; 30];

        let fb = gen.analyze(&input(&still, &template, &mask, 0.0));
        assert_eq!(fb.kind, FeedbackKind::StartMoving);
    }

    #[test]
    fn test_wrong_body_part() {
        let gen = FeedbackGenerator::default();
        let mask = build_priority_mask(&["elbow"]).unwrap();
        let template = sweep(30, 90.0, Joint::ElbowL, 50.0);
        let mut user = sweep(30, 90.0, Joint::ElbowL, 10.0);
        for (i, v) in user.iter_mut().enumerate() {
            v[Joint::KneeR.index()] = 150.0 + (i % 5) as f64 * 6.0;
        }

        let fb = gen.analyze(&input(&user, &template, &mask, 0.1));
        assert_eq!(fb.kind, FeedbackKind::StopMoving(Joint::KneeR));
        assert_eq!(fb.message, "Stop moving your right knee! Focus on the exercise");
    }

    #[test]
    fn test_amplitude_shortfall() {
        let gen = FeedbackGenerator::default();
        let mask = build_priority_mask(&["elbow"]).unwrap();
        let template = sweep(30, 90.0, Joint::ElbowL, 50.0);

        let small = sweep(30, 90.0, Joint::ElbowL, 10.0);
        let fb = gen.analyze(&input(&small, &template, &mask, 0.1));
        assert_eq!(fb.kind, FeedbackKind::MoveMore);

        let medium = sweep(30, 90.0, Joint::ElbowL, 22.0);
        let fb = gen.analyze(&input(&medium, &template, &mask, 0.1));
        assert_eq!(fb.kind, FeedbackKind::MoveFurther);
    }

    #[test]
    fn test_joint_direction_rules() {
        let gen = FeedbackGenerator::default();
        let mask = build_priority_mask(&["elbow"]).unwrap();
        let template = sweep(30, 90.0, Joint::ElbowL, 50.0);
        // Full range but offset 30° straighter than the trainer.
        let user: Vec<AngleVector> = template
            .iter()
            .map(|v| {
                let mut v = *v;
                v[Joint::ElbowL.index()] += 30.0;
                v
            })
            .collect();

        let fb = gen.analyze(&input(&user, &template, &mask, 0.2));
        assert_eq!(fb.kind, FeedbackKind::Straighten(Joint::ElbowL));

        assert_eq!(
            direction_for(Joint::KneeL, 100.0, 80.0),
            FeedbackKind::Bend(Joint::KneeL)
        );
        assert_eq!(
            direction_for(Joint::HipR, 60.0, 90.0),
            FeedbackKind::Raise(Joint::HipR)
        );
        assert_eq!(
            direction_for(Joint::ShoulderL, 95.0, 90.0),
            FeedbackKind::AdjustPosition(Joint::ShoulderL)
        );
    }

    #[test]
    fn test_no_priority_joints_falls_through_to_default() {
        let gen = FeedbackGenerator::default();
        let mask = PriorityMask::none();
        let template = sweep(30, 90.0, Joint::ElbowL, 50.0);
        let fb = gen.analyze(&FeedbackInput {
            user_angles: &template,
            template_angles: &template,
            user_amplitude: 1.0,
            template_amplitude: 0.0,
            score: 0.3,
            mask: &mask,
        });
        assert_eq!(fb.kind, FeedbackKind::KeepGoing);
    }

    #[test]
    fn test_mismatched_lengths_are_resampled() {
        let gen = FeedbackGenerator::default();
        let mask = build_priority_mask(&["elbow"]).unwrap();
        let template = sweep(30, 90.0, Joint::ElbowL, 50.0);
        let user = sweep(45, 90.0, Joint::ElbowL, 50.0);

        let fb = gen.analyze(&input(&user, &template, &mask, 0.3));
        assert!(matches!(fb.kind, FeedbackKind::AdjustPosition(_)));
    }

    #[test]
    fn test_encouragement_tiers() {
        assert_eq!(FeedbackGenerator::encouragement(0.95), "Perfect! You're a natural!");
        assert_eq!(FeedbackGenerator::encouragement(0.65), "Good work! Almost there!");
        assert_eq!(
            FeedbackGenerator::encouragement(0.1),
            "Don't give up! Practice makes perfect!"
        );
    }

    #[test]
    fn test_continuous_hint_and_display() {
        let gen = FeedbackGenerator::default();
        let mask = build_priority_mask(&["elbow"]).unwrap();

        let still = vec![[90.0; ANGLE_DIMS]; 12];
        assert_eq!(
            gen.continuous_hint(&still, &mask),
            Some("Start moving! Follow the trainer")
        );
        assert_eq!(gen.continuous_hint(&still[..5], &mask), None);
        let moving = sweep(12, 90.0, Joint::ElbowR, 30.0);
        assert_eq!(gen.continuous_hint(&moving, &mask), None);

        assert_eq!(gen.format_for_display("Nice", Some(0.7)), "Target: Nice");
        assert_eq!(gen.format_for_display("Bend", Some(0.2)), "Tip: Bend");
        assert_eq!(gen.format_for_display("Hi", None), "Hi");
    }
}
