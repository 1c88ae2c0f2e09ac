//! Live session state machine.
//!
//! ## Phases
//!
//! ```text
//! equipment_check → equipment_confirmed (1 s) ─┐
//!                                              ↓
//!                  orientation_check → orientation_confirmed (1 s)
//!                                              ↓
//!                                      countdown (2 s) → scoring → ended
//! ```
//!
//! Gate decisions and cycle scores are taken only at template loop
//! boundaries. A boundary arms one evaluation on the not-looped → looped
//! transition and is consumed by that evaluation; boundaries seen during a
//! timed hold are discarded on the next phase entry.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use formcoach_core::{PoseFrame, Timestamp};
use formcoach_motion::{
    motion_amplitude, CycleScore, CycleScorer, JointWeights, MotionTemplate, PriorityMask,
    ScoringConfig,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::equipment::{EquipmentClassifier, EquipmentConfig, EquipmentDetector};
use crate::feedback::{Feedback, FeedbackConfig, FeedbackGenerator, FeedbackInput};
use crate::orientation::{OrientationConfig, OrientationGate};

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Loading,
    EquipmentCheck,
    EquipmentConfirmed,
    OrientationCheck,
    OrientationConfirmed,
    Countdown,
    Scoring,
    Ended,
    Error,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Loading => "loading",
            SessionPhase::EquipmentCheck => "equipment_check",
            SessionPhase::EquipmentConfirmed => "equipment_confirmed",
            SessionPhase::OrientationCheck => "orientation_check",
            SessionPhase::OrientationConfirmed => "orientation_confirmed",
            SessionPhase::Countdown => "countdown",
            SessionPhase::Scoring => "scoring",
            SessionPhase::Ended => "ended",
            SessionPhase::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Ended | SessionPhase::Error)
    }

    /// True while the session has a loaded template and accepts ticks
    pub fn is_live(&self) -> bool {
        !self.is_terminal() && *self != SessionPhase::Loading
    }

    /// Coaching banner for the pre-start phases
    pub fn banner(&self) -> Option<&'static str> {
        match self {
            SessionPhase::EquipmentCheck => Some("Pick up your weights to begin"),
            SessionPhase::EquipmentConfirmed => Some("Weights detected!"),
            SessionPhase::OrientationCheck => Some("Face the camera the same way as the trainer"),
            SessionPhase::OrientationConfirmed => Some("Orientation aligned!"),
            SessionPhase::Countdown => Some("Get ready! Starting now..."),
            _ => None,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub require_equipment_check: bool,
    /// Hold on each confirmation banner
    pub confirmation_hold_secs: f64,
    pub countdown_secs: f64,
    pub equipment: EquipmentConfig,
    pub orientation: OrientationConfig,
    pub scoring: ScoringConfig,
    pub feedback: FeedbackConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            require_equipment_check: false,
            confirmation_hold_secs: 1.0,
            countdown_secs: 2.0,
            equipment: EquipmentConfig::default(),
            orientation: OrientationConfig::default(),
            scoring: ScoringConfig::default(),
            feedback: FeedbackConfig::default(),
        }
    }
}

/// One step of the live loop
#[derive(Debug, Clone)]
pub struct Tick {
    pub now: Timestamp,
    /// User pose for this tick; `None` when nobody was detected
    pub frame: Option<PoseFrame>,
    /// The template playback wrapped to its first frame on this tick
    pub template_looped: bool,
}

/// A scored cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepOutcome {
    /// 1-based
    pub rep_number: usize,
    pub score: CycleScore,
    pub feedback: Feedback,
    /// Feedback as shown on screen
    pub display: String,
    pub at: Timestamp,
}

/// What happened during one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickOutcome {
    pub phase: SessionPhase,
    pub phase_changed: bool,
    pub rep: Option<RepOutcome>,
    /// Between-cycle nudge
    pub hint: Option<String>,
    /// The template source must restart from its first frame
    pub restart_template: bool,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub phase_elapsed_secs: f64,
    pub rep_count: usize,
    pub last_score: Option<f64>,
    pub average_score: f64,
    pub last_feedback: Option<String>,
    pub equipment_locked: bool,
    pub orientation_locked: bool,
    pub buffered_frames: usize,
    pub template_cycle_len: usize,
}

/// Drives one live session from ticks
pub struct SessionOrchestrator {
    config: SessionConfig,
    template: Arc<MotionTemplate>,
    scorer: CycleScorer,
    feedback: FeedbackGenerator,
    equipment: EquipmentDetector,
    orientation: OrientationGate,

    phase: SessionPhase,
    phase_entered_at: Timestamp,

    user_buffer: VecDeque<PoseFrame>,
    user_capacity: usize,
    align_buffer: VecDeque<PoseFrame>,

    prev_looped: bool,
    loop_pending: bool,

    equipment_locked: bool,
    orientation_aligned: bool,
    orientation_locked: bool,
    classifier_warned: bool,

    rep_scores: Vec<f64>,
    last_message: Option<(String, Timestamp)>,
}

impl SessionOrchestrator {
    pub fn new(
        config: SessionConfig,
        template: Arc<MotionTemplate>,
        weights: JointWeights,
        mask: PriorityMask,
        now: Timestamp,
    ) -> Self {
        let phase = if config.require_equipment_check {
            SessionPhase::EquipmentCheck
        } else {
            SessionPhase::OrientationCheck
        };
        let user_capacity = (2 * template.cycle_len()).max(1);

        info!(
            phase = %phase,
            cycle_len = template.cycle_len(),
            "session orchestrator started"
        );

        Self {
            scorer: CycleScorer::with_config(config.scoring.clone(), weights, mask),
            feedback: FeedbackGenerator::new(config.feedback.clone()),
            equipment: EquipmentDetector::new(config.equipment.clone(), None),
            orientation: OrientationGate::new(config.orientation.clone(), template.clone(), weights),
            align_buffer: VecDeque::with_capacity(config.orientation.window_capacity),
            config,
            template,
            phase,
            phase_entered_at: now,
            user_buffer: VecDeque::with_capacity(user_capacity),
            user_capacity,
            prev_looped: false,
            loop_pending: false,
            equipment_locked: false,
            orientation_aligned: false,
            orientation_locked: false,
            classifier_warned: false,
            rep_scores: Vec::new(),
            last_message: None,
        }
    }

    /// Attach the equipment classifier collaborator
    pub fn with_classifier(mut self, classifier: Arc<dyn EquipmentClassifier>) -> Self {
        self.equipment = EquipmentDetector::new(self.config.equipment.clone(), Some(classifier));
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn template(&self) -> &Arc<MotionTemplate> {
        &self.template
    }

    pub fn scorer(&self) -> &CycleScorer {
        &self.scorer
    }

    pub fn feedback_generator(&self) -> &FeedbackGenerator {
        &self.feedback
    }

    pub fn rep_scores(&self) -> &[f64] {
        &self.rep_scores
    }

    pub fn buffered_frames(&self) -> usize {
        self.user_buffer.len()
    }

    /// Process one tick of the live loop
    pub fn tick(&mut self, tick: Tick) -> TickOutcome {
        let now = tick.now;
        let mut outcome = TickOutcome {
            phase: self.phase,
            phase_changed: false,
            rep: None,
            hint: None,
            restart_template: false,
        };
        if !self.phase.is_live() {
            return outcome;
        }
        let start_phase = self.phase;

        if tick.template_looped && !self.prev_looped && !self.loop_pending {
            self.loop_pending = true;
        }
        self.prev_looped = tick.template_looped;

        if let Some(frame) = &tick.frame {
            push_bounded(&mut self.user_buffer, frame.clone(), self.user_capacity);
            push_bounded(
                &mut self.align_buffer,
                frame.clone(),
                self.config.orientation.window_capacity,
            );
        }

        match self.phase {
            SessionPhase::EquipmentCheck => self.equipment_check(tick.frame.as_ref(), now),
            SessionPhase::EquipmentConfirmed => {
                if self.elapsed(now) >= self.config.confirmation_hold_secs {
                    self.enter(SessionPhase::OrientationCheck, now);
                }
            }
            SessionPhase::OrientationCheck => self.orientation_check(tick.frame.is_some(), now),
            SessionPhase::OrientationConfirmed => {
                if self.elapsed(now) >= self.config.confirmation_hold_secs {
                    self.enter(SessionPhase::Countdown, now);
                }
            }
            SessionPhase::Countdown => {
                if self.elapsed(now) >= self.config.countdown_secs {
                    self.user_buffer.clear();
                    self.prev_looped = false;
                    self.enter(SessionPhase::Scoring, now);
                    outcome.restart_template = true;
                    info!("workout started");
                }
            }
            SessionPhase::Scoring => {
                if self.loop_pending {
                    self.loop_pending = false;
                    outcome.rep = Some(self.score_cycle(now));
                } else {
                    outcome.hint = self.continuous_hint(now);
                }
            }
            _ => {}
        }

        outcome.phase = self.phase;
        outcome.phase_changed = self.phase != start_phase;
        outcome
    }

    fn equipment_check(&mut self, frame: Option<&PoseFrame>, now: Timestamp) {
        if !self.equipment.has_classifier() && !self.classifier_warned {
            warn!("Equipment check required but no classifier is available; session is blocked");
            self.classifier_warned = true;
        }

        let equipped = self.equipment.update(frame, now);
        if self.loop_pending {
            self.loop_pending = false;
            debug!(equipped, "equipment gate at loop boundary");
            if equipped {
                self.equipment_locked = true;
                self.enter(SessionPhase::EquipmentConfirmed, now);
            }
        }
    }

    fn orientation_check(&mut self, new_frame: bool, now: Timestamp) {
        if new_frame {
            if let Some(verdict) = self.orientation.evaluate(self.align_buffer.make_contiguous()) {
                self.orientation_aligned = verdict.aligned;
            }
        }

        if self.loop_pending {
            self.loop_pending = false;
            debug!(
                aligned = self.orientation_aligned,
                "orientation gate at loop boundary"
            );
            if self.orientation_aligned {
                self.orientation_locked = true;
                self.enter(SessionPhase::OrientationConfirmed, now);
            }
        }
    }

    fn score_cycle(&mut self, now: Timestamp) -> RepOutcome {
        let user = self.user_buffer.make_contiguous();
        let cycle = match self.scorer.score_frames(user, &self.template) {
            Ok(score) => score,
            Err(e) => {
                warn!("Cycle scoring failed, scoring 0: {}", e);
                CycleScore::zero()
            }
        };
        self.rep_scores.push(cycle.score);

        let window = &user[user.len().saturating_sub(self.template.cycle_len())..];
        let user_angles = self.scorer.extractor().extract_sequence(window);
        let mask = self.scorer.mask().amplitude_mask();
        let feedback = self.feedback.analyze(&FeedbackInput {
            user_angles: &user_angles,
            template_angles: self.template.angles(),
            user_amplitude: motion_amplitude(&user_angles, Some(&mask)),
            template_amplitude: motion_amplitude(self.template.angles(), Some(&mask)),
            score: cycle.score,
            mask: self.scorer.mask(),
        });
        let display = self
            .feedback
            .format_for_display(&feedback.message, Some(cycle.score));
        self.last_message = Some((feedback.message.clone(), now));

        info!(
            rep = self.rep_scores.len(),
            score = cycle.score,
            feedback = %feedback,
            "rep scored"
        );

        RepOutcome {
            rep_number: self.rep_scores.len(),
            score: cycle,
            feedback,
            display,
            at: now,
        }
    }

    fn continuous_hint(&mut self, now: Timestamp) -> Option<String> {
        let display_secs = self.feedback.config().display_secs;
        if let Some((_, at)) = &self.last_message {
            if now.secs_since(*at) < display_secs {
                return None;
            }
        }

        let window = self.feedback.config().hint_window;
        if self.user_buffer.len() < window {
            return None;
        }
        let recent = self.user_buffer.make_contiguous();
        let angles = self
            .scorer
            .extractor()
            .extract_sequence(&recent[recent.len() - window..]);
        let hint = self.feedback.continuous_hint(&angles, self.scorer.mask())?;
        self.last_message = Some((hint.to_string(), now));
        Some(hint.to_string())
    }

    fn enter(&mut self, phase: SessionPhase, now: Timestamp) {
        info!(from = %self.phase, to = %phase, "session phase change");
        self.phase = phase;
        self.phase_entered_at = now;
        self.loop_pending = false;
    }

    fn elapsed(&self, now: Timestamp) -> f64 {
        now.secs_since(self.phase_entered_at)
    }

    /// Close the session; further ticks are ignored
    pub fn end(&mut self, now: Timestamp) {
        if !self.phase.is_terminal() {
            self.enter(SessionPhase::Ended, now);
        }
    }

    pub fn snapshot(&self, now: Timestamp) -> SessionSnapshot {
        let rep_count = self.rep_scores.len();
        SessionSnapshot {
            phase: self.phase,
            phase_elapsed_secs: self.elapsed(now).max(0.0),
            rep_count,
            last_score: self.rep_scores.last().copied(),
            average_score: if rep_count == 0 {
                0.0
            } else {
                self.rep_scores.iter().sum::<f64>() / rep_count as f64
            },
            last_feedback: self.last_message.as_ref().map(|(m, _)| m.clone()),
            equipment_locked: self.equipment_locked,
            orientation_locked: self.orientation_locked,
            buffered_frames: self.user_buffer.len(),
            template_cycle_len: self.template.cycle_len(),
        }
    }
}

impl fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("phase", &self.phase)
            .field("reps", &self.rep_scores.len())
            .field("buffered_frames", &self.user_buffer.len())
            .finish()
    }
}

fn push_bounded(buf: &mut VecDeque<PoseFrame>, frame: PoseFrame, capacity: usize) {
    while buf.len() >= capacity.max(1) {
        buf.pop_front();
    }
    buf.push_back(frame);
}
