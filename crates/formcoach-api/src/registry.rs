//! Session registry.
//!
//! Owns every live session. The session table sits behind a short-lived
//! `parking_lot` lock that is never held across an `.await`; each session has
//! its own async mutex so ticks for different sessions never contend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use formcoach_core::{joint_column, Error, Joint, PoseFrame, Result, SessionId, Timestamp};
use formcoach_motion::{motion_amplitude, JointWeights, MotionTemplate, PriorityMask, RepSegmenter};
use formcoach_session::{
    EquipmentClassifier, FeedbackInput, SessionConfig, SessionOrchestrator, SessionPhase,
    SessionSnapshot, Tick, TickOutcome, VoiceDispatcher,
};

use crate::config::{ExerciseConfig, ServiceConfig};
use crate::summary::SessionSummary;

/// Resolves a template reference to trainer frames
#[async_trait]
pub trait TemplateLoader: Send + Sync {
    async fn load(&self, template_ref: &str) -> Result<Vec<PoseFrame>>;
}

/// Templates held in memory, keyed by name
#[derive(Default)]
pub struct InMemoryTemplates {
    templates: RwLock<HashMap<String, Vec<PoseFrame>>>,
}

impl InMemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, frames: Vec<PoseFrame>) {
        self.templates.write().insert(name.into(), frames);
    }
}

#[async_trait]
impl TemplateLoader for InMemoryTemplates {
    async fn load(&self, template_ref: &str) -> Result<Vec<PoseFrame>> {
        self.templates
            .read()
            .get(template_ref)
            .cloned()
            .ok_or_else(|| Error::TemplateUnavailable(format!("unknown template {template_ref:?}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepRecord {
    pub rep_number: usize,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: SessionId,
    pub phase: SessionPhase,
    pub template_ref: String,
    /// Every recorded rep: tick-scored and externally completed
    pub total_reps: usize,
    pub rep_scores: Vec<RepRecord>,
    /// Mean over `rep_scores`
    pub average_score: f64,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Cause of a failed template load
    pub error: Option<String>,
    pub banner: Option<String>,
    /// State machine snapshot. Its rep count and scores cover only reps
    /// scored by [`SessionRegistry::tick`], never those from
    /// [`SessionRegistry::complete_rep`].
    pub live: Option<SessionSnapshot>,
}

/// Result of scoring an externally supplied pose sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub score: f64,
    pub feedback: String,
    /// Mean absolute angle difference per joint, keyed by joint token
    pub joint_analysis: BTreeMap<String, f64>,
    pub motion_amplitude: f64,
    pub rep_detected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepCompletion {
    pub rep_number: usize,
    pub score: f64,
    pub total_reps: usize,
    pub average_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEnd {
    pub session_id: SessionId,
    pub phase: SessionPhase,
    pub summary: SessionSummary,
}

enum SessionState {
    Loading,
    Ready(Box<SessionOrchestrator>),
    Failed(String),
}

struct SessionEntry {
    id: SessionId,
    template_ref: String,
    exercise: ExerciseConfig,
    state: SessionState,
    ended: bool,
    reps: Vec<RepRecord>,
    started_at: DateTime<Utc>,
}

impl SessionEntry {
    fn phase(&self) -> SessionPhase {
        if self.ended {
            return SessionPhase::Ended;
        }
        match &self.state {
            SessionState::Loading => SessionPhase::Loading,
            SessionState::Ready(orchestrator) => orchestrator.phase(),
            SessionState::Failed(_) => SessionPhase::Error,
        }
    }

    fn orchestrator_mut(&mut self) -> Result<&mut SessionOrchestrator> {
        let phase = self.phase();
        match &mut self.state {
            SessionState::Ready(orchestrator) if !self.ended => Ok(orchestrator.as_mut()),
            _ => Err(Error::SessionNotReady {
                session_id: self.id,
                phase: phase.to_string(),
            }),
        }
    }

    fn scores(&self) -> Vec<f64> {
        self.reps.iter().map(|r| r.score).collect()
    }

    fn record_rep(&mut self, score: f64, feedback: Option<String>) -> &RepRecord {
        self.reps.push(RepRecord {
            rep_number: self.reps.len() + 1,
            score,
            timestamp: Utc::now(),
            feedback,
        });
        &self.reps[self.reps.len() - 1]
    }
}

struct SessionSlot {
    last_activity: Mutex<DateTime<Utc>>,
    entry: tokio::sync::Mutex<SessionEntry>,
}

impl SessionSlot {
    fn touch(&self) {
        *self.last_activity.lock() = Utc::now();
    }
}

type SessionTable = RwLock<HashMap<SessionId, Arc<SessionSlot>>>;

/// Shared handle to all sessions; cheap to clone
#[derive(Clone)]
pub struct SessionRegistry {
    config: Arc<ServiceConfig>,
    loader: Arc<dyn TemplateLoader>,
    classifier: Option<Arc<dyn EquipmentClassifier>>,
    voice: Option<Arc<VoiceDispatcher>>,
    sessions: Arc<SessionTable>,
}

impl SessionRegistry {
    pub fn new(config: ServiceConfig, loader: Arc<dyn TemplateLoader>) -> Self {
        Self {
            config: Arc::new(config),
            loader,
            classifier: None,
            voice: None,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn EquipmentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_voice(mut self, voice: Arc<VoiceDispatcher>) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Create a session and load its template in the background.
    ///
    /// Configuration errors are reported here; template errors put the
    /// session into the `error` phase. Must be called within a tokio runtime.
    pub fn start(&self, template_ref: &str, exercise: ExerciseConfig) -> Result<SessionId> {
        exercise.validate()?;
        let weights = exercise.weights()?;
        let mask = exercise.mask()?;

        let id = SessionId::new();
        let now = Utc::now();
        let slot = Arc::new(SessionSlot {
            last_activity: Mutex::new(now),
            entry: tokio::sync::Mutex::new(SessionEntry {
                id,
                template_ref: template_ref.to_string(),
                exercise: exercise.clone(),
                state: SessionState::Loading,
                ended: false,
                reps: Vec::new(),
                started_at: now,
            }),
        });
        self.sessions.write().insert(id, slot.clone());
        info!(session = %id, template = template_ref, "session started");

        let session_config = SessionConfig {
            require_equipment_check: exercise.require_equipment_check,
            ..self.config.session.clone()
        };
        tokio::spawn(load_session(
            slot,
            self.loader.clone(),
            template_ref.to_string(),
            session_config,
            weights,
            mask,
            self.classifier.clone(),
        ));

        Ok(id)
    }

    fn slot(&self, id: SessionId) -> Result<Arc<SessionSlot>> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::SessionNotFound(id))
    }

    pub async fn status(&self, id: SessionId) -> Result<SessionStatus> {
        let slot = self.slot(id)?;
        let entry = slot.entry.lock().await;
        let phase = entry.phase();
        let scores = entry.scores();

        let status = SessionStatus {
            session_id: id,
            phase,
            template_ref: entry.template_ref.clone(),
            total_reps: scores.len(),
            rep_scores: entry.reps.clone(),
            average_score: SessionSummary::from_scores(&scores).average_score,
            start_time: entry.started_at,
            last_activity: *slot.last_activity.lock(),
            error: match &entry.state {
                SessionState::Failed(cause) => Some(cause.clone()),
                _ => None,
            },
            banner: phase.banner().map(str::to_string),
            live: match &entry.state {
                SessionState::Ready(orchestrator) => Some(orchestrator.snapshot(Timestamp::now())),
                _ => None,
            },
        };
        Ok(status)
    }

    /// Drive the live session by one tick
    pub async fn tick(&self, id: SessionId, tick: Tick) -> Result<TickOutcome> {
        let slot = self.slot(id)?;
        slot.touch();
        let now = tick.now;

        let mut entry = slot.entry.lock().await;
        let outcome = entry.orchestrator_mut()?.tick(tick);

        if let Some(rep) = &outcome.rep {
            entry.record_rep(rep.score.score, Some(rep.feedback.message.clone()));
            if let Some(voice) = &self.voice {
                voice.dispatch(&rep.feedback.message, now);
            }
        }
        if let (Some(hint), Some(voice)) = (&outcome.hint, &self.voice) {
            voice.dispatch_hint(hint, now);
        }

        Ok(outcome)
    }

    /// Score a user pose sequence against the session template.
    ///
    /// The score is not added to the session's rep history; use
    /// [`complete_rep`](Self::complete_rep) for that.
    pub async fn submit_analysis(
        &self,
        id: SessionId,
        user_frames: &[PoseFrame],
    ) -> Result<AnalysisResult> {
        let slot = self.slot(id)?;
        slot.touch();
        let mut entry = slot.entry.lock().await;
        let orchestrator = entry.orchestrator_mut()?;

        if user_frames.is_empty() {
            return Err(Error::InvalidInput("no user frames supplied".into()));
        }

        let template = orchestrator.template().clone();
        let scorer = orchestrator.scorer();
        let user_angles = scorer.extractor().extract_sequence(user_frames);
        let cycle = scorer.score_angles(&user_angles, template.angles())?;

        let amp_mask = scorer.mask().amplitude_mask();
        let feedback = orchestrator.feedback_generator().analyze(&FeedbackInput {
            user_angles: &user_angles,
            template_angles: template.angles(),
            user_amplitude: motion_amplitude(&user_angles, Some(&amp_mask)),
            template_amplitude: motion_amplitude(template.angles(), Some(&amp_mask)),
            score: cycle.score,
            mask: scorer.mask(),
        });

        let joint_analysis = Joint::ALL
            .iter()
            .map(|j| (j.token().to_string(), cycle.joint_differences[j.index()]))
            .collect();

        let reference = template.cycle();
        let rep_detected = !RepSegmenter::new(reference.thresholds)
            .segment(&joint_column(&user_angles, reference.channel))
            .is_empty();

        debug!(session = %id, score = cycle.score, rep_detected, "analysis submitted");

        Ok(AnalysisResult {
            score: cycle.score,
            feedback: feedback.message,
            joint_analysis,
            motion_amplitude: cycle.user_amplitude,
            rep_detected,
        })
    }

    /// Append an externally scored rep
    pub async fn complete_rep(&self, id: SessionId, score: f64) -> Result<RepCompletion> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(Error::InvalidInput(format!(
                "rep score must be within [0, 1], got {score}"
            )));
        }
        let slot = self.slot(id)?;
        slot.touch();
        let mut entry = slot.entry.lock().await;

        let rep_number = entry.record_rep(score, None).rep_number;
        let scores = entry.scores();
        Ok(RepCompletion {
            rep_number,
            score,
            total_reps: scores.len(),
            average_score: SessionSummary::from_scores(&scores).average_score,
        })
    }

    pub async fn summary(&self, id: SessionId) -> Result<SessionSummary> {
        let slot = self.slot(id)?;
        let entry = slot.entry.lock().await;
        Ok(SessionSummary::from_scores(&entry.scores()))
    }

    /// Close a session and return its final summary; the session stays
    /// queryable until deleted or swept
    pub async fn end(&self, id: SessionId) -> Result<SessionEnd> {
        let slot = self.slot(id)?;
        slot.touch();
        let mut entry = slot.entry.lock().await;

        if let SessionState::Ready(orchestrator) = &mut entry.state {
            orchestrator.end(Timestamp::now());
        }
        entry.ended = true;
        info!(session = %id, reps = entry.reps.len(), "session ended");

        Ok(SessionEnd {
            session_id: id,
            phase: entry.phase(),
            summary: SessionSummary::from_scores(&entry.scores()),
        })
    }

    pub fn delete(&self, id: SessionId) -> Result<()> {
        match self.sessions.write().remove(&id) {
            Some(_) => {
                info!(session = %id, "session deleted");
                Ok(())
            }
            None => Err(Error::SessionNotFound(id)),
        }
    }

    pub fn list(&self) -> Vec<SessionId> {
        self.sessions.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Exercise settings a session was started with
    pub async fn exercise(&self, id: SessionId) -> Result<ExerciseConfig> {
        let slot = self.slot(id)?;
        let entry = slot.entry.lock().await;
        Ok(entry.exercise.clone())
    }

    /// Remove sessions idle for longer than the configured timeout
    pub fn cleanup_idle(&self, now: DateTime<Utc>) -> usize {
        sweep(&self.sessions, now, self.idle_timeout())
    }

    /// Periodic idle sweep; stops once the registry is dropped
    pub fn spawn_cleanup(&self) -> JoinHandle<()> {
        let sessions: Weak<SessionTable> = Arc::downgrade(&self.sessions);
        let timeout = self.idle_timeout();
        let period = Duration::from_secs(self.config.sessions.cleanup_interval_secs.max(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let Some(sessions) = sessions.upgrade() else {
                    break;
                };
                sweep(&sessions, Utc::now(), timeout);
            }
            debug!("session cleanup stopped");
        })
    }

    fn idle_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.config.sessions.idle_timeout_secs as i64)
    }
}

async fn load_session(
    slot: Arc<SessionSlot>,
    loader: Arc<dyn TemplateLoader>,
    template_ref: String,
    config: SessionConfig,
    weights: JointWeights,
    mask: PriorityMask,
    classifier: Option<Arc<dyn EquipmentClassifier>>,
) {
    let loaded = match loader.load(&template_ref).await {
        Ok(frames) => MotionTemplate::from_frames(frames),
        Err(e) => Err(e),
    };

    // The slot may already be gone from the table; updating it is harmless.
    let mut entry = slot.entry.lock().await;
    match loaded {
        Ok(template) => {
            let mut orchestrator =
                SessionOrchestrator::new(config, Arc::new(template), weights, mask, Timestamp::now());
            if let Some(classifier) = classifier {
                orchestrator = orchestrator.with_classifier(classifier);
            }
            info!(session = %entry.id, phase = %orchestrator.phase(), "session ready");
            entry.state = SessionState::Ready(Box::new(orchestrator));
        }
        Err(e) => {
            error!(session = %entry.id, "Template load failed: {}", e);
            entry.state = SessionState::Failed(e.to_string());
        }
    }
}

fn sweep(sessions: &SessionTable, now: DateTime<Utc>, timeout: chrono::Duration) -> usize {
    let mut table = sessions.write();
    let before = table.len();
    table.retain(|_, slot| now - *slot.last_activity.lock() <= timeout);
    let removed = before - table.len();
    if removed > 0 {
        info!(removed, "idle sessions removed");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcoach_motion::fixtures;

    const FPS: f64 = 30.0;

    fn curl_frame(i: usize, period: usize) -> PoseFrame {
        fixtures::curl_frame(i, period, FPS)
    }

    fn curl_frames(n: usize, period: usize) -> Vec<PoseFrame> {
        fixtures::curl_frames(n, period, FPS)
    }

    fn registry() -> SessionRegistry {
        let templates = InMemoryTemplates::new();
        templates.insert("curl", curl_frames(90, 30));
        SessionRegistry::new(ServiceConfig::default(), Arc::new(templates))
    }

    async fn wait_loaded(registry: &SessionRegistry, id: SessionId) -> SessionPhase {
        for _ in 0..100 {
            let phase = registry.status(id).await.unwrap().phase;
            if phase != SessionPhase::Loading {
                return phase;
            }
            tokio::task::yield_now().await;
        }
        SessionPhase::Loading
    }

    async fn ready_session(registry: &SessionRegistry) -> SessionId {
        let id = registry
            .start("curl", ExerciseConfig::with_priority(["elbow"]))
            .unwrap();
        assert_eq!(wait_loaded(registry, id).await, SessionPhase::OrientationCheck);
        id
    }

    #[tokio::test]
    async fn test_start_without_equipment_check() {
        let registry = registry();
        let id = ready_session(&registry).await;

        let status = registry.status(id).await.unwrap();
        assert_eq!(status.total_reps, 0);
        assert_eq!(status.average_score, 0.0);
        assert!(status.error.is_none());
        assert!(status.live.is_some());
        assert_eq!(registry.list(), vec![id]);
    }

    #[tokio::test]
    async fn test_start_with_equipment_check() {
        let registry = registry();
        let exercise = ExerciseConfig {
            require_equipment_check: true,
            ..ExerciseConfig::default()
        };
        let id = registry.start("curl", exercise).unwrap();
        assert_eq!(wait_loaded(&registry, id).await, SessionPhase::EquipmentCheck);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let registry = registry();
        let bad_token = ExerciseConfig::with_priority(["tail"]);
        assert!(matches!(
            registry.start("curl", bad_token),
            Err(Error::InvalidPriorityToken(_))
        ));

        let bad_weight = ExerciseConfig {
            priority_weight: 9.0,
            ..ExerciseConfig::default()
        };
        assert!(matches!(
            registry.start("curl", bad_weight),
            Err(Error::Config(_))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_template_fails_session() {
        let registry = registry();
        let id = registry.start("squat", ExerciseConfig::default()).unwrap();
        assert_eq!(wait_loaded(&registry, id).await, SessionPhase::Error);

        let status = registry.status(id).await.unwrap();
        assert!(status.error.unwrap().contains("squat"));
        assert!(status.live.is_none());

        assert!(matches!(
            registry.submit_analysis(id, &curl_frames(30, 30)).await,
            Err(Error::SessionNotReady { .. })
        ));
    }

    #[tokio::test]
    async fn test_submit_matching_cycle() {
        let registry = registry();
        let id = ready_session(&registry).await;

        let template = MotionTemplate::from_frames(curl_frames(90, 30)).unwrap();
        let segment = template.cycle().segment;
        let user = &template.frames()[segment.start..=segment.end];

        let result = registry.submit_analysis(id, user).await.unwrap();
        assert!(result.score > 0.99, "score {}", result.score);
        assert_eq!(result.feedback, "Excellent rep! Perfect form!");
        assert_eq!(result.joint_analysis.len(), 8);
        assert!(result.joint_analysis["elbow_l"] < 1e-6);

        // Analysis does not add to the rep history.
        assert_eq!(registry.status(id).await.unwrap().total_reps, 0);
    }

    #[tokio::test]
    async fn test_submit_detects_reps() {
        let registry = registry();
        let id = ready_session(&registry).await;

        let result = registry
            .submit_analysis(id, &curl_frames(90, 30))
            .await
            .unwrap();
        assert!(result.rep_detected);
        assert!(result.motion_amplitude > 0.0);
    }

    #[tokio::test]
    async fn test_submit_static_user() {
        let registry = registry();
        let id = ready_session(&registry).await;

        let still: Vec<PoseFrame> = (0..30).map(|_| curl_frame(0, 30)).collect();
        let result = registry.submit_analysis(id, &still).await.unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.feedback, "Start moving! Follow the trainer's motion");
        assert!(!result.rep_detected);

        assert!(matches!(
            registry.submit_analysis(id, &[]).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_rep_and_summary() {
        let registry = registry();
        let id = ready_session(&registry).await;

        registry.complete_rep(id, 0.3).await.unwrap();
        registry.complete_rep(id, 0.6).await.unwrap();
        let third = registry.complete_rep(id, 0.9).await.unwrap();
        assert_eq!(third.rep_number, 3);
        assert_eq!(third.total_reps, 3);
        assert!((third.average_score - 0.6).abs() < 1e-9);

        assert!(matches!(
            registry.complete_rep(id, 1.5).await,
            Err(Error::InvalidInput(_))
        ));

        let summary = registry.summary(id).await.unwrap();
        assert_eq!(summary.excellent_reps, 1);
        assert_eq!(summary.good_reps, 1);
        assert_eq!(summary.poor_reps, 1);
        assert_eq!(summary.trend, crate::summary::Trend::Improving);
    }

    #[tokio::test]
    async fn test_completed_reps_stay_out_of_live_snapshot() {
        let registry = registry();
        let id = ready_session(&registry).await;

        registry.complete_rep(id, 0.7).await.unwrap();
        registry.complete_rep(id, 0.9).await.unwrap();

        let status = registry.status(id).await.unwrap();
        assert_eq!(status.total_reps, 2);
        assert!((status.average_score - 0.8).abs() < 1e-9);
        let live = status.live.unwrap();
        assert_eq!(live.rep_count, 0);
        assert!(live.last_score.is_none());
    }

    #[tokio::test]
    async fn test_live_ticks_record_reps() {
        let registry = registry();
        let id = ready_session(&registry).await;

        let mut position = 0;
        for i in 0..720 {
            position += 1;
            let looped = position == 90;
            if looped {
                position = 0;
            }
            let outcome = registry
                .tick(
                    id,
                    Tick {
                        now: Timestamp::from_secs_f64(i as f64 / FPS),
                        frame: Some(curl_frame(i, 30)),
                        template_looped: looped,
                    },
                )
                .await
                .unwrap();
            if outcome.restart_template {
                position = 0;
            }
        }

        let status = registry.status(id).await.unwrap();
        assert_eq!(status.phase, SessionPhase::Scoring);
        assert!(status.total_reps >= 5);
        assert!(status.rep_scores.iter().all(|r| r.feedback.is_some()));
    }

    #[tokio::test]
    async fn test_end_session() {
        let registry = registry();
        let id = ready_session(&registry).await;
        registry.complete_rep(id, 0.7).await.unwrap();

        let end = registry.end(id).await.unwrap();
        assert_eq!(end.phase, SessionPhase::Ended);
        assert_eq!(end.summary.total_reps, 1);

        let tick = Tick {
            now: Timestamp::from_secs_f64(0.0),
            frame: None,
            template_looped: false,
        };
        assert!(matches!(
            registry.tick(id, tick).await,
            Err(Error::SessionNotReady { .. })
        ));
        assert_eq!(registry.status(id).await.unwrap().phase, SessionPhase::Ended);
    }

    #[tokio::test]
    async fn test_delete() {
        let registry = registry();
        let id = ready_session(&registry).await;

        assert!(matches!(
            registry.delete(SessionId::new()),
            Err(Error::SessionNotFound(_))
        ));
        registry.delete(id).unwrap();
        assert!(matches!(
            registry.status(id).await,
            Err(Error::SessionNotFound(_))
        ));
        assert!(matches!(
            registry.complete_rep(id, 0.5).await,
            Err(Error::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_while_loading() {
        let registry = registry();
        let id = registry.start("curl", ExerciseConfig::default()).unwrap();
        registry.delete(id).unwrap();

        // The background load finishes against the detached slot.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_idle() {
        let registry = registry();
        let id = ready_session(&registry).await;

        assert_eq!(registry.cleanup_idle(Utc::now()), 0);
        assert_eq!(registry.list(), vec![id]);

        let later = Utc::now() + chrono::Duration::hours(2);
        assert_eq!(registry.cleanup_idle(later), 1);
        assert!(registry.is_empty());
    }
}
