//! Streaming session runner.
//!
//! Pulls one user frame and one template step per tick, feeds the
//! orchestrator and streams the interesting outcomes to the caller.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

use formcoach_core::{Error, PoseFrame, Result, Timestamp};
use formcoach_motion::MotionTemplate;

use crate::orchestrator::{RepOutcome, SessionOrchestrator, SessionPhase, SessionSnapshot, Tick};
use crate::voice::VoiceDispatcher;

/// Live pose input.
///
/// `Ok(None)` means no person was detected on this tick; the end of the
/// stream is reported as [`Error::SourceExhausted`].
#[async_trait]
pub trait PoseSource: Send {
    async fn next_frame(&mut self) -> Result<Option<PoseFrame>>;
}

/// Position of the template playback after one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateStep {
    pub frame_index: usize,
    /// Playback wrapped back to the first frame on this step
    pub looped: bool,
}

/// Looping trainer playback
#[async_trait]
pub trait TemplateSource: Send {
    async fn advance(&mut self) -> Result<TemplateStep>;
    async fn restart(&mut self) -> Result<()>;
}

/// In-memory template playback
#[derive(Debug, Clone)]
pub struct LoopingTemplate {
    len: usize,
    position: usize,
}

impl LoopingTemplate {
    pub fn new(template: &MotionTemplate) -> Self {
        Self::with_len(template.frames().len())
    }

    pub fn with_len(len: usize) -> Self {
        Self { len, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

#[async_trait]
impl TemplateSource for LoopingTemplate {
    async fn advance(&mut self) -> Result<TemplateStep> {
        if self.len == 0 {
            return Err(Error::TemplateUnavailable("template has no frames".into()));
        }
        self.position += 1;
        let looped = self.position >= self.len;
        if looped {
            self.position = 0;
        }
        Ok(TemplateStep {
            frame_index: self.position,
            looped,
        })
    }

    async fn restart(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }
}

/// Replays a recorded stream; `None` entries are ticks without a detection
#[derive(Debug, Clone, Default)]
pub struct ReplayPoseSource {
    frames: VecDeque<Option<PoseFrame>>,
}

impl ReplayPoseSource {
    pub fn new(frames: impl IntoIterator<Item = Option<PoseFrame>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl PoseSource for ReplayPoseSource {
    async fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
        self.frames
            .pop_front()
            .ok_or_else(|| Error::SourceExhausted("replay finished".into()))
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Tick rate used to advance the clock on ticks without a frame
    pub fps: f64,
    pub output_queue_size: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            output_queue_size: 256,
        }
    }
}

/// Events streamed out of a running session
#[derive(Debug, Clone, Serialize)]
pub enum SessionEvent {
    PhaseChanged(SessionPhase),
    Rep(RepOutcome),
    Hint(String),
    /// Last event; the session has ended
    Finished(SessionSnapshot),
}

pub struct SessionRunner {
    config: RunnerConfig,
    voice: Option<Arc<VoiceDispatcher>>,
    is_running: Arc<RwLock<bool>>,
}

impl SessionRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            voice: None,
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn with_voice(mut self, voice: Arc<VoiceDispatcher>) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Drive `orchestrator` until the pose source ends or [`stop`](Self::stop)
    /// is called
    pub async fn start_streaming<P, T>(
        &mut self,
        mut orchestrator: SessionOrchestrator,
        mut source: P,
        mut template: T,
    ) -> Result<mpsc::Receiver<SessionEvent>>
    where
        P: PoseSource + 'static,
        T: TemplateSource + 'static,
    {
        let (tx, rx) = mpsc::channel(self.config.output_queue_size.max(1));

        template.restart().await?;

        *self.is_running.write().await = true;
        let is_running = self.is_running.clone();
        let voice = self.voice.clone();
        let interval_nanos = (1_000_000_000.0 / self.config.fps.max(1.0)) as i64;

        tokio::spawn(async move {
            let mut now = Timestamp::from_nanos(0);
            let mut started = false;

            loop {
                if !*is_running.read().await {
                    break;
                }

                let step = match template.advance().await {
                    Ok(step) => step,
                    Err(e) => {
                        error!("Template playback error: {}", e);
                        break;
                    }
                };

                let frame = match source.next_frame().await {
                    Ok(frame) => frame,
                    Err(Error::SourceExhausted(reason)) => {
                        info!(%reason, "pose source finished");
                        break;
                    }
                    Err(e) => {
                        error!("Pose source error: {}", e);
                        break;
                    }
                };

                now = match &frame {
                    Some(f) if !started || f.timestamp > now => f.timestamp,
                    _ => Timestamp::from_nanos(now.as_nanos() + interval_nanos),
                };
                started = true;

                let outcome = orchestrator.tick(Tick {
                    now,
                    frame,
                    template_looped: step.looped,
                });

                if outcome.restart_template {
                    if let Err(e) = template.restart().await {
                        warn!("Template restart failed: {}", e);
                    }
                }

                let mut events = Vec::new();
                if outcome.phase_changed {
                    events.push(SessionEvent::PhaseChanged(outcome.phase));
                }
                if let Some(rep) = outcome.rep {
                    if let Some(voice) = &voice {
                        voice.dispatch(&rep.feedback.message, now);
                    }
                    events.push(SessionEvent::Rep(rep));
                }
                if let Some(hint) = outcome.hint {
                    if let Some(voice) = &voice {
                        voice.dispatch_hint(&hint, now);
                    }
                    events.push(SessionEvent::Hint(hint));
                }

                for event in events {
                    if tx.send(event).await.is_err() {
                        // Receiver dropped
                        *is_running.write().await = false;
                        return;
                    }
                }
            }

            orchestrator.end(now);
            let _ = tx.send(SessionEvent::Finished(orchestrator.snapshot(now))).await;
            *is_running.write().await = false;
        });

        Ok(rx)
    }

    /// Stop after the current tick
    pub async fn stop(&mut self) {
        *self.is_running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcoach_motion::fixtures::curl_frames;
    use crate::orchestrator::SessionConfig;
    use crate::voice::{VoiceConfig, VoiceSink};
    use formcoach_motion::{build_priority_mask, build_weights};

    fn orchestrator(template: Arc<MotionTemplate>) -> SessionOrchestrator {
        SessionOrchestrator::new(
            SessionConfig::default(),
            template,
            build_weights(&["elbow"], 1.8, 0.2).unwrap(),
            build_priority_mask(&["elbow"]).unwrap(),
            Timestamp::from_nanos(0),
        )
    }

    async fn collect(mut rx: mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[derive(Default)]
    struct CountingSink {
        count: tokio::sync::Mutex<usize>,
    }

    #[async_trait]
    impl VoiceSink for CountingSink {
        async fn speak(&self, _message: &str) -> Result<()> {
            *self.count.lock().await += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_looping_template_wraps() {
        let mut t = LoopingTemplate::with_len(3);
        let steps: Vec<bool> = {
            let mut v = Vec::new();
            for _ in 0..6 {
                v.push(t.advance().await.unwrap().looped);
            }
            v
        };
        assert_eq!(steps, vec![false, false, true, false, false, true]);

        t.advance().await.unwrap();
        t.restart().await.unwrap();
        assert_eq!(t.position(), 0);

        let mut empty = LoopingTemplate::with_len(0);
        assert!(empty.advance().await.is_err());
    }

    #[tokio::test]
    async fn test_replay_source_exhausts() {
        let mut source = ReplayPoseSource::new(vec![None]);
        assert!(source.next_frame().await.unwrap().is_none());
        assert!(matches!(
            source.next_frame().await,
            Err(Error::SourceExhausted(_))
        ));
    }

    #[tokio::test]
    async fn test_streams_reps_until_source_ends() {
        let template = Arc::new(MotionTemplate::from_frames(curl_frames(90, 30, 30.0)).unwrap());
        let user = curl_frames(720, 30, 30.0).into_iter().map(Some);

        let mut runner = SessionRunner::new(RunnerConfig::default());
        let rx = runner
            .start_streaming(
                orchestrator(template.clone()),
                ReplayPoseSource::new(user),
                LoopingTemplate::new(&template),
            )
            .await
            .unwrap();
        let events = collect(rx).await;

        let phases: Vec<SessionPhase> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::PhaseChanged(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                SessionPhase::OrientationConfirmed,
                SessionPhase::Countdown,
                SessionPhase::Scoring
            ]
        );

        let reps = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Rep(_)))
            .count();
        assert!(reps >= 5);

        match events.last() {
            Some(SessionEvent::Finished(snapshot)) => {
                assert_eq!(snapshot.phase, SessionPhase::Ended);
                assert_eq!(snapshot.rep_count, reps);
            }
            other => panic!("expected Finished, got {other:?}"),
        }
        assert!(!runner.is_running().await);
    }

    #[tokio::test]
    async fn test_missing_detections_advance_clock() {
        let template = Arc::new(MotionTemplate::from_frames(curl_frames(90, 30, 30.0)).unwrap());
        let stream: Vec<Option<PoseFrame>> = vec![None; 120];

        let mut runner = SessionRunner::new(RunnerConfig::default());
        let rx = runner
            .start_streaming(
                orchestrator(template.clone()),
                ReplayPoseSource::new(stream),
                LoopingTemplate::new(&template),
            )
            .await
            .unwrap();
        let events = collect(rx).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            SessionEvent::Finished(snapshot) => {
                assert_eq!(snapshot.rep_count, 0);
                assert_eq!(snapshot.buffered_frames, 0);
                assert!(!snapshot.orientation_locked);
            }
            other => panic!("expected Finished, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rep_feedback_is_spoken() {
        let template = Arc::new(MotionTemplate::from_frames(curl_frames(90, 30, 30.0)).unwrap());
        let user = curl_frames(450, 30, 30.0).into_iter().map(Some);
        let sink = Arc::new(CountingSink::default());
        let voice = Arc::new(VoiceDispatcher::spawn(VoiceConfig::default(), sink.clone()));

        let mut runner = SessionRunner::new(RunnerConfig::default()).with_voice(voice.clone());
        let rx = runner
            .start_streaming(
                orchestrator(template.clone()),
                ReplayPoseSource::new(user),
                LoopingTemplate::new(&template),
            )
            .await
            .unwrap();
        let events = collect(rx).await;
        // Hints are muted by default, so only rep feedback reaches the sink
        let spoken_events = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Rep(_)))
            .count();
        assert!(spoken_events > 0);

        drop(runner);
        let voice = Arc::try_unwrap(voice).unwrap();
        voice.close().await;
        assert_eq!(*sink.count.lock().await, spoken_events);
    }
}
