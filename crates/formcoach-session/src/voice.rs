//! Spoken feedback dispatch.
//!
//! Messages go through a bounded queue drained by one background task, so a
//! slow speech engine never stalls the tick loop. A cooldown limits how often
//! messages are accepted; identical messages are not deduplicated.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use formcoach_core::{Result, Timestamp};

/// Speech output collaborator
#[async_trait]
pub trait VoiceSink: Send + Sync {
    async fn speak(&self, message: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
    /// Minimum spacing between accepted messages
    pub cooldown_secs: f64,
    pub queue_capacity: usize,
    /// Speak continuous hints too; rep feedback is always spoken
    pub speak_hints: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_secs: 0.1,
            queue_capacity: 8,
            speak_hints: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Queued,
    CoolingDown,
    QueueFull,
    Disabled,
    /// Hint not spoken because `speak_hints` is off
    Muted,
}

/// Bounded background queue in front of a [`VoiceSink`]
pub struct VoiceDispatcher {
    config: VoiceConfig,
    tx: Option<mpsc::Sender<String>>,
    worker: Option<JoinHandle<()>>,
    last_accepted: Mutex<Option<Timestamp>>,
}

impl VoiceDispatcher {
    /// Spawn the worker task. Must be called inside a tokio runtime.
    pub fn spawn(config: VoiceConfig, sink: Arc<dyn VoiceSink>) -> Self {
        if !config.enabled {
            return Self::disabled(config);
        }

        let (tx, mut rx) = mpsc::channel::<String>(config.queue_capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = sink.speak(&message).await {
                    warn!("Voice sink error, message dropped: {}", e);
                }
            }
            debug!("voice worker stopped");
        });

        Self {
            config,
            tx: Some(tx),
            worker: Some(worker),
            last_accepted: Mutex::new(None),
        }
    }

    /// Dispatcher that drops everything
    pub fn disabled(config: VoiceConfig) -> Self {
        Self {
            config,
            tx: None,
            worker: None,
            last_accepted: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    /// Offer a message without waiting
    pub fn dispatch(&self, message: &str, now: Timestamp) -> DispatchOutcome {
        let Some(tx) = &self.tx else {
            return DispatchOutcome::Disabled;
        };

        let mut last = self.last_accepted.lock();
        if let Some(at) = *last {
            if now.secs_since(at) < self.config.cooldown_secs {
                return DispatchOutcome::CoolingDown;
            }
        }

        match tx.try_send(message.to_string()) {
            Ok(()) => {
                *last = Some(now);
                DispatchOutcome::Queued
            }
            Err(TrySendError::Full(_)) => {
                debug!("voice queue full, dropping message");
                DispatchOutcome::QueueFull
            }
            Err(TrySendError::Closed(_)) => DispatchOutcome::Disabled,
        }
    }

    /// Offer a continuous hint, subject to `speak_hints`
    pub fn dispatch_hint(&self, hint: &str, now: Timestamp) -> DispatchOutcome {
        if !self.config.speak_hints {
            return DispatchOutcome::Muted;
        }
        self.dispatch(hint, now)
    }

    /// Stop accepting messages and wait for the queue to drain
    pub async fn close(mut self) {
        self.tx = None;
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!("Voice worker ended abnormally: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for VoiceDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceDispatcher")
            .field("config", &self.config)
            .field("active", &self.tx.is_some())
            .finish()
    }
}
