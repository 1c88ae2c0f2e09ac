//! # FormCoach-Session
//!
//! Live coaching session: gating checks, per-cycle scoring and feedback.
//!
//! ## Flow
//!
//! ```text
//! PoseSource ──┐
//!              ├─→ SessionOrchestrator ─→ CycleScorer ─→ FeedbackGenerator
//! TemplateSource (loop boundary) ─┘               │
//!                                                 └─→ VoiceDispatcher
//! ```
//!
//! The orchestrator is synchronous and tick driven; [`SessionRunner`] wraps
//! it in a tokio task for streaming use.

pub mod equipment;
pub mod feedback;
pub mod orchestrator;
pub mod orientation;
pub mod runner;
pub mod voice;

pub use equipment::*;
pub use feedback::*;
pub use orchestrator::*;
pub use orientation::*;
pub use runner::*;
pub use voice::*;
