//! # FormCoach-API
//!
//! Service layer over live coaching sessions.
//!
//! ## Operations
//!
//! - `start(template_ref, exercise)` - Create a session; the template loads in the background
//! - `status(id)` - Phase, rep history and live snapshot
//! - `tick(id, tick)` - Drive the live state machine
//! - `submit_analysis(id, frames)` - Score a pose sequence against the template
//! - `complete_rep(id, score)` - Record an externally scored rep
//! - `summary(id)` / `end(id)` / `delete(id)`
//! - [`analyze_standalone`] - Compare two recordings without a session
//!
//! Idle sessions are swept by [`SessionRegistry::spawn_cleanup`].

pub mod analysis;
pub mod config;
pub mod registry;
pub mod summary;

pub use analysis::*;
pub use config::*;
pub use registry::*;
pub use summary::*;
