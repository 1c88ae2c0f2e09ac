//! # FormCoach-Motion
//!
//! Motion comparison between a user's joint-angle stream and a trainer's
//! reference cycle.
//!
//! ## Pipeline
//!
//! 1. **Conditioning** - centered smoothing and resampling to template length
//! 2. **Alignment** - weighted DTW, nominal and left/right mirrored
//! 3. **Amplitude** - robust range of motion (p90 - p10) per joint
//! 4. **Scoring** - similarity × amplitude ratio, with a non-priority penalty
//!
//! ## Templates
//!
//! A trainer recording is reduced offline to a single cycle by a hysteresis
//! rep segmenter running on its most active hinge joint (elbow or knee).

pub mod amplitude;
pub mod conditioning;
pub mod dtw;
#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;
pub mod priority;
pub mod scoring;
pub mod segmenter;
pub mod template;

pub use amplitude::*;
pub use conditioning::*;
pub use dtw::*;
pub use priority::*;
pub use scoring::*;
pub use segmenter::*;
pub use template::*;
