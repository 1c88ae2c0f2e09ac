//! # FormCoach-Core
//!
//! Core types and utilities for the FormCoach exercise-form coaching system:
//! pose landmarks, joint definitions, angle extraction and body orientation.

pub mod error;
pub mod geometry;
pub mod kinematics;
pub mod types;

pub use error::{Error, Result};
pub use geometry::*;
pub use kinematics::*;
pub use types::*;
