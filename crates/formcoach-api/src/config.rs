//! Service and exercise configuration.

use serde::{Deserialize, Serialize};

use formcoach_core::{Error, Result};
use formcoach_motion::{build_priority_mask, build_weights, JointWeights, PriorityMask};
use formcoach_session::{SessionConfig, VoiceConfig};

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Session lifetime management
    pub sessions: SessionsConfig,

    /// Spoken feedback
    pub voice: VoiceConfig,

    /// Defaults for every live session
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Sessions without activity for this long are swept (seconds)
    pub idle_timeout_secs: u64,

    /// Sweep period (seconds)
    pub cleanup_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 3600,
            cleanup_interval_secs: 300,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from file
    pub fn from_file(path: &str) -> std::result::Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("FORMCOACH").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Load from environment variables
    pub fn from_env() -> std::result::Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("FORMCOACH").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

pub const PRIORITY_WEIGHT_RANGE: (f64, f64) = (0.1, 5.0);
pub const NONPRIORITY_WEIGHT_RANGE: (f64, f64) = (0.0, 1.0);

/// Per-exercise settings supplied when a session starts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseConfig {
    /// Joint or family tokens, e.g. `"elbow"`, `"knee_r"`
    pub priority_joints: Vec<String>,
    pub priority_weight: f64,
    pub nonpriority_weight: f64,
    pub require_equipment_check: bool,
}

impl Default for ExerciseConfig {
    fn default() -> Self {
        Self {
            priority_joints: Vec::new(),
            priority_weight: 1.8,
            nonpriority_weight: 0.2,
            require_equipment_check: false,
        }
    }
}

impl ExerciseConfig {
    pub fn with_priority<S: Into<String>>(tokens: impl IntoIterator<Item = S>) -> Self {
        Self {
            priority_joints: tokens.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Check weight ranges and the token vocabulary
    pub fn validate(&self) -> Result<()> {
        check_range("priority_weight", self.priority_weight, PRIORITY_WEIGHT_RANGE)?;
        check_range(
            "nonpriority_weight",
            self.nonpriority_weight,
            NONPRIORITY_WEIGHT_RANGE,
        )?;
        build_priority_mask(&self.priority_joints)?;
        Ok(())
    }

    pub fn weights(&self) -> Result<JointWeights> {
        build_weights(
            &self.priority_joints,
            self.priority_weight,
            self.nonpriority_weight,
        )
    }

    pub fn mask(&self) -> Result<PriorityMask> {
        build_priority_mask(&self.priority_joints)
    }
}

fn check_range(name: &str, value: f64, (lo, hi): (f64, f64)) -> Result<()> {
    if !value.is_finite() || value < lo || value > hi {
        return Err(Error::Config(format!(
            "{name} must be within [{lo}, {hi}], got {value}"
        )));
    }
    Ok(())
}
