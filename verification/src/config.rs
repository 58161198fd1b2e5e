//! Verification configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for a verification orchestrator.
///
/// Can be loaded from a TOML file via [`VerificationConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Minimum estimated age that passes the facial check.
    #[serde(default = "default_minimum_age")]
    pub minimum_age: u32,

    /// Whether the facial age estimate runs.
    #[serde(default = "default_true")]
    pub require_facial_check: bool,

    /// Whether the challenge quiz runs.
    #[serde(default = "default_true")]
    pub require_challenge_check: bool,

    /// Number of questions asked per quiz.
    #[serde(default = "default_required_challenge_count")]
    pub required_challenge_count: usize,

    /// How long a passed verdict is remembered.
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: u32,

    #[serde(default)]
    pub facial: FacialConfig,

    #[serde(default)]
    pub challenge: ChallengeConfig,
}

/// Facial sampling parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacialConfig {
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,

    /// Delay before each capture.
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: f64,

    /// Samples below this confidence are discarded before aggregation.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    #[serde(default = "default_device_ready_timeout_secs")]
    pub device_ready_timeout_secs: f64,

    /// Extra sampling rounds when no sample is confident enough. 0 fails outright.
    #[serde(default)]
    pub low_confidence_retries: u32,
}

/// Challenge quiz parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChallengeConfig {
    #[serde(default = "default_question_timeout_secs")]
    pub question_timeout_secs: f64,

    /// Correct answers needed to pass.
    #[serde(default = "default_passing_score")]
    pub passing_score: usize,

    #[serde(default = "default_true")]
    pub shuffle_questions: bool,

    #[serde(default = "default_true")]
    pub shuffle_answers: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_minimum_age() -> u32 {
    18
}

fn default_required_challenge_count() -> usize {
    3
}

fn default_cache_ttl_days() -> u32 {
    30
}

fn default_sample_count() -> usize {
    5
}

fn default_sample_interval_secs() -> f64 {
    0.5
}

fn default_min_confidence() -> f32 {
    0.7
}

fn default_device_ready_timeout_secs() -> f64 {
    10.0
}

fn default_question_timeout_secs() -> f64 {
    30.0
}

fn default_passing_score() -> usize {
    2
}

/// Upper bound for every configured delay or timeout: one day.
pub const MAX_DURATION_SECS: f64 = 86_400.0;

/// Seconds to a `Duration`, clamped into `[0, MAX_DURATION_SECS]`.
fn secs(value: f64) -> Duration {
    if value.is_nan() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(value.clamp(0.0, MAX_DURATION_SECS))
}

fn check_secs(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=MAX_DURATION_SECS).contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be between 0 and {MAX_DURATION_SECS} seconds, got {value}"
        )));
    }
    Ok(())
}

// ── Impl ───────────────────────────────────────────────────────────────

impl VerificationConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.require_challenge_check {
            if self.required_challenge_count == 0 {
                return Err(ConfigError::Invalid(
                    "required_challenge_count must be at least 1".into(),
                ));
            }
            if self.challenge.passing_score > self.required_challenge_count {
                return Err(ConfigError::Invalid(format!(
                    "passing_score {} exceeds required_challenge_count {}",
                    self.challenge.passing_score, self.required_challenge_count
                )));
            }
        }
        if self.require_facial_check {
            if self.facial.sample_count == 0 {
                return Err(ConfigError::Invalid("sample_count must be at least 1".into()));
            }
            if !(0.0..=1.0).contains(&self.facial.min_confidence) {
                return Err(ConfigError::Invalid(format!(
                    "min_confidence must be within [0, 1], got {}",
                    self.facial.min_confidence
                )));
            }
        }
        check_secs("sample_interval_secs", self.facial.sample_interval_secs)?;
        check_secs("device_ready_timeout_secs", self.facial.device_ready_timeout_secs)?;
        check_secs("question_timeout_secs", self.challenge.question_timeout_secs)?;
        Ok(())
    }
}

impl FacialConfig {
    pub fn sample_interval(&self) -> Duration {
        secs(self.sample_interval_secs)
    }

    pub fn device_ready_timeout(&self) -> Duration {
        secs(self.device_ready_timeout_secs)
    }
}

impl ChallengeConfig {
    pub fn question_timeout(&self) -> Duration {
        secs(self.question_timeout_secs)
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            minimum_age: default_minimum_age(),
            require_facial_check: true,
            require_challenge_check: true,
            required_challenge_count: default_required_challenge_count(),
            cache_ttl_days: default_cache_ttl_days(),
            facial: FacialConfig::default(),
            challenge: ChallengeConfig::default(),
        }
    }
}

impl Default for FacialConfig {
    fn default() -> Self {
        Self {
            sample_count: default_sample_count(),
            sample_interval_secs: default_sample_interval_secs(),
            min_confidence: default_min_confidence(),
            device_ready_timeout_secs: default_device_ready_timeout_secs(),
            low_confidence_retries: 0,
        }
    }
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            question_timeout_secs: default_question_timeout_secs(),
            passing_score: default_passing_score(),
            shuffle_questions: true,
            shuffle_answers: true,
        }
    }
}
