//! Untie configuration.
//!
//! The on-disk format is a JSON object whose keys are the human-readable
//! names server owners already know. Missing keys are populated from the
//! defaults and the file is written back, so new options show up after an
//! upgrade.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;

/// Configuration shared by every actor monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UntieConfig {
    /// Seconds the use key must be held before the box unties. Zero unties
    /// on the next scheduler drain.
    #[serde(rename = "Untie Duration (Seconds)")]
    pub commit_delay: f64,

    /// Seconds between underwater checks.
    #[serde(rename = "How often to check if player is underwater (Seconds)")]
    pub precondition_poll_interval: f64,

    /// Minimum seconds between two probes by the same actor.
    #[serde(rename = "How often to check if a player is holding the use button (Seconds)")]
    pub probe_rate_limit: f64,

    /// Tell the actor how long the untie will take when it starts.
    #[serde(rename = "Show Untie Message")]
    pub show_started_notification: bool,

    /// Tell the actor when releasing the key canceled the untie.
    #[serde(rename = "Show canceled message")]
    pub show_canceled_notification: bool,

    /// Buoyancy scale applied to the box once it is untied.
    #[serde(rename = "Buoyancy Scale")]
    pub commit_buoyancy_scale: f32,

    /// Random spread (±seconds) applied to each underwater check interval.
    #[serde(rename = "Underwater check jitter (Seconds)")]
    pub poll_jitter: f64,

    /// How far from the eyes a box can be reached.
    #[serde(rename = "Use distance (Meters)")]
    pub probe_distance: f32,

    /// Seconds between held-key evaluations while underwater.
    #[serde(rename = "Held key tick interval (Seconds)")]
    pub detection_interval: f64,
}

impl Default for UntieConfig {
    fn default() -> Self {
        Self {
            commit_delay: 0.0,
            precondition_poll_interval: 5.0,
            probe_rate_limit: 1.0,
            show_started_notification: true,
            show_canceled_notification: true,
            commit_buoyancy_scale: 1.0,
            poll_jitter: 0.1,
            probe_distance: 3.0,
            detection_interval: 0.02,
        }
    }
}

impl UntieConfig {
    /// Override the untie duration.
    #[must_use]
    pub fn with_commit_delay(mut self, seconds: f64) -> Self {
        self.commit_delay = seconds;
        self
    }

    /// Override the probe rate limit.
    #[must_use]
    pub fn with_probe_rate_limit(mut self, seconds: f64) -> Self {
        self.probe_rate_limit = seconds;
        self
    }

    /// Parse a config from JSON text, filling in missing keys, and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed input and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config at `path`, creating it with defaults if it does not
    /// exist. The populated config is always written back.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, validated
    /// or written.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_json(&text)?
        } else {
            warn!(path = %path.display(), "loading default config");
            Self::default()
        };

        let text = serde_json::to_string_pretty(&config)?;
        fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!(
            path = %path.display(),
            commit_delay = config.commit_delay,
            probe_rate_limit = config.probe_rate_limit,
            "config loaded"
        );
        Ok(config)
    }

    /// Check every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("Untie Duration (Seconds)", self.commit_delay)?;
        positive(
            "How often to check if player is underwater (Seconds)",
            self.precondition_poll_interval,
        )?;
        non_negative(
            "How often to check if a player is holding the use button (Seconds)",
            self.probe_rate_limit,
        )?;
        non_negative("Underwater check jitter (Seconds)", self.poll_jitter)?;
        if self.poll_jitter >= self.precondition_poll_interval {
            return Err(ConfigError::Invalid {
                field: "Underwater check jitter (Seconds)",
                reason: format!(
                    "must be smaller than the underwater check interval ({})",
                    self.precondition_poll_interval
                ),
            });
        }
        positive("Use distance (Meters)", f64::from(self.probe_distance))?;
        positive("Held key tick interval (Seconds)", self.detection_interval)?;
        if !self.commit_buoyancy_scale.is_finite() {
            return Err(ConfigError::Invalid {
                field: "Buoyancy Scale",
                reason: "must be a finite number".to_string(),
            });
        }
        Ok(())
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("expected a finite value >= 0, got {value}"),
        });
    }
    Ok(())
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("expected a finite value > 0, got {value}"),
        });
    }
    Ok(())
}
