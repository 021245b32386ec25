//! Configuration management for the activity analysis engine
//!
//! Handles environment variables and engine tuning parameters.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use strum::{Display, EnumString};
use tracing::info;

/// When a no-go goal violation produces a conflict notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConflictNotificationPolicy {
    /// Notify when an activity is created and whenever its end time is extended
    OnEveryChange,
    /// Notify only when a new activity is created
    OnNewActivity,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum gap between two events that still extends the same activity
    pub combine_interval_ms: u64,

    /// Minimum end-time growth before an extension is persisted
    pub skip_window_ms: u64,

    /// Device clock offsets up to this size are treated as noise
    pub clock_skew_tolerance_ms: u64,

    /// Newly created activities last at least this long
    pub minimum_activity_duration_ms: u64,

    /// Network event URLs are truncated to this many characters
    pub max_url_length: usize,

    /// Conflict notification policy for no-go goals
    pub conflict_policy: ConflictNotificationPolicy,

    /// Database URL for the SQLite store
    pub database_url: String,

    /// Log level
    pub log_level: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            combine_interval_ms: 15 * 60 * 1000,
            skip_window_ms: 5 * 1000,
            clock_skew_tolerance_ms: 10 * 1000,
            minimum_activity_duration_ms: 60 * 1000,
            max_url_length: 2048,
            conflict_policy: ConflictNotificationPolicy::OnEveryChange,
            database_url: "sqlite::memory:".to_string(),
            log_level: "info".to_string(),
        }
    }
}

fn seconds_to_ms(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().and_then(|s| s.checked_mul(1000))
}

impl AnalysisConfig {
    /// Reads `ACTIVITY_ANALYSIS_*` variables over the defaults and validates the result
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = env::var("ACTIVITY_ANALYSIS_COMBINE_INTERVAL_SECONDS") {
            config.combine_interval_ms =
                seconds_to_ms(&value).ok_or(ConfigError::InvalidCombineInterval(value))?;
        }

        if let Ok(value) = env::var("ACTIVITY_ANALYSIS_SKIP_WINDOW_SECONDS") {
            config.skip_window_ms =
                seconds_to_ms(&value).ok_or(ConfigError::InvalidSkipWindow(value))?;
        }

        if let Ok(value) = env::var("ACTIVITY_ANALYSIS_CLOCK_SKEW_TOLERANCE_SECONDS") {
            config.clock_skew_tolerance_ms =
                seconds_to_ms(&value).ok_or(ConfigError::InvalidClockSkewTolerance(value))?;
        }

        if let Ok(value) = env::var("ACTIVITY_ANALYSIS_MINIMUM_ACTIVITY_SECONDS") {
            config.minimum_activity_duration_ms =
                seconds_to_ms(&value).ok_or(ConfigError::InvalidMinimumDuration(value))?;
        }

        if let Ok(value) = env::var("ACTIVITY_ANALYSIS_MAX_URL_LENGTH") {
            config.max_url_length = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidMaxUrlLength(value))?;
        }

        if let Ok(value) = env::var("ACTIVITY_ANALYSIS_CONFLICT_POLICY") {
            config.conflict_policy = ConflictNotificationPolicy::from_str(value.trim())
                .map_err(|_| ConfigError::InvalidConflictPolicy(value))?;
        }

        if let Ok(database_url) = env::var("ACTIVITY_ANALYSIS_DATABASE_URL") {
            config.database_url = database_url;
        }

        if let Ok(log_level) = env::var("ACTIVITY_ANALYSIS_LOG_LEVEL") {
            config.log_level = log_level;
        }

        config.validate()?;

        Ok(config)
    }

    /// Cross-field checks on the merge windows and limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.combine_interval_ms == 0 {
            return Err(ConfigError::InvalidCombineInterval(
                self.combine_interval_ms.to_string(),
            ));
        }

        if self.skip_window_ms >= self.combine_interval_ms {
            return Err(ConfigError::SkipWindowNotBelowCombineInterval {
                skip_window_ms: self.skip_window_ms,
                combine_interval_ms: self.combine_interval_ms,
            });
        }

        if self.minimum_activity_duration_ms == 0
            || self.minimum_activity_duration_ms >= 24 * 60 * 60 * 1000
        {
            return Err(ConfigError::InvalidMinimumDuration(
                self.minimum_activity_duration_ms.to_string(),
            ));
        }

        if self.max_url_length == 0 {
            return Err(ConfigError::InvalidMaxUrlLength(self.max_url_length.to_string()));
        }

        if self.database_url.is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }

        Ok(())
    }

    pub fn combine_interval(&self) -> Duration {
        Duration::milliseconds(self.combine_interval_ms as i64)
    }

    pub fn skip_window(&self) -> Duration {
        Duration::milliseconds(self.skip_window_ms as i64)
    }

    pub fn clock_skew_tolerance(&self) -> Duration {
        Duration::milliseconds(self.clock_skew_tolerance_ms as i64)
    }

    pub fn minimum_activity_duration(&self) -> Duration {
        Duration::milliseconds(self.minimum_activity_duration_ms as i64)
    }

    /// Logs the effective settings with credentials masked
    pub fn log_config(&self) {
        info!("Configuration loaded:");
        info!("  Combine interval: {}ms", self.combine_interval_ms);
        info!("  Skip window: {}ms", self.skip_window_ms);
        info!("  Clock skew tolerance: {}ms", self.clock_skew_tolerance_ms);
        info!("  Minimum activity duration: {}ms", self.minimum_activity_duration_ms);
        info!("  Max URL length: {}", self.max_url_length);
        info!("  Conflict policy: {}", self.conflict_policy);
        info!("  Database URL: {}", self.mask_database_url());
        info!("  Log level: {}", self.log_level);
    }

    /// Keeps only the scheme of non-SQLite URLs
    fn mask_database_url(&self) -> String {
        if self.database_url.starts_with("sqlite:") {
            self.database_url.clone()
        } else if let Some((scheme, _)) = self.database_url.split_once("://") {
            format!("{scheme}://***")
        } else {
            "***".to_string()
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid combine interval: {0}")]
    InvalidCombineInterval(String),

    #[error("Invalid skip window: {0}")]
    InvalidSkipWindow(String),

    #[error("Invalid clock skew tolerance: {0}")]
    InvalidClockSkewTolerance(String),

    #[error("Invalid minimum activity duration: {0}")]
    InvalidMinimumDuration(String),

    #[error("Invalid max URL length: {0}")]
    InvalidMaxUrlLength(String),

    #[error("Invalid conflict policy: {0} (expected on_every_change or on_new_activity)")]
    InvalidConflictPolicy(String),

    #[error("Skip window {skip_window_ms}ms is not below combine interval {combine_interval_ms}ms")]
    SkipWindowNotBelowCombineInterval {
        skip_window_ms: u64,
        combine_interval_ms: u64,
    },

    #[error("Empty database URL")]
    EmptyDatabaseUrl,
}
