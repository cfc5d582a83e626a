//! Configuration loading
//!
//! Settings come from an optional TOML file, then `LOGWARDEN_*` environment
//! variables, and are validated before any component is built from them.

/// Environment variable overrides
pub mod env;

use crate::alerts::RecordPolicy;
use crate::analysis::{ErrorClassifier, ThresholdConfig, DEFAULT_ERROR_PATTERNS};
use crate::error::ConfigError;
use crate::events::{SourceKind, DEFAULT_MAX_MESSAGE_LENGTH};
use crate::sources::{LogGroupSource, ObjectStoreSource, RecordSource};
use chrono::Duration;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub thresholds: ThresholdConfig,
    pub analysis: AnalysisConfig,
    pub sources: Vec<SourceConfig>,
    pub alerts: AlertsConfig,
    pub monitor: MonitorConfig,
}

/// Classification and batching settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Regular expressions marking a line as an error, matched case-insensitively
    pub error_patterns: Vec<String>,
    /// Classified error messages are truncated to this many characters
    pub max_message_length: usize,
    /// Records fetched per source and cycle
    pub max_batch_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            error_patterns: DEFAULT_ERROR_PATTERNS.iter().map(|p| p.to_string()).collect(),
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            max_batch_size: 1000,
        }
    }
}

/// One monitored source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    pub id: String,
    pub kind: SourceKind,
    /// Event file for log groups, bucket directory for object storage
    pub path: PathBuf,
    /// Most recent objects read per cycle (object storage only)
    #[serde(default = "default_max_objects")]
    pub max_objects: usize,
}

fn default_max_objects() -> usize {
    5
}

impl SourceConfig {
    /// Build the record source this entry describes
    pub fn build(&self) -> Arc<dyn RecordSource> {
        match self.kind {
            SourceKind::LogGroup => Arc::new(LogGroupSource::new(&self.id, &self.path)),
            SourceKind::ObjectStorage => Arc::new(ObjectStoreSource::new(
                &self.id,
                &self.path,
                self.max_objects,
            )),
        }
    }
}

/// Alert delivery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertsConfig {
    pub cooldown_minutes: u64,
    pub record_policy: RecordPolicy,
    /// Endpoint alerts are POSTed to, in addition to the log
    pub webhook_url: Option<String>,
    /// Errors listed in an alert body
    pub max_listed_errors: usize,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: 30,
            record_policy: RecordPolicy::default(),
            webhook_url: None,
            max_listed_errors: 10,
        }
    }
}

/// Watch-mode settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
        }
    }
}

impl Config {
    /// Parse configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read, or
    /// `ConfigError::TomlError` if its contents are not valid configuration.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load, overlay the environment and validate
    ///
    /// # Arguments
    ///
    /// * `path` - Optional configuration file; a missing file falls back to defaults
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but is invalid, an environment
    /// override cannot be parsed, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                info!("Loading configuration from: {}", path.display());
                Self::from_file(path)?
            }
            Some(path) => {
                warn!(
                    "Configuration file '{}' not found, using defaults",
                    path.display()
                );
                Self::default()
            }
            None => {
                info!("Using default configuration");
                Self::default()
            }
        };

        env::apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges, source ids and error patterns
    ///
    /// # Errors
    ///
    /// Returns the first problem found as a `ConfigError`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        for (name, value) in [
            ("max_avg_response_time_ms", t.max_avg_response_time_ms),
            ("max_p95_response_time_ms", t.max_p95_response_time_ms),
            ("max_memory_percent", t.max_memory_percent),
            ("max_disk_percent", t.max_disk_percent),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "thresholds.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        check_minutes("thresholds.error_window_minutes", t.error_window_minutes)?;
        check_minutes("alerts.cooldown_minutes", self.alerts.cooldown_minutes)?;
        if self.analysis.max_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.max_batch_size must be positive".to_string(),
            ));
        }
        if self.monitor.interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "monitor.interval_seconds must be positive".to_string(),
            ));
        }
        if let Some(url) = &self.alerts.webhook_url {
            if url.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "alerts.webhook_url must not be empty".to_string(),
                ));
            }
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "source id must not be empty".to_string(),
                ));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate source id '{}'",
                    source.id
                )));
            }
        }

        self.classifier().map(|_| ())
    }

    /// Compile the configured error patterns
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` for the first pattern that does not compile.
    pub fn classifier(&self) -> Result<ErrorClassifier, ConfigError> {
        ErrorClassifier::new(self.analysis.error_patterns.as_slice())
    }

    /// Record sources in configured order
    pub fn build_sources(&self) -> Vec<Arc<dyn RecordSource>> {
        self.sources.iter().map(SourceConfig::build).collect()
    }

    /// Alert cooldown as a duration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `alerts.cooldown_minutes` is
    /// zero or longer than [`MAX_WINDOW_MINUTES`].
    pub fn cooldown(&self) -> Result<Duration, ConfigError> {
        check_minutes("alerts.cooldown_minutes", self.alerts.cooldown_minutes)
    }
}

/// Upper bound for minute-valued settings (one year)
pub const MAX_WINDOW_MINUTES: u64 = 525_600;

fn check_minutes(name: &str, minutes: u64) -> Result<Duration, ConfigError> {
    if minutes == 0 || minutes > MAX_WINDOW_MINUTES {
        return Err(ConfigError::ValidationError(format!(
            "{} must be between 1 and {}, got {}",
            name, MAX_WINDOW_MINUTES, minutes
        )));
    }
    i64::try_from(minutes)
        .ok()
        .and_then(Duration::try_minutes)
        .ok_or_else(|| ConfigError::ValidationError(format!("{} is out of range", name)))
}
