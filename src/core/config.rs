//! Configuration management for Boardpulse.
//!
//! Handles loading configuration from TOML files and validating the
//! numeric knobs the engine consumes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::RetryConfig;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "BOARDPULSE_CONFIG";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metric and recommendation thresholds
    pub engine: EngineConfig,

    /// Data source settings
    pub source: SourceConfig,

    /// Output settings
    pub output: OutputConfig,
}

/// Thresholds and limits consumed by the metric and recommendation engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// WIP limit used when the board does not configure one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,

    /// Open items one person can carry before reaching 100% load
    pub assignee_capacity: u32,

    /// Hours in an in-progress status before an item counts as stalled
    pub stall_threshold_hours: f64,

    /// Per item type stall thresholds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stall_overrides: Vec<StallOverride>,

    /// Story points at which a stalled item should be split
    pub split_points_threshold: f64,

    /// Story points at which an item is too large for a flow board
    pub flow_large_points_threshold: f64,

    /// Items sampled from each bucket (stalled, blocked, aging)
    pub sample_per_bucket: usize,

    /// Maximum recommendations returned
    pub max_recommendations: usize,

    /// Maximum clauses in an item description
    pub narrator_max_clauses: usize,
}

/// Stall threshold override for one item type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StallOverride {
    /// Item type name (matched case-insensitively)
    pub item_type: String,

    /// Threshold in hours
    pub hours: f64,
}

/// Data source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Jira site URL (e.g., "https://acme.atlassian.net")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jira_url: Option<String>,

    /// Jira account email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jira_email: Option<String>,

    /// Retries after the first failed attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_backoff_ms: u64,

    /// Upper bound on any retry delay
    pub max_backoff_ms: u64,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// Maximum issues fetched per refresh
    pub max_issues: u32,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format (text, json)
    pub format: String,
}

/// Invalid configuration, rejected before any computation runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be positive (got {value})")]
    NonPositive { field: &'static str, value: f64 },

    #[error("duplicate stall override for item type '{0}'")]
    DuplicateStallOverride(String),

    #[error("stall override has an empty item type")]
    EmptyItemType,

    #[error("unknown output format '{0}' (expected text or json)")]
    UnknownFormat(String),

    #[error("max_backoff_ms ({max}) is below initial_backoff_ms ({initial})")]
    BackoffOrder { initial: u64, max: u64 },
}

impl EngineConfig {
    /// Validate every knob.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(limit) = self.wip_limit {
            positive("wip_limit", f64::from(limit))?;
        }
        positive("assignee_capacity", f64::from(self.assignee_capacity))?;
        positive("stall_threshold_hours", self.stall_threshold_hours)?;
        positive("split_points_threshold", self.split_points_threshold)?;
        positive("flow_large_points_threshold", self.flow_large_points_threshold)?;
        positive("sample_per_bucket", self.sample_per_bucket as f64)?;
        positive("max_recommendations", self.max_recommendations as f64)?;
        positive("narrator_max_clauses", self.narrator_max_clauses as f64)?;

        let mut seen = HashSet::new();
        for entry in &self.stall_overrides {
            let key = entry.item_type.trim().to_lowercase();
            if key.is_empty() {
                return Err(ConfigError::EmptyItemType);
            }
            positive("stall_overrides.hours", entry.hours)?;
            if !seen.insert(key) {
                return Err(ConfigError::DuplicateStallOverride(entry.item_type.clone()));
            }
        }

        Ok(())
    }

    /// Stall threshold for an item type, falling back to the global one.
    pub fn stall_threshold_for(&self, item_type: &str) -> f64 {
        let item_type = item_type.trim();
        self.stall_overrides
            .iter()
            .find(|o| o.item_type.trim().eq_ignore_ascii_case(item_type))
            .map(|o| o.hours)
            .unwrap_or(self.stall_threshold_hours)
    }

    /// Add a per-type stall threshold.
    pub fn with_stall_override(mut self, item_type: impl Into<String>, hours: f64) -> Self {
        self.stall_overrides.push(StallOverride { item_type: item_type.into(), hours });
        self
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

impl SourceConfig {
    /// Reject settings that would make every fetch fail or return nothing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("request_timeout_secs", self.request_timeout_secs as f64)?;
        positive("max_issues", f64::from(self.max_issues))?;
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ConfigError::BackoffOrder {
                initial: self.initial_backoff_ms,
                max: self.max_backoff_ms,
            });
        }
        Ok(())
    }

    /// Retry policy for source fetches.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms),
            attempt_timeout: Some(Duration::from_secs(self.request_timeout_secs)),
            ..RetryConfig::fetch()
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. The file named by `BOARDPULSE_CONFIG`
    /// 2. `.boardpulse.toml` in current directory
    /// 3. `~/.config/boardpulse/config.toml`
    /// 4. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load_from_file(Path::new(&path));
        }

        let local_config = PathBuf::from(".boardpulse.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Validate all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.source.validate()?;
        match self.output.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::UnknownFormat(other.to_string())),
        }
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("boardpulse"))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wip_limit: Some(8),
            assignee_capacity: 3,
            stall_threshold_hours: 24.0,
            stall_overrides: Vec::new(),
            split_points_threshold: 5.0,
            flow_large_points_threshold: 8.0,
            sample_per_bucket: 3,
            max_recommendations: 6,
            narrator_max_clauses: 3,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            jira_url: None,
            jira_email: None,
            max_retries: 2,
            initial_backoff_ms: 200,
            max_backoff_ms: 2000,
            request_timeout_secs: 30,
            max_issues: 500,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { format: "text".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.wip_limit, Some(8));
        assert_eq!(config.engine.assignee_capacity, 3);
        assert!((config.engine.stall_threshold_hours - 24.0).abs() < f64::EPSILON);
        assert_eq!(config.output.format, "text");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [engine]
            wip_limit = 12
            assignee_capacity = 4
            split_points_threshold = 3

            [[engine.stall_overrides]]
            item_type = "Bug"
            hours = 8

            [source]
            jira_url = "https://acme.atlassian.net"
            max_retries = 1
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.wip_limit, Some(12));
        assert_eq!(config.engine.assignee_capacity, 4);
        assert!((config.engine.split_points_threshold - 3.0).abs() < f64::EPSILON);
        assert!((config.engine.flow_large_points_threshold - 8.0).abs() < f64::EPSILON);
        assert_eq!(config.engine.stall_overrides.len(), 1);
        assert_eq!(config.source.jira_url.as_deref(), Some("https://acme.atlassian.net"));
        assert_eq!(config.source.max_retries, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[engine]"));
        assert!(toml_str.contains("[source]"));
        assert!(toml_str.contains("wip_limit = 8"));
    }

    #[test]
    fn test_stall_threshold_override_lookup() {
        let engine = EngineConfig::default().with_stall_override("Bug", 8.0);
        assert!((engine.stall_threshold_for("bug") - 8.0).abs() < f64::EPSILON);
        assert!((engine.stall_threshold_for("Story") - 24.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_non_positive_thresholds() {
        let engine = EngineConfig { stall_threshold_hours: 0.0, ..Default::default() };
        assert!(matches!(
            engine.validate(),
            Err(ConfigError::NonPositive { field: "stall_threshold_hours", .. })
        ));

        let engine = EngineConfig { assignee_capacity: 0, ..Default::default() };
        assert!(engine.validate().is_err());

        let engine = EngineConfig { wip_limit: Some(0), ..Default::default() };
        assert!(engine.validate().is_err());

        let engine = EngineConfig { split_points_threshold: f64::NAN, ..Default::default() };
        assert!(engine.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_stall_override() {
        let engine = EngineConfig::default()
            .with_stall_override("Bug", 8.0)
            .with_stall_override(" bug ", 12.0);
        assert_eq!(engine.validate(), Err(ConfigError::DuplicateStallOverride(" bug ".to_string())));
    }

    #[test]
    fn test_rejects_empty_override_type() {
        let engine = EngineConfig::default().with_stall_override("  ", 8.0);
        assert_eq!(engine.validate(), Err(ConfigError::EmptyItemType));
    }

    #[test]
    fn test_rejects_unknown_format() {
        let mut config = Config::default();
        config.output.format = "yaml".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::UnknownFormat(_))));
    }

    #[test]
    fn test_rejects_unusable_source_settings() {
        let mut config = Config::default();
        config.source.request_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { field: "request_timeout_secs", .. })
        ));

        let source = SourceConfig { max_issues: 0, ..Default::default() };
        assert!(source.validate().is_err());

        let source = SourceConfig { initial_backoff_ms: 500, max_backoff_ms: 100, ..Default::default() };
        assert_eq!(source.validate(), Err(ConfigError::BackoffOrder { initial: 500, max: 100 }));

        assert!(SourceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_retry_config_from_source() {
        let source = SourceConfig { max_retries: 4, initial_backoff_ms: 10, ..Default::default() };
        let retry = source.retry_config();
        assert_eq!(retry.max_retries, 4);
        assert_eq!(retry.initial_delay, Duration::from_millis(10));
        assert_eq!(retry.max_delay, Duration::from_millis(2000));
    }
}
