//! Configuration system for Floodgate.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $FLOODGATE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/floodgate/config.toml
//!   3. ~/.config/floodgate/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodgateConfig {
    pub bucket: BucketConfig,
    pub queue: QueueConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    /// Commands that may be sent back to back after an idle period.
    pub capacity: u32,
    /// Seconds to earn one permit back. Steady-state rate is 1 / this.
    pub refill_interval_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Max queued commands. 0 = unbounded.
    pub max_depth: usize,
    /// What happens to an enqueue when `max_depth` is reached.
    pub overflow: OverflowPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Seconds between channel stats log lines. 0 = never.
    pub stats_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Fail the new enqueue with `QueueError::Full`.
    #[default]
    Reject,
    /// Evict the head and count it as dropped.
    DropOldest,
}

impl FromStr for OverflowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(Self::Reject),
            "drop-oldest" | "drop_oldest" => Ok(Self::DropOldest),
            other => Err(ConfigError::Invalid(format!(
                "unknown overflow policy {other:?} (expected \"reject\" or \"drop-oldest\")"
            ))),
        }
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            refill_interval_secs: 1.5,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_depth: 0,
            overflow: OverflowPolicy::Reject,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: 10,
        }
    }
}

impl BucketConfig {
    /// Refill interval as a `Duration`. Assumes [`validate`](Self::validate)
    /// passed; an out-of-range value falls back to the default interval.
    pub fn refill_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.refill_interval_secs).unwrap_or_else(|_| {
            Duration::from_secs_f64(BucketConfig::default().refill_interval_secs)
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("bucket.capacity must be at least 1".into()));
        }
        let secs = self.refill_interval_secs;
        if !secs.is_finite() || secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
            return Err(ConfigError::Invalid(format!(
                "bucket.refill_interval_secs must be a positive number of seconds, got {secs}"
            )));
        }
        Ok(())
    }
}

impl QueueConfig {
    /// `None` when unbounded.
    pub fn max_depth(&self) -> Option<usize> {
        (self.max_depth > 0).then_some(self.max_depth)
    }
}

impl LoggingConfig {
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("floodgate")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl FloodgateConfig {
    /// Load config from the default location: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load config from `path`, falling back to defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            FloodgateConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. No env overrides are applied.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: FloodgateConfig = toml::from_str(text)
            .map_err(|e| ConfigError::ParseFailed(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("FLOODGATE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config to `path` if nothing is there. Returns the path.
    pub fn write_default_if_missing(path: &Path) -> Result<PathBuf, ConfigError> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
            }
            let text = toml::to_string_pretty(&FloodgateConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(path, text)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        Ok(path.to_path_buf())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bucket.validate()
    }

    /// Apply FLOODGATE_* env var overrides. Unparseable values are ignored.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FLOODGATE_BUCKET__CAPACITY") {
            if let Ok(n) = v.parse() {
                self.bucket.capacity = n;
            }
        }
        if let Some(v) = lookup("FLOODGATE_BUCKET__REFILL_INTERVAL_SECS") {
            if let Ok(secs) = v.parse() {
                self.bucket.refill_interval_secs = secs;
            }
        }
        if let Some(v) = lookup("FLOODGATE_QUEUE__MAX_DEPTH") {
            if let Ok(n) = v.parse() {
                self.queue.max_depth = n;
            }
        }
        if let Some(v) = lookup("FLOODGATE_QUEUE__OVERFLOW") {
            match v.parse() {
                Ok(policy) => self.queue.overflow = policy,
                Err(e) => tracing::warn!(error = %e, "ignoring FLOODGATE_QUEUE__OVERFLOW"),
            }
        }
    }
}
