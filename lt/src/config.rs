//! Configuration for the `lt` demo

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Main `lt` configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Demo run settings
    pub demo: DemoConfig,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./.latest.yml`, then `~/.config/latest/latest.yml`,
    /// then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for path in Self::default_paths() {
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Any failure yields None; the full load reports it later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::default_paths(),
        };

        candidates
            .iter()
            .find(|path| path.exists())
            .and_then(|path| Self::load_from_file(path).ok())
            .and_then(|config| config.log_level)
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".latest.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("latest").join("latest.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Demo run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of subscribers
    pub subscribers: usize,

    /// Number of updates to publish (values 1..=updates)
    pub updates: u64,

    /// Pause between updates in milliseconds
    #[serde(rename = "interval-ms")]
    pub interval_ms: u64,

    /// Receive delay of the first subscriber in milliseconds
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Added receive delay per further subscriber in milliseconds
    #[serde(rename = "delay-step-ms")]
    pub delay_step_ms: u64,

    /// How long consumers may take to see the final update after publishing ends
    #[serde(rename = "settle-timeout-ms")]
    pub settle_timeout_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            subscribers: 3,
            updates: 100,
            interval_ms: 5,
            base_delay_ms: 0,
            delay_step_ms: 20,
            settle_timeout_ms: 5_000,
        }
    }
}

impl DemoConfig {
    /// Apply command-line overrides
    pub fn with_overrides(mut self, subscribers: Option<usize>, updates: Option<u64>, interval_ms: Option<u64>) -> Self {
        debug!(?subscribers, ?updates, ?interval_ms, "DemoConfig::with_overrides: called");
        if let Some(subscribers) = subscribers {
            self.subscribers = subscribers;
        }
        if let Some(updates) = updates {
            self.updates = updates;
        }
        if let Some(interval_ms) = interval_ms {
            self.interval_ms = interval_ms;
        }
        self
    }

    /// Receive delay in milliseconds for the subscriber at `index`
    ///
    /// Saturates at `u64::MAX` instead of wrapping.
    pub fn delay_ms_for(&self, index: usize) -> u64 {
        let index = u64::try_from(index).unwrap_or(u64::MAX);
        self.delay_step_ms.saturating_mul(index).saturating_add(self.base_delay_ms)
    }

    /// Receive delay for the subscriber at `index`
    pub fn delay_for(&self, index: usize) -> Duration {
        Duration::from_millis(self.delay_ms_for(index))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}
