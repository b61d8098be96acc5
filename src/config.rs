use serde::{Deserialize, Serialize};
use anyhow::{bail, Result};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::scheduler::Termination;

/// Environment variable naming an optional JSON config file.
pub const CONFIG_ENV: &str = "TCPING_CONFIG";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    pub port: u16,
    /// Attempts to make, 0 for endless pinging.
    pub count: u64,
    pub timeout_secs: f64,
    pub interval_secs: f64,
    pub report: bool,
    pub log_level: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            port: 80,
            count: 0,
            timeout_secs: 1.0,
            interval_secs: 1.0,
            report: true,
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl ProbeConfig {
    /// Defaults, or the file named by `TCPING_CONFIG` when it is set.
    pub async fn load() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load_file_config(&path).await,
            Err(_) => Ok(Self::default()),
        }
    }

    pub async fn load_file_config(file_path: &str) -> Result<ProbeConfig> {
        if !Path::new(file_path).exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", file_path));
        }

        let content = fs::read_to_string(file_path).await?;
        let config: ProbeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!("Invalid log level: {}. Valid levels are: trace, debug, info, warn, error", self.log_level))
        }
    }

    /// Check every value before any probing starts.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("Invalid port: 0. Port must be between 1 and 65535");
        }
        if !self.timeout_secs.is_finite() || self.timeout_secs <= 0.0 {
            bail!("Invalid timeout: {}. Timeout must be a positive number of seconds", self.timeout_secs);
        }
        if !self.interval_secs.is_finite() || self.interval_secs < 0.0 {
            bail!("Invalid interval: {}. Interval must be zero or more seconds", self.interval_secs);
        }
        self.get_tracing_level().map(|_| ())
    }

    pub fn timeout(&self) -> Result<Duration> {
        Ok(Duration::try_from_secs_f64(self.timeout_secs)?)
    }

    pub fn interval(&self) -> Result<Duration> {
        Ok(Duration::try_from_secs_f64(self.interval_secs)?)
    }

    pub fn termination(&self) -> Termination {
        Termination::from_count(self.count)
    }
}
