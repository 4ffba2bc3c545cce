//! Configuration management (TOML)

use crate::audit::{self, AuditLog};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub poll_interval_seconds: f64,
    pub error_backoff_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub watched_processes: Vec<String>,
    pub threshold_percent: f64,
    pub sample_window_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            poll_interval_seconds: 5.0,
            error_backoff_seconds: 2.0,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            watched_processes: vec!["CTFarm.exe".to_string()],
            threshold_percent: 50.0,
            sample_window_ms: 100,
        }
    }
}

/// Values given on the command line, applied over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub threshold_percent: Option<f64>,
    pub poll_interval_seconds: Option<f64>,
    pub watched_processes: Vec<String>,
    pub log_dir: Option<PathBuf>,
}

/// The resolved, validated policy. Built once at startup and never changed.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchPolicy {
    pub watched_names: BTreeSet<String>,
    pub threshold_percent: f64,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub sample_window: Duration,
    pub log_path: PathBuf,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, content).map_err(write_err)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "cpuwatch")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(threshold) = overrides.threshold_percent {
            self.detection.threshold_percent = threshold;
        }
        if let Some(interval) = overrides.poll_interval_seconds {
            self.general.poll_interval_seconds = interval;
        }
        if !overrides.watched_processes.is_empty() {
            self.detection.watched_processes = overrides.watched_processes;
        }
        if let Some(dir) = overrides.log_dir {
            self.audit.log_dir = Some(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };
        let detection = &self.detection;
        let general = &self.general;

        if detection.watched_processes.is_empty() {
            return invalid("watched_processes must name at least one process".into());
        }
        if detection.watched_processes.iter().any(|n| n.trim().is_empty()) {
            return invalid("watched_processes contains a blank name".into());
        }
        if !detection.threshold_percent.is_finite() || detection.threshold_percent < 0.0 {
            return invalid(format!(
                "threshold_percent must be a non-negative number, got {}",
                detection.threshold_percent
            ));
        }
        if detection.sample_window_ms == 0 {
            return invalid("sample_window_ms must be greater than zero".into());
        }
        if !general.poll_interval_seconds.is_finite() || general.poll_interval_seconds <= 0.0 {
            return invalid(format!(
                "poll_interval_seconds must be positive, got {}",
                general.poll_interval_seconds
            ));
        }
        if !general.error_backoff_seconds.is_finite()
            || general.error_backoff_seconds <= 0.0
            || general.error_backoff_seconds >= general.poll_interval_seconds
        {
            return invalid(format!(
                "error_backoff_seconds must be in (0, poll_interval_seconds), got {}",
                general.error_backoff_seconds
            ));
        }
        seconds("poll_interval_seconds", general.poll_interval_seconds)?;
        seconds("error_backoff_seconds", general.error_backoff_seconds)?;
        Ok(())
    }

    /// Validate and resolve against this host's name.
    pub fn policy(&self) -> Result<WatchPolicy, ConfigError> {
        let host = audit::host_name().map_err(ConfigError::HostName)?;
        self.policy_for_host(&host)
    }

    pub fn policy_for_host(&self, host: &str) -> Result<WatchPolicy, ConfigError> {
        self.validate()?;
        let log_dir = self.audit.log_dir.clone().unwrap_or_else(AuditLog::default_dir);
        Ok(WatchPolicy {
            watched_names: self.detection.watched_processes.iter().cloned().collect(),
            threshold_percent: self.detection.threshold_percent,
            poll_interval: seconds("poll_interval_seconds", self.general.poll_interval_seconds)?,
            error_backoff: seconds("error_backoff_seconds", self.general.error_backoff_seconds)?,
            sample_window: Duration::from_millis(self.detection.sample_window_ms),
            log_path: log_dir.join(AuditLog::file_name(host)),
        })
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| ConfigError::Invalid(format!("{field} is out of range, got {value}: {e}")))
}
