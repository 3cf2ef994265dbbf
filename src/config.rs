use crate::error::{ExporterError, Result};
use crate::showq::DEFAULT_SHOWQ_PATH;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9154";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_LOG_PATH: &str = "/var/log/mail.log";
pub const DEFAULT_JOURNAL_UNIT: &str = "postfix.service";
pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_address: String,
    pub metrics_path: String,
    /// Count lines no extractor recognised under `unsupported_log_entries`.
    pub log_unsupported_lines: bool,
    pub source: SourceConfig,
    pub showq: ShowqConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            log_unsupported_lines: true,
            source: SourceConfig::default(),
            showq: ShowqConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    File(FileSourceConfig),
    Journal(JournalSourceConfig),
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::File(FileSourceConfig::default())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileSourceConfig {
    pub path: PathBuf,
    pub poll_interval_ms: u64,
    /// How long the path may stay missing after a rotation before giving up.
    pub rotation_grace_secs: u64,
}

impl Default for FileSourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LOG_PATH),
            poll_interval_ms: 250,
            rotation_grace_secs: 60,
        }
    }
}

impl FileSourceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn rotation_grace(&self) -> Duration {
        Duration::from_secs(self.rotation_grace_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct JournalSourceConfig {
    pub units: Vec<String>,
    pub journalctl_path: PathBuf,
    /// Resume after this journal cursor instead of starting at the tail.
    pub cursor: Option<String>,
}

impl Default for JournalSourceConfig {
    fn default() -> Self {
        Self {
            units: vec![DEFAULT_JOURNAL_UNIT.to_string()],
            journalctl_path: PathBuf::from("journalctl"),
            cursor: None,
        }
    }
}

/// Queue snapshot read from the showq socket on every scrape.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShowqConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub timeout_ms: u64,
}

impl Default for ShowqConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(DEFAULT_SHOWQ_PATH),
            timeout_ms: 5000,
        }
    }
}

impl ShowqConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for the daily-rolling JSON log file. Console only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            ExporterError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `POSTFIX_EXPORTER_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("POSTFIX_EXPORTER_LISTEN_ADDRESS") {
            self.listen_address = addr;
        }
        if let Ok(path) = std::env::var("POSTFIX_EXPORTER_METRICS_PATH") {
            self.metrics_path = path;
        }
        if let Ok(flag) = std::env::var("POSTFIX_EXPORTER_LOG_UNSUPPORTED") {
            self.log_unsupported_lines = parse_bool(&flag).ok_or_else(|| {
                ExporterError::Config(format!(
                    "POSTFIX_EXPORTER_LOG_UNSUPPORTED must be true or false, got '{}'",
                    flag
                ))
            })?;
        }
        if let Ok(path) = std::env::var("POSTFIX_EXPORTER_SHOWQ_PATH") {
            self.showq.path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("POSTFIX_EXPORTER_LOG_PATH") {
            self.source = SourceConfig::File(FileSourceConfig {
                path: PathBuf::from(path),
                ..FileSourceConfig::default()
            });
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.metrics_path.starts_with('/') {
            return Err(ExporterError::Config(format!(
                "metrics_path must start with '/', got '{}'",
                self.metrics_path
            )));
        }
        if self.metrics_path == HEALTH_PATH {
            return Err(ExporterError::Config(format!(
                "metrics_path cannot be '{}', it is reserved for the health check",
                HEALTH_PATH
            )));
        }
        if self.showq.enabled && self.showq.path.as_os_str().is_empty() {
            return Err(ExporterError::Config(
                "showq.path cannot be empty while showq is enabled".to_string(),
            ));
        }
        if let SourceConfig::Journal(journal) = &self.source {
            if journal.units.is_empty() {
                return Err(ExporterError::Config(
                    "journal source needs at least one unit".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
