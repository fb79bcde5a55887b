//! Exporter configuration
//!
//! Values come from built-in defaults, optionally overlaid by a TOML file,
//! then by command-line flags.

use crate::postqueue::{ShowqAddress, DEFAULT_SHOWQ_PATH};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_STATSD_ADDR: &str = "127.0.0.1:8125";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid showq address: {0}")]
    Address(String),

    #[error("collection interval must be at least 1 second")]
    ZeroInterval,

    #[error("invalid statsd address `{0}`, expected HOST:PORT")]
    StatsdAddress(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "logfmt" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{}`", other)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// DogStatsD push target for published snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsdConfig {
    pub enabled: bool,
    /// Agent address, `HOST:PORT`
    pub addr: String,
    /// Prepended to every metric name with a `.` when not empty
    pub prefix: String,
    /// Tags added to every metric, `key:value`
    pub tags: Vec<String>,
}

impl Default for StatsdConfig {
    fn default() -> Self {
        StatsdConfig {
            enabled: true,
            addr: DEFAULT_STATSD_ADDR.to_string(),
            prefix: String::new(),
            tags: Vec::new(),
        }
    }
}

impl StatsdConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        match self.addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
            _ => Err(ConfigError::StatsdAddress(self.addr.clone())),
        }
    }
}

/// Exporter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// showq endpoint: `unix:/path`, `tcp:host:port`, or a bare path
    pub showq_address: String,
    /// Seconds between queue snapshots
    pub interval_secs: u64,
    /// Workers per snapshot; 0 means one per available CPU
    pub workers: usize,
    pub log: LogConfig,
    pub statsd: StatsdConfig,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        ExporterConfig {
            showq_address: DEFAULT_SHOWQ_PATH.to_string(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            workers: 0,
            log: LogConfig::default(),
            statsd: StatsdConfig::default(),
        }
    }
}

impl ExporterConfig {
    /// Load from a TOML file; keys not present keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Check the values the core depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        self.showq_address()?;
        self.statsd.validate()
    }

    pub fn showq_address(&self) -> Result<ShowqAddress, ConfigError> {
        self.showq_address.parse().map_err(ConfigError::Address)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn with_showq_address(mut self, address: impl Into<String>) -> Self {
        self.showq_address = address.into();
        self
    }

    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }
}
