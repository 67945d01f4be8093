//! Configuration file

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alerts::{WebhookConfig, LOG_PROVIDER};
use crate::data::{Retention, Service};
use crate::monitor::{MonitorSettings, DEFAULT_STAGGER};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub services: Vec<Service>,
    /// Webhook providers by name; `log` is always available
    pub alerting: HashMap<String, WebhookConfig>,
    /// Let evaluations of different services run concurrently
    pub disable_monitoring_lock: bool,
    pub debug: bool,
    /// Count results by service, status and outcome
    pub metrics: bool,
    pub storage: StorageConfig,
    pub web: WebConfig,
    pub cache: CacheConfig,
    /// Protects the status routes when set
    pub security: Option<SecurityConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot file; history is kept in memory only when unset
    pub file: Option<PathBuf>,
    pub max_results: usize,
    pub max_events: usize,
    pub flush_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let retention = Retention::default();
        Self {
            file: None,
            max_results: retention.max_results,
            max_events: retention.max_events,
            flush_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub address: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 10,
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub basic: BasicAuthConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicAuthConfig {
    pub username: String,
    /// Hex-encoded SHA-512 of the password
    pub password_sha512: String,
}

impl SecurityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.basic.username.is_empty() {
            return Err(ConfigError::Invalid(
                "security.basic.username must not be empty".to_string(),
            ));
        }
        let hash = &self.basic.password_sha512;
        if hash.len() != 128 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::Invalid(
                "security.basic.password_sha512 must be a hex-encoded SHA-512 hash".to_string(),
            ));
        }
        Ok(())
    }
}

impl MonitorConfig {
    /// Read, parse and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut keys = HashSet::new();

        for service in &self.services {
            if service.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "service in group '{}' has no name",
                    service.group
                )));
            }
            if service.interval.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "service {} has a zero interval",
                    service.key()
                )));
            }
            if !keys.insert(service.key()) {
                return Err(ConfigError::Invalid(format!(
                    "service {} is configured more than once",
                    service.key()
                )));
            }
            for alert in &service.alerts {
                if alert.provider != LOG_PROVIDER && !self.alerting.contains_key(&alert.provider) {
                    return Err(ConfigError::Invalid(format!(
                        "service {} uses unknown alerting provider '{}'",
                        service.key(),
                        alert.provider
                    )));
                }
            }
        }

        if self.storage.max_results == 0 || self.storage.max_events == 0 {
            return Err(ConfigError::Invalid(
                "storage.max_results and storage.max_events must be positive".to_string(),
            ));
        }

        if let Some(security) = &self.security {
            security.validate()?;
        }

        Ok(())
    }

    pub fn retention(&self) -> Retention {
        Retention {
            max_results: self.storage.max_results,
            max_events: self.storage.max_events,
            ..Retention::default()
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            serialize_evaluations: !self.disable_monitoring_lock,
            stagger: DEFAULT_STAGGER,
            debug: self.debug,
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.storage.flush_interval_secs.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
