//! Monitored service definitions

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alerts::AlertConfig;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// A monitored target identified by `(group, name)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Service name
    pub name: String,
    /// Group the service belongs to (may be empty)
    #[serde(default)]
    pub group: String,
    /// Target handed to the evaluator as-is
    pub url: String,
    /// Time between two evaluations
    #[serde(default = "default_interval", with = "duration_secs")]
    pub interval: Duration,
    /// Condition expressions, opaque to the monitoring engine
    #[serde(default)]
    pub conditions: Vec<String>,
    /// Alerts attached to this service
    #[serde(default)]
    pub alerts: Vec<AlertConfig>,
    /// Skip TLS certificate verification for HTTPS targets
    #[serde(default)]
    pub insecure: bool,
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

impl Service {
    /// Create a service with the default interval and no alerts
    pub fn new(group: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            url: url.into(),
            interval: DEFAULT_INTERVAL,
            conditions: Vec::new(),
            alerts: Vec::new(),
            insecure: false,
        }
    }

    /// Set polling interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Attach an alert
    pub fn with_alert(mut self, alert: AlertConfig) -> Self {
        self.alerts.push(alert);
        self
    }

    /// Store key derived from group and name
    pub fn key(&self) -> String {
        service_key(&self.group, &self.name)
    }
}

/// Build the store key for a `(group, name)` pair.
///
/// Both parts are lowercased and characters that are awkward in URLs are
/// replaced by `-`, then joined with `_`.
pub fn service_key(group: &str, name: &str) -> String {
    format!("{}_{}", sanitize(group), sanitize(name))
}

fn sanitize(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '/' | '_' | ',' | '.' | '#' | ' ' => '-',
            c => c,
        })
        .collect()
}

/// Serialize a `Duration` as whole seconds
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_key() {
        assert_eq!(service_key("core", "api"), "core_api");
        assert_eq!(service_key("Core Services", "api.example/v1"), "core-services_api-example-v1");
        assert_eq!(service_key("", "front_end"), "_front-end");
    }

    #[test]
    fn test_deserialize_defaults() {
        let service: Service =
            serde_json::from_str(r#"{"name": "api", "url": "https://example.org"}"#).unwrap();

        assert_eq!(service.group, "");
        assert_eq!(service.interval, Duration::from_secs(60));
        assert!(service.alerts.is_empty());
        assert!(!service.insecure);
    }

    #[test]
    fn test_deserialize_interval_secs() {
        let service: Service = serde_json::from_str(
            r#"{"name": "db", "group": "core", "url": "tcp://db:5432", "interval": 15}"#,
        )
        .unwrap();

        assert_eq!(service.interval, Duration::from_secs(15));
        assert_eq!(service.key(), "core_db");
    }
}
