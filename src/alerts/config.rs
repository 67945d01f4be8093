//! Alert configuration and runtime state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_failure_threshold() -> u32 {
    3
}

fn default_success_threshold() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

/// Alert definition attached to a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Name of the notifier that delivers this alert
    #[serde(rename = "type")]
    pub provider: String,
    /// Free-form text included in notifications
    #[serde(default)]
    pub description: Option<String>,
    /// Consecutive failures needed to trigger
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Consecutive successes needed to resolve
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether to notify when the alert resolves
    #[serde(default = "default_true")]
    pub send_on_resolved: bool,
}

impl AlertConfig {
    /// Create an alert for `provider` with default thresholds
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            description: None,
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            enabled: true,
            send_on_resolved: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_thresholds(mut self, failure: u32, success: u32) -> Self {
        self.failure_threshold = failure;
        self.success_threshold = success;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_send_on_resolved(mut self, send_on_resolved: bool) -> Self {
        self.send_on_resolved = send_on_resolved;
        self
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

/// Whether an alert is currently firing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPhase {
    #[default]
    Idle,
    Triggered,
}

/// Edge produced when an alert changes phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTransition {
    Triggered,
    Resolved,
}

impl AlertTransition {
    pub fn is_resolved(self) -> bool {
        matches!(self, AlertTransition::Resolved)
    }
}

/// Runtime state of one alert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    pub phase: AlertPhase,
    /// Consecutive failed results
    pub failure_streak: u32,
    /// Consecutive successful results
    pub success_streak: u32,
    /// When the phase last changed
    pub last_transition: Option<DateTime<Utc>>,
}

impl AlertState {
    /// Feed one outcome into the state machine.
    ///
    /// Returns the transition only on the result that crosses a threshold;
    /// further results past the threshold return `None`.
    pub fn observe(
        &mut self,
        success: bool,
        at: DateTime<Utc>,
        config: &AlertConfig,
    ) -> Option<AlertTransition> {
        if success {
            self.success_streak = self.success_streak.saturating_add(1);
            self.failure_streak = 0;

            if self.phase == AlertPhase::Triggered
                && self.success_streak >= config.success_threshold.max(1)
            {
                self.phase = AlertPhase::Idle;
                self.last_transition = Some(at);
                return Some(AlertTransition::Resolved);
            }
        } else {
            self.failure_streak = self.failure_streak.saturating_add(1);
            self.success_streak = 0;

            if self.phase == AlertPhase::Idle
                && self.failure_streak >= config.failure_threshold.max(1)
            {
                self.phase = AlertPhase::Triggered;
                self.last_transition = Some(at);
                return Some(AlertTransition::Triggered);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_defaults_from_json() {
        let alert: AlertConfig = serde_json::from_str(r#"{"type": "log"}"#).unwrap();

        assert_eq!(alert.provider, "log");
        assert_eq!(alert.failure_threshold, 3);
        assert_eq!(alert.success_threshold, 2);
        assert!(alert.enabled);
        assert!(alert.send_on_resolved);
        assert_eq!(alert.description(), "");
    }

    #[test]
    fn test_observe_edges() {
        let config = AlertConfig::new("log").with_thresholds(3, 2);
        let mut state = AlertState::default();
        let now = Utc::now();

        assert_eq!(state.observe(false, now, &config), None);
        assert_eq!(state.observe(false, now, &config), None);
        assert_eq!(state.observe(false, now, &config), Some(AlertTransition::Triggered));
        assert_eq!(state.observe(false, now, &config), None);
        assert_eq!(state.phase, AlertPhase::Triggered);
        assert_eq!(state.failure_streak, 4);

        assert_eq!(state.observe(true, now, &config), None);
        assert_eq!(state.observe(true, now, &config), Some(AlertTransition::Resolved));
        assert_eq!(state.observe(true, now, &config), None);
        assert_eq!(state.phase, AlertPhase::Idle);
    }

    #[test]
    fn test_interrupted_streaks_do_not_transition() {
        let config = AlertConfig::new("log").with_thresholds(2, 2);
        let mut state = AlertState::default();
        let now = Utc::now();

        assert_eq!(state.observe(false, now, &config), None);
        assert_eq!(state.observe(true, now, &config), None);
        assert_eq!(state.observe(false, now, &config), None);
        assert_eq!(state.phase, AlertPhase::Idle);

        assert_eq!(state.observe(false, now, &config), Some(AlertTransition::Triggered));
        assert_eq!(state.observe(true, now, &config), None);
        assert_eq!(state.observe(false, now, &config), None);
        assert_eq!(state.observe(true, now, &config), None);
        assert_eq!(state.phase, AlertPhase::Triggered);
    }

    #[test]
    fn test_zero_threshold_behaves_as_one() {
        let config = AlertConfig::new("log").with_thresholds(0, 0);
        let mut state = AlertState::default();
        let now = Utc::now();

        assert_eq!(state.observe(false, now, &config), Some(AlertTransition::Triggered));
        assert_eq!(state.observe(true, now, &config), Some(AlertTransition::Resolved));
    }
}
