//! Evaluation outcomes

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single condition within an evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionResult {
    /// Condition as written in the service definition
    pub condition: String,
    pub success: bool,
}

/// One evaluation of a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// When the evaluation started
    pub timestamp: DateTime<Utc>,
    /// Whether every condition passed
    pub success: bool,
    /// Time spent evaluating
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    /// Protocol status code (0 when not applicable)
    #[serde(default)]
    pub status: u16,
    /// Per-condition outcomes, in definition order
    #[serde(default)]
    pub condition_results: Vec<ConditionResult>,
    /// Errors raised while evaluating
    #[serde(default)]
    pub errors: Vec<String>,
}

impl CheckResult {
    /// Create a result with no conditions or errors
    pub fn new(timestamp: DateTime<Utc>, success: bool, duration: Duration) -> Self {
        Self {
            timestamp,
            success,
            duration,
            status: 0,
            condition_results: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// A failed result carrying a single error
    pub fn failure(timestamp: DateTime<Utc>, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Self::new(timestamp, false, duration)
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>, success: bool) -> Self {
        self.condition_results.push(ConditionResult {
            condition: condition.into(),
            success,
        });
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
