//! Result counters published by the monitoring loop

use dashmap::DashMap;
use serde::Serialize;

use crate::data::{CheckResult, Service};

/// Receives every result; must not fail or block
pub trait MetricsSink: Send + Sync {
    fn publish(&self, service: &Service, result: &CheckResult);
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn publish(&self, _service: &Service, _result: &CheckResult) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResultLabel {
    key: String,
    status: u16,
    success: bool,
}

/// Number of results per service, status code and outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultCount {
    pub key: String,
    pub status: u16,
    pub success: bool,
    pub count: u64,
}

/// Counts results by `(service key, status, success)`
#[derive(Debug, Default)]
pub struct ResultCounters {
    counts: DashMap<ResultLabel, u64>,
}

impl ResultCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// All counters ordered by key, status, then outcome
    pub fn snapshot(&self) -> Vec<ResultCount> {
        let mut counts: Vec<ResultCount> = self
            .counts
            .iter()
            .map(|e| ResultCount {
                key: e.key().key.clone(),
                status: e.key().status,
                success: e.key().success,
                count: *e.value(),
            })
            .collect();
        counts.sort_by(|a, b| {
            (&a.key, a.status, a.success).cmp(&(&b.key, b.status, b.success))
        });
        counts
    }
}

impl MetricsSink for ResultCounters {
    fn publish(&self, service: &Service, result: &CheckResult) {
        let label = ResultLabel {
            key: service.key(),
            status: result.status,
            success: result.success,
        };
        *self.counts.entry(label).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn test_counts_by_label() {
        let counters = ResultCounters::new();
        let api = Service::new("core", "api", "https://example.org");
        let ok = CheckResult::new(Utc::now(), true, Duration::ZERO).with_status(200);
        let down = CheckResult::new(Utc::now(), false, Duration::ZERO).with_status(503);

        counters.publish(&api, &ok);
        counters.publish(&api, &ok);
        counters.publish(&api, &down);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].status, 200);
        assert_eq!(snapshot[0].count, 2);
        assert_eq!(snapshot[1].status, 503);
        assert!(!snapshot[1].success);
    }
}
