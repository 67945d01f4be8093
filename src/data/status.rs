//! Per-service aggregate of results, events and uptime

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::CheckResult;
use super::service::Service;
use super::uptime::Uptime;

/// Health state transition kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Healthy,
    Unhealthy,
}

impl EventKind {
    fn from_success(success: bool) -> Self {
        if success {
            EventKind::Healthy
        } else {
            EventKind::Unhealthy
        }
    }
}

/// A recorded transition between healthy and unhealthy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

/// Retention limits applied on insert
#[derive(Debug, Clone, Copy)]
pub struct Retention {
    /// Maximum number of results kept per service
    pub max_results: usize,
    /// Maximum number of events kept per service
    pub max_events: usize,
    /// How far back uptime buckets are kept
    pub uptime_horizon: chrono::Duration,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            max_results: 20,
            max_events: 50,
            uptime_horizon: super::uptime::default_uptime_horizon(),
        }
    }
}

/// Aggregated state of one monitored service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub group: String,
    pub key: String,
    /// Most recent results, oldest first
    pub results: VecDeque<CheckResult>,
    /// Health transitions, oldest first
    pub events: VecDeque<Event>,
    pub uptime: Uptime,
}

impl ServiceStatus {
    pub fn new(service: &Service) -> Self {
        Self {
            name: service.name.clone(),
            group: service.group.clone(),
            key: service.key(),
            results: VecDeque::new(),
            events: VecDeque::new(),
            uptime: Uptime::new(),
        }
    }

    /// Append a result, recording a transition event and trimming to `retention`
    pub fn add_result(&mut self, result: &CheckResult, retention: &Retention) {
        let transitioned = self
            .results
            .back()
            .map_or(true, |previous| previous.success != result.success);

        if transitioned {
            self.events.push_back(Event {
                kind: EventKind::from_success(result.success),
                timestamp: result.timestamp,
            });
            while self.events.len() > retention.max_events {
                self.events.pop_front();
            }
        }

        self.results.push_back(result.clone());
        while self.results.len() > retention.max_results {
            self.results.pop_front();
        }

        self.uptime.record(result, retention.uptime_horizon);
    }

    /// Results of page `page` (1-based) with `page_size` entries, newest first.
    ///
    /// Pages past the end, and a zero page or page size, are empty.
    pub fn paginated_results(&self, page: usize, page_size: usize) -> Vec<CheckResult> {
        if page == 0 || page_size == 0 {
            return Vec::new();
        }
        let skip = (page - 1).saturating_mul(page_size);
        self.results
            .iter()
            .rev()
            .skip(skip)
            .take(page_size)
            .cloned()
            .collect()
    }

    /// Copy of this status keeping only one page of results
    pub fn with_result_pagination(&self, page: usize, page_size: usize) -> Self {
        Self {
            name: self.name.clone(),
            group: self.group.clone(),
            key: self.key.clone(),
            results: self.paginated_results(page, page_size).into(),
            events: self.events.clone(),
            uptime: self.uptime.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(n: i64, success: bool) -> CheckResult {
        let ts = DateTime::<Utc>::from_timestamp(1_700_000_000 + n, 0).unwrap();
        CheckResult::new(ts, success, Duration::from_millis(n as u64))
    }

    fn status() -> ServiceStatus {
        ServiceStatus::new(&Service::new("core", "api", "https://example.org"))
    }

    #[test]
    fn test_bounded_history_keeps_most_recent() {
        let retention = Retention {
            max_results: 5,
            ..Default::default()
        };
        let mut status = status();

        for i in 0..12 {
            status.add_result(&result(i, true), &retention);
        }

        assert_eq!(status.results.len(), 5);
        let durations: Vec<u64> = status
            .results
            .iter()
            .map(|r| r.duration.as_millis() as u64)
            .collect();
        assert_eq!(durations, vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_events_only_on_transition() {
        let retention = Retention::default();
        let mut status = status();

        status.add_result(&result(0, true), &retention);
        assert_eq!(status.events.len(), 1);
        assert_eq!(status.events[0].kind, EventKind::Healthy);

        status.add_result(&result(1, false), &retention);
        for i in 2..10 {
            status.add_result(&result(i, false), &retention);
        }
        assert_eq!(status.events.len(), 2);
        assert_eq!(status.events[1].kind, EventKind::Unhealthy);

        status.add_result(&result(10, true), &retention);
        assert_eq!(status.events.len(), 3);
        assert_eq!(status.events[2].timestamp, result(10, true).timestamp);
    }

    #[test]
    fn test_events_are_bounded() {
        let retention = Retention {
            max_events: 3,
            ..Default::default()
        };
        let mut status = status();

        for i in 0..10 {
            status.add_result(&result(i, i % 2 == 0), &retention);
        }

        assert_eq!(status.events.len(), 3);
        assert_eq!(status.events.back().unwrap().kind, EventKind::Unhealthy);
    }

    #[test]
    fn test_pagination_newest_first() {
        let retention = Retention::default();
        let mut status = status();
        for i in 0..5 {
            status.add_result(&result(i, true), &retention);
        }

        let first = status.paginated_results(1, 2);
        assert_eq!(first[0].duration.as_millis(), 4);
        assert_eq!(first[1].duration.as_millis(), 3);

        let last = status.paginated_results(3, 2);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].duration.as_millis(), 0);
    }

    #[test]
    fn test_pagination_out_of_range() {
        let retention = Retention::default();
        let mut status = status();
        for i in 0..5 {
            status.add_result(&result(i, true), &retention);
        }

        assert!(status.paginated_results(1000, 10).is_empty());
        assert!(status.paginated_results(0, 10).is_empty());
        assert!(status.paginated_results(1, 0).is_empty());
        assert!(status.paginated_results(usize::MAX, usize::MAX).is_empty());
    }
}
