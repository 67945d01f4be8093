//! Uptime aggregation over hourly buckets

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::result::CheckResult;

const SECONDS_PER_HOUR: i64 = 3600;

/// Default retention for hourly buckets
pub fn default_uptime_horizon() -> Duration {
    Duration::days(7)
}

/// Counters for one hour of evaluations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyStatistics {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub total_response_time_ms: u64,
}

/// Success ratio bucketed by hour, keyed by the unix timestamp of the hour start
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Uptime {
    pub hourly_statistics: BTreeMap<i64, HourlyStatistics>,
}

/// Uptime ratios over the standard display windows
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UptimeReport {
    pub last_hour: f64,
    pub last_twenty_four_hours: f64,
    pub last_seven_days: f64,
    pub average_response_time_ms_last_hour: u64,
    pub average_response_time_ms_last_twenty_four_hours: u64,
}

impl Uptime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a result and drop buckets older than `horizon` relative to it
    pub fn record(&mut self, result: &CheckResult, horizon: Duration) {
        let hour = hour_start(result.timestamp);
        let bucket = self.hourly_statistics.entry(hour).or_default();
        bucket.total_executions += 1;
        if result.success {
            bucket.successful_executions += 1;
        }
        bucket.total_response_time_ms += result.duration.as_millis() as u64;

        let cutoff = hour - horizon.num_seconds();
        self.hourly_statistics = self.hourly_statistics.split_off(&cutoff);
    }

    /// Success ratio over the `hours` most recent buckets ending at `now`.
    ///
    /// Returns 0.0 when nothing was recorded in the window.
    pub fn ratio(&self, hours: i64, now: DateTime<Utc>) -> f64 {
        let stats = self.window(hours, now);
        if stats.total_executions == 0 {
            return 0.0;
        }
        stats.successful_executions as f64 / stats.total_executions as f64
    }

    /// Mean response time over the `hours` most recent buckets ending at `now`
    pub fn average_response_time_ms(&self, hours: i64, now: DateTime<Utc>) -> u64 {
        let stats = self.window(hours, now);
        if stats.total_executions == 0 {
            return 0;
        }
        stats.total_response_time_ms / stats.total_executions
    }

    pub fn report(&self, now: DateTime<Utc>) -> UptimeReport {
        UptimeReport {
            last_hour: self.ratio(1, now),
            last_twenty_four_hours: self.ratio(24, now),
            last_seven_days: self.ratio(24 * 7, now),
            average_response_time_ms_last_hour: self.average_response_time_ms(1, now),
            average_response_time_ms_last_twenty_four_hours: self
                .average_response_time_ms(24, now),
        }
    }

    fn window(&self, hours: i64, now: DateTime<Utc>) -> HourlyStatistics {
        let current = hour_start(now);
        let from = current - (hours - 1) * SECONDS_PER_HOUR;

        self.hourly_statistics
            .range(from..=current)
            .fold(HourlyStatistics::default(), |mut acc, (_, s)| {
                acc.total_executions += s.total_executions;
                acc.successful_executions += s.successful_executions;
                acc.total_response_time_ms += s.total_response_time_ms;
                acc
            })
    }
}

fn hour_start(ts: DateTime<Utc>) -> i64 {
    let secs = ts.timestamp();
    secs - secs.rem_euclid(SECONDS_PER_HOUR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn result_at(ts: DateTime<Utc>, success: bool, ms: u64) -> CheckResult {
        CheckResult::new(ts, success, std::time::Duration::from_millis(ms))
    }

    #[test]
    fn test_same_hour_shares_bucket() {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap();
        let mut uptime = Uptime::new();

        uptime.record(&result_at(base, true, 100), default_uptime_horizon());
        uptime.record(&result_at(base + Duration::minutes(30), false, 300), default_uptime_horizon());

        assert_eq!(uptime.hourly_statistics.len(), 1);
        let bucket = uptime.hourly_statistics.values().next().unwrap();
        assert_eq!(bucket.total_executions, 2);
        assert_eq!(bucket.successful_executions, 1);
        assert_eq!(bucket.total_response_time_ms, 400);
    }

    #[test]
    fn test_ratios_by_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 8, 12, 0, 0).unwrap();
        let mut uptime = Uptime::new();

        // Two hours ago: all failures
        for _ in 0..2 {
            uptime.record(&result_at(now - Duration::hours(2), false, 10), default_uptime_horizon());
        }
        // Current hour: all successes
        for _ in 0..2 {
            uptime.record(&result_at(now, true, 10), default_uptime_horizon());
        }

        assert_eq!(uptime.ratio(1, now), 1.0);
        assert_eq!(uptime.ratio(24, now), 0.5);
        assert_eq!(uptime.ratio(24, now + Duration::days(3)), 0.0);
    }

    #[test]
    fn test_horizon_discards_old_buckets() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut uptime = Uptime::new();

        uptime.record(&result_at(start, true, 10), Duration::hours(48));
        uptime.record(&result_at(start + Duration::hours(24), true, 10), Duration::hours(48));
        assert_eq!(uptime.hourly_statistics.len(), 2);

        uptime.record(&result_at(start + Duration::hours(72), true, 10), Duration::hours(48));
        assert_eq!(uptime.hourly_statistics.len(), 2);
        assert!(!uptime.hourly_statistics.contains_key(&start.timestamp()));
    }

    #[test]
    fn test_average_response_time() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 15, 0).unwrap();
        let mut uptime = Uptime::new();

        uptime.record(&result_at(now, true, 100), default_uptime_horizon());
        uptime.record(&result_at(now, true, 300), default_uptime_horizon());

        let report = uptime.report(now);
        assert_eq!(report.average_response_time_ms_last_hour, 200);
        assert_eq!(report.last_hour, 1.0);
    }
}
