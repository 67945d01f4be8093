pub mod result;
pub mod service;
pub mod status;
pub mod uptime;

pub use result::{CheckResult, ConditionResult};
pub use service::{service_key, Service};
pub use status::{Event, EventKind, Retention, ServiceStatus};
pub use uptime::{HourlyStatistics, Uptime, UptimeReport};
