//! Periodic evaluation of monitored services

pub mod evaluator;
pub mod metrics;
pub mod scheduler;

pub use evaluator::{http_client_timeout, ClientEvaluator, Evaluator, EvaluatorError};
pub use metrics::{MetricsSink, NoopMetrics, ResultCount, ResultCounters};
pub use scheduler::{
    MonitorContext, MonitorSettings, ReloadSummary, Scheduler, SchedulerError, DEFAULT_STAGGER,
};
