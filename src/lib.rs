//! Vigil: Service Health Monitor
//!
//! Periodically evaluates a set of services, keeps a bounded history of their
//! results, tracks uptime, fires edge-triggered alerts and serves everything
//! over a small HTTP API.
//!
//! # Features
//!
//! - **Independent Polling**: One cancellable task per service, optionally serialized
//! - **Bounded History**: Most recent results and health transitions per service
//! - **Uptime Tracking**: Hourly buckets kept for seven days
//! - **Edge-Triggered Alerts**: Failure and success thresholds with pluggable notifiers
//! - **Response Caching**: TTL cache with coalesced misses for the status listing
//! - **Persistence**: LZ4-compressed snapshots flushed periodically and on shutdown
//! - **Badges**: SVG uptime badges per service
//! - **Basic Auth**: Optional protection of the status routes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vigil::alerts::NotifierRegistry;
//! use vigil::data::Service;
//! use vigil::monitor::{ClientEvaluator, MonitorContext, MonitorSettings, NoopMetrics, Scheduler};
//! use vigil::storage::{MemoryStore, Store};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
//! let context = MonitorContext::new(
//!     Arc::clone(&store),
//!     Arc::new(ClientEvaluator::from_env()?),
//!     Arc::new(NotifierRegistry::new()),
//!     Arc::new(NoopMetrics),
//!     MonitorSettings::default(),
//! );
//!
//! let mut scheduler = Scheduler::new(context);
//! scheduler.start(&[Service::new("core", "api", "https://example.org/health")])?;
//!
//! let status = store.get_service_status("core", "api");
//! println!("Status: {:?}", status);
//!
//! scheduler.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod api;
pub mod config;
pub mod data;
pub mod monitor;
pub mod storage;

// Re-export commonly used types
pub use config::{ConfigError, MonitorConfig};
pub use data::{CheckResult, Service, ServiceStatus};
pub use monitor::{Scheduler, SchedulerError};
pub use storage::{MemoryStore, Store, StorageError};
