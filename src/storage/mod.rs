//! Result storage
//!
//! [`Store`] is the interface the monitoring loop writes to and the API reads
//! from. [`MemoryStore`] is the production implementation; it can be backed by
//! a [`PersistenceBackend`] so history survives restarts.

pub mod memory;
pub mod persistence;

use std::collections::BTreeMap;

use crate::data::{CheckResult, Service, ServiceStatus};

pub use memory::MemoryStore;
pub use persistence::{
    flush_blocking, run_flush, FileBackend, FlushWorker, PersistenceBackend, PersistenceError,
    StoreSnapshot,
};

/// Storage for per-service result history
pub trait Store: Send + Sync {
    /// Record a result for a service, creating its status on first use
    fn insert(&self, service: &Service, result: &CheckResult);

    /// Status of the service identified by group and name
    fn get_service_status(&self, group: &str, name: &str) -> Option<ServiceStatus>;

    /// Status stored under `key`
    fn get_service_status_by_key(&self, key: &str) -> Option<ServiceStatus>;

    /// Status stored under `key` with a single page of results
    fn get_service_status_with_result_pagination(
        &self,
        key: &str,
        page: usize,
        page_size: usize,
    ) -> Option<ServiceStatus>;

    /// Every status with a single page of results, keyed by service key
    fn get_all_service_statuses_with_result_pagination(
        &self,
        page: usize,
        page_size: usize,
    ) -> BTreeMap<String, ServiceStatus>;

    /// Remove every status whose key is not in `keys`; returns how many were removed
    fn delete_all_service_statuses_not_in_keys(&self, keys: &[String]) -> usize;

    /// Remove everything
    fn clear(&self);

    /// Persist the current state if a backend is configured
    fn save(&self) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Invalid stored state: {0}")]
    InvalidState(String),
}
