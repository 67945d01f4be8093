use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;

use super::persistence::{PersistenceBackend, StoreSnapshot};
use super::{StorageError, Store};
use crate::data::{service_key, CheckResult, Retention, Service, ServiceStatus};

/// In-memory store keyed by service key.
///
/// Writes to one service lock only the shard holding it, so services are
/// updated concurrently while reads of a status never observe a partial insert.
pub struct MemoryStore {
    statuses: DashMap<String, ServiceStatus>,
    retention: Retention,
    backend: Option<Arc<dyn PersistenceBackend>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_retention(Retention::default())
    }

    pub fn with_retention(retention: Retention) -> Self {
        Self {
            statuses: DashMap::new(),
            retention,
            backend: None,
        }
    }

    /// Create a store backed by `backend`, restoring whatever it holds
    pub fn with_backend(
        backend: Arc<dyn PersistenceBackend>,
        retention: Retention,
    ) -> Result<Self, StorageError> {
        let store = Self {
            statuses: DashMap::new(),
            retention,
            backend: Some(Arc::clone(&backend)),
        };

        if let Some(snapshot) = backend.load()? {
            store.restore(snapshot)?;
        }

        Ok(store)
    }

    fn restore(&self, snapshot: StoreSnapshot) -> Result<(), StorageError> {
        for mut status in snapshot.statuses {
            let expected = service_key(&status.group, &status.name);
            if status.key != expected {
                return Err(StorageError::InvalidState(format!(
                    "status key '{}' does not match group '{}' and name '{}'",
                    status.key, status.group, status.name
                )));
            }
            // Retention may have shrunk since the snapshot was taken
            while status.results.len() > self.retention.max_results {
                status.results.pop_front();
            }
            while status.events.len() > self.retention.max_events {
                status.events.pop_front();
            }
            self.statuses.insert(status.key.clone(), status);
        }

        tracing::info!(services = self.statuses.len(), "Restored service statuses");
        Ok(())
    }

    /// Number of services with stored state
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Keys of all stored services
    pub fn keys(&self) -> Vec<String> {
        self.statuses.iter().map(|e| e.key().clone()).collect()
    }

    pub fn retention(&self) -> &Retention {
        &self.retention
    }

    fn snapshot(&self) -> StoreSnapshot {
        let mut statuses: Vec<ServiceStatus> =
            self.statuses.iter().map(|e| e.value().clone()).collect();
        statuses.sort_by(|a, b| a.key.cmp(&b.key));

        StoreSnapshot {
            version: StoreSnapshot::VERSION,
            saved_at: Utc::now(),
            statuses,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn insert(&self, service: &Service, result: &CheckResult) {
        self.statuses
            .entry(service.key())
            .or_insert_with(|| ServiceStatus::new(service))
            .add_result(result, &self.retention);
    }

    fn get_service_status(&self, group: &str, name: &str) -> Option<ServiceStatus> {
        self.get_service_status_by_key(&service_key(group, name))
    }

    fn get_service_status_by_key(&self, key: &str) -> Option<ServiceStatus> {
        self.statuses.get(key).map(|s| s.value().clone())
    }

    fn get_service_status_with_result_pagination(
        &self,
        key: &str,
        page: usize,
        page_size: usize,
    ) -> Option<ServiceStatus> {
        self.statuses
            .get(key)
            .map(|s| s.value().with_result_pagination(page, page_size))
    }

    fn get_all_service_statuses_with_result_pagination(
        &self,
        page: usize,
        page_size: usize,
    ) -> BTreeMap<String, ServiceStatus> {
        self.statuses
            .iter()
            .map(|e| (e.key().clone(), e.value().with_result_pagination(page, page_size)))
            .collect()
    }

    fn delete_all_service_statuses_not_in_keys(&self, keys: &[String]) -> usize {
        let keep: HashSet<&str> = keys.iter().map(String::as_str).collect();
        let before = self.statuses.len();
        self.statuses.retain(|key, _| keep.contains(key.as_str()));
        let removed = before.saturating_sub(self.statuses.len());

        if removed > 0 {
            tracing::info!(removed, "Deleted statuses of services no longer configured");
        }
        removed
    }

    fn clear(&self) {
        self.statuses.clear();
    }

    fn save(&self) -> Result<(), StorageError> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };

        let snapshot = self.snapshot();
        backend.save(&snapshot)?;

        tracing::debug!(services = snapshot.statuses.len(), "Saved service statuses");
        Ok(())
    }
}
