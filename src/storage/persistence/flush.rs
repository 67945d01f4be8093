use crate::storage::Store;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Worker that periodically persists the store
pub struct FlushWorker {
    store: Arc<dyn Store>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl FlushWorker {
    pub fn new(store: Arc<dyn Store>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the background worker
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tracing::info!("Flush worker started with interval {:?}", self.interval);

            let mut interval = time::interval(self.interval);
            // The first tick completes immediately; nothing has been recorded yet
            interval.tick().await;

            while self.running.load(Ordering::SeqCst) {
                interval.tick().await;
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                flush_blocking(Arc::clone(&self.store)).await;
            }

            tracing::info!("Flush worker stopped");
        })
    }

    /// Stop the worker
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if worker is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Run [`run_flush`] on the blocking pool; serializing, compressing and
/// syncing a snapshot must not stall the runtime.
pub async fn flush_blocking(store: Arc<dyn Store>) -> bool {
    match tokio::task::spawn_blocking(move || run_flush(store.as_ref())).await {
        Ok(saved) => saved,
        Err(e) => {
            tracing::error!(error = %e, "Flush task failed");
            false
        }
    }
}

/// Save once, logging failures. Returns whether the save succeeded.
pub fn run_flush(store: &dyn Store) -> bool {
    match store.save() {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Failed to persist service statuses");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CheckResult, Retention, Service};
    use crate::storage::{FileBackend, MemoryStore, PersistenceBackend};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_flush_worker_persists() {
        let temp_dir = TempDir::new().unwrap();
        let backend = Arc::new(FileBackend::new(temp_dir.path().join("data.lz4")).unwrap());
        let store = Arc::new(
            MemoryStore::with_backend(backend.clone(), Retention::default()).unwrap(),
        );
        store.insert(
            &Service::new("core", "api", "https://example.org"),
            &CheckResult::new(chrono::Utc::now(), true, Duration::from_millis(4)),
        );

        let worker = Arc::new(FlushWorker::new(store, Duration::from_millis(50)));
        let handle = Arc::clone(&worker).start();
        assert!(worker.is_running());

        time::sleep(Duration::from_millis(300)).await;
        let snapshot = backend.load().unwrap().unwrap();
        assert_eq!(snapshot.statuses.len(), 1);

        worker.stop();
        time::sleep(Duration::from_millis(200)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_flush_blocking_saves() {
        let temp_dir = TempDir::new().unwrap();
        let backend = Arc::new(FileBackend::new(temp_dir.path().join("data.lz4")).unwrap());
        let store = Arc::new(
            MemoryStore::with_backend(backend.clone(), Retention::default()).unwrap(),
        );
        store.insert(
            &Service::new("core", "api", "https://example.org"),
            &CheckResult::new(chrono::Utc::now(), false, Duration::from_millis(4)),
        );

        assert!(flush_blocking(store).await);
        assert_eq!(backend.load().unwrap().unwrap().statuses.len(), 1);
    }

    #[test]
    fn test_run_flush_without_backend() {
        let store = MemoryStore::new();
        assert!(run_flush(&store));
    }
}
