//! One cancellable task per monitored service
//!
//! Every task runs the same loop: wait for the evaluation lock when
//! evaluations are serialized, evaluate, hand the result to metrics, the
//! store and the alert engine, release the lock, then sleep for the service
//! interval. Cancellation is observed while waiting for the lock and while
//! sleeping, never in the middle of an evaluation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::evaluator::Evaluator;
use super::metrics::MetricsSink;
use crate::alerts::{AlertBoard, AlertEngine, NotifierRegistry};
use crate::data::Service;
use crate::storage::Store;

/// Delay between the first evaluations of consecutive services
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(1111);

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Allow a single evaluation at a time across all services
    pub serialize_evaluations: bool,
    pub stagger: Duration,
    pub debug: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            serialize_evaluations: true,
            stagger: DEFAULT_STAGGER,
            debug: false,
        }
    }
}

/// Everything a monitoring task needs, shared by all tasks
pub struct MonitorContext {
    pub store: Arc<dyn Store>,
    pub evaluator: Arc<dyn Evaluator>,
    pub notifiers: Arc<NotifierRegistry>,
    pub metrics: Arc<dyn MetricsSink>,
    pub alert_board: Arc<AlertBoard>,
    pub settings: MonitorSettings,
    evaluation_lock: Mutex<()>,
}

impl MonitorContext {
    pub fn new(
        store: Arc<dyn Store>,
        evaluator: Arc<dyn Evaluator>,
        notifiers: Arc<NotifierRegistry>,
        metrics: Arc<dyn MetricsSink>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            store,
            evaluator,
            notifiers,
            metrics,
            alert_board: Arc::new(AlertBoard::new()),
            settings,
            evaluation_lock: Mutex::new(()),
        }
    }

    pub fn with_alert_board(mut self, board: Arc<AlertBoard>) -> Self {
        self.alert_board = board;
        self
    }
}

struct MonitorTask {
    service: Service,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// What a reload changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    /// Keys of newly started tasks, including restarted ones
    pub started: Vec<String>,
    /// Keys of stopped tasks, including restarted ones
    pub stopped: Vec<String>,
    /// Number of statuses dropped from the store
    pub removed_statuses: usize,
}

/// Owns the monitoring tasks
pub struct Scheduler {
    context: Arc<MonitorContext>,
    root: CancellationToken,
    tasks: HashMap<String, MonitorTask>,
}

impl Scheduler {
    pub fn new(context: MonitorContext) -> Self {
        Self {
            context: Arc::new(context),
            root: CancellationToken::new(),
            tasks: HashMap::new(),
        }
    }

    pub fn context(&self) -> &Arc<MonitorContext> {
        &self.context
    }

    /// Spawn a task for each service.
    ///
    /// The i-th service waits `i * stagger` before its first evaluation.
    /// Nothing is spawned if a key repeats or is already being monitored.
    /// Stored statuses of services that are not monitored afterwards, such as
    /// ones restored from a snapshot but no longer configured, are deleted.
    pub fn start(&mut self, services: &[Service]) -> Result<(), SchedulerError> {
        check_unique(services)?;
        if let Some(service) = services.iter().find(|s| self.tasks.contains_key(&s.key())) {
            return Err(SchedulerError::DuplicateService(service.key()));
        }

        for (i, service) in services.iter().enumerate() {
            let delay = self.context.settings.stagger * i as u32;
            self.spawn(service.clone(), delay);
        }

        let keys: Vec<String> = self.tasks.keys().cloned().collect();
        let removed = self.context.store.delete_all_service_statuses_not_in_keys(&keys);

        tracing::info!(services = services.len(), removed_statuses = removed, "Started monitoring");
        Ok(())
    }

    /// Bring the running tasks in line with `services`.
    ///
    /// Tasks whose service disappeared or changed are stopped, new and changed
    /// services are started, and stored statuses of services no longer
    /// configured are deleted.
    pub async fn reload(&mut self, services: &[Service]) -> Result<ReloadSummary, SchedulerError> {
        check_unique(services)?;

        let wanted: HashMap<String, &Service> = services.iter().map(|s| (s.key(), s)).collect();
        let mut summary = ReloadSummary::default();

        let outdated: Vec<String> = self
            .tasks
            .iter()
            .filter(|(key, task)| wanted.get(*key).map_or(true, |s| **s != task.service))
            .map(|(key, _)| key.clone())
            .collect();

        for key in outdated {
            if self.stop(&key).await {
                summary.stopped.push(key);
            }
        }

        let mut index = 0u32;
        for service in services {
            let key = service.key();
            if self.tasks.contains_key(&key) {
                continue;
            }
            self.spawn(service.clone(), self.context.settings.stagger * index);
            summary.started.push(key);
            index += 1;
        }

        let keys: Vec<String> = wanted.into_keys().collect();
        summary.removed_statuses = self.context.store.delete_all_service_statuses_not_in_keys(&keys);

        summary.started.sort();
        summary.stopped.sort();
        tracing::info!(
            started = summary.started.len(),
            stopped = summary.stopped.len(),
            removed_statuses = summary.removed_statuses,
            "Reloaded monitored services"
        );
        Ok(summary)
    }

    /// Cancel the task for `key` and wait for it to exit.
    ///
    /// An evaluation in progress completes first. Returns false if no task runs
    /// under `key`.
    pub async fn stop(&mut self, key: &str) -> bool {
        let Some(task) = self.tasks.remove(key) else {
            return false;
        };

        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            tracing::warn!(key = %key, error = %e, "Monitoring task ended abnormally");
        }
        self.context.alert_board.remove(key);
        true
    }

    /// Keys of the running tasks, sorted
    pub fn running(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.tasks.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Cancel every task and wait for all of them to exit.
    ///
    /// The scheduler can be started again afterwards.
    pub async fn shutdown(&mut self) {
        let root = std::mem::replace(&mut self.root, CancellationToken::new());
        root.cancel();

        let tasks: Vec<(String, MonitorTask)> = self.tasks.drain().collect();
        let handles = tasks.into_iter().map(|(key, task)| async move {
            if let Err(e) = task.handle.await {
                tracing::warn!(key = %key, error = %e, "Monitoring task ended abnormally");
            }
        });
        futures::future::join_all(handles).await;

        tracing::info!("All monitoring tasks stopped");
    }

    fn spawn(&mut self, service: Service, delay: Duration) {
        let key = service.key();
        let cancel = self.root.child_token();
        let handle = tokio::spawn(monitor(
            Arc::clone(&self.context),
            service.clone(),
            delay,
            cancel.clone(),
        ));

        self.tasks.insert(
            key,
            MonitorTask {
                service,
                cancel,
                handle,
            },
        );
    }
}

fn check_unique(services: &[Service]) -> Result<(), SchedulerError> {
    let mut seen = HashSet::new();
    for service in services {
        let key = service.key();
        if !seen.insert(key.clone()) {
            return Err(SchedulerError::DuplicateService(key));
        }
    }
    Ok(())
}

async fn monitor(
    context: Arc<MonitorContext>,
    service: Service,
    delay: Duration,
    cancel: CancellationToken,
) {
    let key = service.key();
    let mut alerts = AlertEngine::new(&service);
    context.alert_board.publish(&key, alerts.snapshot(&service));

    if !delay.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return,
        }
    }

    loop {
        let guard = if context.settings.serialize_evaluations {
            tokio::select! {
                guard = context.evaluation_lock.lock() => Some(guard),
                _ = cancel.cancelled() => break,
            }
        } else {
            None
        };

        if context.settings.debug {
            tracing::debug!(group = %service.group, service = %service.name, "Monitoring service");
        }

        let result = context.evaluator.evaluate(&service).await;
        context.metrics.publish(&service, &result);
        context.store.insert(&service, &result);

        tracing::info!(
            group = %service.group,
            service = %service.name,
            success = result.success,
            errors = result.errors.len(),
            duration_ms = result.duration.as_millis() as u64,
            "Monitored service"
        );

        alerts.handle(&service, &result, &context.notifiers).await;
        context.alert_board.publish(&key, alerts.snapshot(&service));

        drop(guard);

        if context.settings.debug {
            tracing::debug!(key = %key, interval = ?service.interval, "Waiting for next evaluation");
        }

        tokio::select! {
            _ = tokio::time::sleep(service.interval) => {}
            _ = cancel.cancelled() => break,
        }
    }

    tracing::info!(key = %key, "Stopped monitoring service");
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Service {0} is configured more than once")]
    DuplicateService(String),
}
