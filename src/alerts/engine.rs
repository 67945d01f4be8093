//! Per-service alert state machines

use std::collections::BTreeMap;

use dashmap::DashMap;
use serde::Serialize;

use super::config::{AlertConfig, AlertPhase, AlertState, AlertTransition};
use super::notifier::NotifierRegistry;
use crate::data::{CheckResult, Service};

/// Alert state for every alert of one service.
///
/// Owned by the task that monitors the service; nothing else mutates it.
#[derive(Debug, Clone)]
pub struct AlertEngine {
    /// Index-aligned with `Service::alerts`
    states: Vec<AlertState>,
}

impl AlertEngine {
    pub fn new(service: &Service) -> Self {
        Self {
            states: vec![AlertState::default(); service.alerts.len()],
        }
    }

    /// Update every enabled alert with `result` and notify on edges.
    ///
    /// Notification failures are logged; the transition stands either way.
    pub async fn handle(
        &mut self,
        service: &Service,
        result: &CheckResult,
        notifiers: &NotifierRegistry,
    ) -> Vec<AlertTransition> {
        let mut transitions = Vec::new();

        for (alert, state) in service.alerts.iter().zip(self.states.iter_mut()) {
            if !alert.enabled {
                continue;
            }

            let Some(transition) = state.observe(result.success, result.timestamp, alert) else {
                continue;
            };
            transitions.push(transition);

            if transition.is_resolved() && !alert.send_on_resolved {
                continue;
            }

            Self::send(service, alert, result, transition, notifiers).await;
        }

        transitions
    }

    async fn send(
        service: &Service,
        alert: &AlertConfig,
        result: &CheckResult,
        transition: AlertTransition,
        notifiers: &NotifierRegistry,
    ) {
        let Some(notifier) = notifiers.get(&alert.provider) else {
            tracing::warn!(
                key = %service.key(),
                provider = %alert.provider,
                "No notifier registered for alert provider"
            );
            return;
        };

        let resolved = transition.is_resolved();
        tracing::info!(
            key = %service.key(),
            provider = %alert.provider,
            resolved,
            "Sending alert notification"
        );

        if let Err(e) = notifier.notify(service, alert, result, resolved).await {
            tracing::error!(
                key = %service.key(),
                provider = %alert.provider,
                error = %e,
                "Failed to send notification"
            );
        }
    }

    /// Read-only view of the current state
    pub fn snapshot(&self, service: &Service) -> Vec<AlertSnapshot> {
        service
            .alerts
            .iter()
            .zip(self.states.iter())
            .map(|(alert, state)| AlertSnapshot {
                provider: alert.provider.clone(),
                description: alert.description.clone(),
                enabled: alert.enabled,
                failure_threshold: alert.failure_threshold,
                success_threshold: alert.success_threshold,
                state: state.clone(),
            })
            .collect()
    }

    pub fn states(&self) -> &[AlertState] {
        &self.states
    }
}

/// Published view of one alert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSnapshot {
    pub provider: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    #[serde(flatten)]
    pub state: AlertState,
}

impl AlertSnapshot {
    pub fn is_triggered(&self) -> bool {
        self.state.phase == AlertPhase::Triggered
    }
}

/// Latest alert snapshots of every monitored service, keyed by service key
#[derive(Debug, Default)]
pub struct AlertBoard {
    services: DashMap<String, Vec<AlertSnapshot>>,
}

impl AlertBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot of one service
    pub fn publish(&self, key: &str, snapshot: Vec<AlertSnapshot>) {
        self.services.insert(key.to_string(), snapshot);
    }

    pub fn get(&self, key: &str) -> Option<Vec<AlertSnapshot>> {
        self.services.get(key).map(|s| s.clone())
    }

    pub fn remove(&self, key: &str) {
        self.services.remove(key);
    }

    pub fn all(&self) -> BTreeMap<String, Vec<AlertSnapshot>> {
        self.services
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}
