//! Notification delivery for alerts

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::config::AlertConfig;
use crate::data::{CheckResult, Service};

/// Name of the notifier that is always registered
pub const LOG_PROVIDER: &str = "log";

pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers a notification for an alert edge
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        service: &Service,
        alert: &AlertConfig,
        result: &CheckResult,
        resolved: bool,
    ) -> Result<(), NotifierError>;
}

/// Human-readable summary of an alert edge
pub fn alert_message(service: &Service, alert: &AlertConfig, resolved: bool) -> String {
    if resolved {
        format!(
            "An alert for {} has been resolved after passing successfully {} time(s) in a row",
            service.name, alert.success_threshold
        )
    } else {
        format!(
            "An alert for {} has been triggered due to having failed {} time(s) in a row",
            service.name, alert.failure_threshold
        )
    }
}

/// Writes alerts to the tracing output
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        service: &Service,
        alert: &AlertConfig,
        result: &CheckResult,
        resolved: bool,
    ) -> Result<(), NotifierError> {
        let message = alert_message(service, alert, resolved);
        if resolved {
            tracing::info!(
                group = %service.group,
                service = %service.name,
                description = %alert.description(),
                "{}",
                message
            );
        } else {
            tracing::warn!(
                group = %service.group,
                service = %service.name,
                description = %alert.description(),
                errors = ?result.errors,
                "{}",
                message
            );
        }
        Ok(())
    }
}

/// Configuration of a named webhook provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Posts a JSON document describing the alert to a URL
pub struct WebhookNotifier {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Result<Self, NotifierError> {
        Self::with_timeout(config, DEFAULT_WEBHOOK_TIMEOUT)
    }

    /// Requests that take longer than `timeout` fail with `NotifierError::Webhook`
    pub fn with_timeout(config: WebhookConfig, timeout: Duration) -> Result<Self, NotifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifierError::Webhook(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        service: &Service,
        alert: &AlertConfig,
        result: &CheckResult,
        resolved: bool,
    ) -> Result<(), NotifierError> {
        let payload = serde_json::json!({
            "service": {
                "name": service.name,
                "group": service.group,
                "key": service.key(),
            },
            "description": alert.description(),
            "message": alert_message(service, alert, resolved),
            "resolved": resolved,
            "failure_threshold": alert.failure_threshold,
            "success_threshold": alert.success_threshold,
            "condition_results": result.condition_results,
            "errors": result.errors,
            "timestamp": result.timestamp.to_rfc3339(),
        });

        let mut request = self.client.post(&self.config.url).json(&payload);

        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifierError::Webhook(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            return Err(NotifierError::Webhook(format!(
                "Webhook returned status {}",
                response.status()
            )));
        }

        tracing::debug!(
            key = %service.key(),
            url = %self.config.url,
            resolved,
            "Webhook notification sent"
        );

        Ok(())
    }
}

/// Notifiers indexed by provider name
#[derive(Clone)]
pub struct NotifierRegistry {
    notifiers: HashMap<String, Arc<dyn Notifier>>,
}

impl NotifierRegistry {
    /// Registry holding only the log notifier
    pub fn new() -> Self {
        let mut notifiers: HashMap<String, Arc<dyn Notifier>> = HashMap::new();
        notifiers.insert(LOG_PROVIDER.to_string(), Arc::new(LogNotifier));
        Self { notifiers }
    }

    /// Registry with one webhook notifier per configured name
    pub fn from_webhooks(
        webhooks: &HashMap<String, WebhookConfig>,
        timeout: Duration,
    ) -> Result<Self, NotifierError> {
        let mut registry = Self::new();
        for (name, config) in webhooks {
            let notifier = WebhookNotifier::with_timeout(config.clone(), timeout)?;
            registry.register(name.clone(), Arc::new(notifier));
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, notifier: Arc<dyn Notifier>) {
        self.notifiers.insert(name.into(), notifier);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Notifier>> {
        self.notifiers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.notifiers.contains_key(name)
    }

    /// Check that every alert of every service names a registered provider
    pub fn validate(&self, services: &[Service]) -> Result<(), NotifierError> {
        for service in services {
            if let Some(alert) = service.alerts.iter().find(|a| !self.contains(&a.provider)) {
                return Err(NotifierError::UnknownProvider {
                    provider: alert.provider.clone(),
                    service: service.key(),
                });
            }
        }
        Ok(())
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Notifier errors
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Unknown alert provider '{provider}' for service {service}")]
    UnknownProvider { provider: String, service: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn service() -> Service {
        Service::new("core", "api", "https://example.org")
    }

    fn failed_result() -> CheckResult {
        CheckResult::failure(Utc::now(), Duration::from_millis(3), "timeout")
            .with_condition("[STATUS] < 400", false)
    }

    #[tokio::test]
    async fn test_log_notification() {
        let notifier = LogNotifier;
        let alert = AlertConfig::new(LOG_PROVIDER);

        let result = notifier
            .notify(&service(), &alert, &failed_result(), false)
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_alert_message() {
        let alert = AlertConfig::new(LOG_PROVIDER).with_thresholds(3, 2);

        let triggered = alert_message(&service(), &alert, false);
        assert!(triggered.contains("failed 3 time(s)"));

        let resolved = alert_message(&service(), &alert, true);
        assert!(resolved.contains("passing successfully 2 time(s)"));
    }

    #[test]
    fn test_registry_validation() {
        let registry = NotifierRegistry::new();
        let ok = vec![service().with_alert(AlertConfig::new(LOG_PROVIDER))];
        assert!(registry.validate(&ok).is_ok());

        let unknown = vec![service().with_alert(AlertConfig::new("pagerduty"))];
        assert!(matches!(
            registry.validate(&unknown),
            Err(NotifierError::UnknownProvider { ref provider, .. }) if provider == "pagerduty"
        ));
    }

    #[tokio::test]
    async fn test_webhook_delivery() {
        let received: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State(received): State<Arc<Mutex<Vec<serde_json::Value>>>>,
                     Json(body): Json<serde_json::Value>| async move {
                        received.lock().push(body);
                        StatusCode::OK
                    },
                ),
            )
            .route("/broken", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .with_state(Arc::clone(&received));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let notifier = WebhookNotifier::new(WebhookConfig {
            url: format!("http://{}/hook", addr),
            headers: HashMap::new(),
        })
        .unwrap();
        let alert = AlertConfig::new("ops").with_description("api is down");
        notifier
            .notify(&service(), &alert, &failed_result(), false)
            .await
            .unwrap();

        let bodies = received.lock().clone();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["resolved"], false);
        assert_eq!(bodies[0]["description"], "api is down");
        assert_eq!(bodies[0]["service"]["key"], "core_api");

        let broken = WebhookNotifier::new(WebhookConfig {
            url: format!("http://{}/broken", addr),
            headers: HashMap::new(),
        })
        .unwrap();
        let err = broken
            .notify(&service(), &alert, &failed_result(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, NotifierError::Webhook(_)));
    }

    /// Accepts connections and never answers
    async fn silent_endpoint() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_webhook_times_out_on_silent_endpoint() {
        let addr = silent_endpoint().await;
        let notifier = WebhookNotifier::with_timeout(
            WebhookConfig {
                url: format!("http://{}/hook", addr),
                headers: HashMap::new(),
            },
            Duration::from_millis(200),
        )
        .unwrap();
        let alert = AlertConfig::new("ops");

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            notifier.notify(&service(), &alert, &failed_result(), false),
        )
        .await;

        assert!(matches!(outcome, Ok(Err(NotifierError::Webhook(_)))));
    }

    #[test]
    fn test_registry_from_webhooks() {
        let mut webhooks = HashMap::new();
        webhooks.insert(
            "ops".to_string(),
            WebhookConfig {
                url: "http://127.0.0.1:9/hook".to_string(),
                headers: HashMap::new(),
            },
        );

        let registry = NotifierRegistry::from_webhooks(&webhooks, DEFAULT_WEBHOOK_TIMEOUT).unwrap();
        assert!(registry.contains("ops"));
        assert!(registry.contains(LOG_PROVIDER));
    }
}

