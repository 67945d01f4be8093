//! Health evaluation of a single service

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::net::TcpStream;

use crate::data::{CheckResult, Service};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const TCP_TIMEOUT: Duration = Duration::from_secs(5);

const TCP_CONDITION: &str = "[CONNECTED] == true";
const HTTP_CONDITION: &str = "[STATUS] < 400";

/// Timeout of outgoing HTTP requests: `HTTP_CLIENT_TIMEOUT_IN_SECONDS`, or 10 seconds
pub fn http_client_timeout() -> Duration {
    std::env::var("HTTP_CLIENT_TIMEOUT_IN_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_HTTP_TIMEOUT)
}

/// Produces a result for a service.
///
/// Implementations never fail: problems are reported through
/// `CheckResult::success` and `CheckResult::errors`.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, service: &Service) -> CheckResult;
}

/// Reachability checks over TCP (`tcp://host:port`) or HTTP (anything else)
pub struct ClientEvaluator {
    secure: reqwest::Client,
    insecure: reqwest::Client,
    tcp_timeout: Duration,
}

impl ClientEvaluator {
    pub fn new(http_timeout: Duration) -> Result<Self, EvaluatorError> {
        let secure = reqwest::Client::builder()
            .timeout(http_timeout)
            .pool_max_idle_per_host(20)
            .build()?;
        let insecure = reqwest::Client::builder()
            .timeout(http_timeout)
            .pool_max_idle_per_host(20)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            secure,
            insecure,
            tcp_timeout: TCP_TIMEOUT,
        })
    }

    /// Build with the HTTP timeout from [`http_client_timeout`]
    pub fn from_env() -> Result<Self, EvaluatorError> {
        Self::new(http_client_timeout())
    }

    pub fn with_tcp_timeout(mut self, timeout: Duration) -> Self {
        self.tcp_timeout = timeout;
        self
    }

    async fn check_tcp(&self, address: &str) -> CheckResult {
        let timestamp = Utc::now();
        let start = Instant::now();

        let outcome = tokio::time::timeout(self.tcp_timeout, TcpStream::connect(address)).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(_stream)) => {
                CheckResult::new(timestamp, true, elapsed).with_condition(TCP_CONDITION, true)
            }
            Ok(Err(e)) => CheckResult::failure(timestamp, elapsed, e.to_string())
                .with_condition(TCP_CONDITION, false),
            Err(_) => CheckResult::failure(
                timestamp,
                elapsed,
                format!("connection to {} timed out after {:?}", address, self.tcp_timeout),
            )
            .with_condition(TCP_CONDITION, false),
        }
    }

    async fn check_http(&self, service: &Service) -> CheckResult {
        let client = if service.insecure {
            &self.insecure
        } else {
            &self.secure
        };
        let timestamp = Utc::now();
        let start = Instant::now();

        match client.get(&service.url).send().await {
            Ok(response) => {
                let elapsed = start.elapsed();
                let status = response.status();
                let success = status.as_u16() < 400;
                CheckResult::new(timestamp, success, elapsed)
                    .with_status(status.as_u16())
                    .with_condition(HTTP_CONDITION, success)
            }
            Err(e) => CheckResult::failure(timestamp, start.elapsed(), e.to_string())
                .with_condition(HTTP_CONDITION, false),
        }
    }
}

#[async_trait]
impl Evaluator for ClientEvaluator {
    async fn evaluate(&self, service: &Service) -> CheckResult {
        match service.url.strip_prefix("tcp://") {
            Some(address) => self.check_tcp(address).await,
            None => self.check_http(service).await,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
