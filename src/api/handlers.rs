use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use super::cache::{CacheError, CacheStats, Encoding, ResponseCache};
use super::security::BasicAuth;
use crate::alerts::{AlertBoard, AlertSnapshot};
use crate::data::{CheckResult, Event, UptimeReport};
use crate::monitor::{ResultCount, ResultCounters};
use crate::storage::Store;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: Arc<ResponseCache>,
    pub alert_board: Arc<AlertBoard>,
    /// Present when result metrics are enabled
    pub counters: Option<Arc<ResultCounters>>,
    /// Guards the status routes when set
    pub security: Option<BasicAuth>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Statuses
// ============================================================================

/// Raw pagination parameters; values that do not parse fall back to defaults
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

impl PaginationQuery {
    /// Resolve to `(page, page_size)`
    pub fn resolve(&self) -> (usize, usize) {
        let page = parse_positive(self.page.as_deref()).unwrap_or(DEFAULT_PAGE);
        let page_size = parse_positive(self.page_size.as_deref())
            .map(|size| size.min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        (page, page_size)
    }
}

fn parse_positive(value: Option<&str>) -> Option<usize> {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
}

fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|coding| {
            let mut parts = coding.split(';');
            let name = parts.next().unwrap_or_default().trim();
            let refused = parts.any(|p| {
                p.trim()
                    .strip_prefix("q=")
                    .and_then(|q| q.parse::<f32>().ok())
                    .map_or(false, |q| q == 0.0)
            });
            name.eq_ignore_ascii_case("gzip") && !refused
        })
}

pub async fn statuses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (page, page_size) = query.resolve();
    let encoding = if accepts_gzip(&headers) {
        Encoding::Gzip
    } else {
        Encoding::Identity
    };

    let body = state
        .cache
        .statuses(state.store.as_ref(), page, page_size, encoding)
        .await?;

    let mut response = ([(header::CONTENT_TYPE, "application/json")], body).into_response();
    if encoding == Encoding::Gzip {
        response
            .headers_mut()
            .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    Ok(response)
}

#[derive(Serialize)]
pub struct ServiceStatusView {
    pub name: String,
    pub group: String,
    pub key: String,
    pub results: VecDeque<CheckResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatusResponse {
    pub service_status: ServiceStatusView,
    pub events: VecDeque<Event>,
    pub uptime: UptimeReport,
}

pub async fn status_by_key(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ServiceStatusResponse>, ApiError> {
    let (page, page_size) = query.resolve();
    let status = state
        .store
        .get_service_status_with_result_pagination(&key, page, page_size)
        .ok_or_else(|| ApiError::NotFound(format!("Service '{}' not found", key)))?;

    let uptime = status.uptime.report(Utc::now());
    Ok(Json(ServiceStatusResponse {
        service_status: ServiceStatusView {
            name: status.name,
            group: status.group,
            key: status.key,
            results: status.results,
        },
        events: status.events,
        uptime,
    }))
}

// ============================================================================
// Alerts
// ============================================================================

pub async fn alerts(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, Vec<AlertSnapshot>>> {
    Json(state.alert_board.all())
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    pub triggered_alerts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ResultCount>>,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let triggered_alerts = state
        .alert_board
        .all()
        .values()
        .flatten()
        .filter(|alert| alert.is_triggered())
        .count();

    Json(StatsResponse {
        cache: state.cache.stats(),
        triggered_alerts,
        results: state.counters.as_ref().map(|c| c.snapshot()),
    })
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<Arc<CacheError>> for ApiError {
    fn from(e: Arc<CacheError>) -> Self {
        tracing::error!(error = %e, "Failed to render statuses");
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, page_size: Option<&str>) -> PaginationQuery {
        PaginationQuery {
            page: page.map(str::to_string),
            page_size: page_size.map(str::to_string),
        }
    }

    #[test]
    fn test_pagination_defaults_and_caps() {
        assert_eq!(query(None, None).resolve(), (1, 20));
        assert_eq!(query(Some("3"), Some("5")).resolve(), (3, 5));
        assert_eq!(query(Some("abc"), Some("-4")).resolve(), (1, 20));
        assert_eq!(query(Some("0"), Some("0")).resolve(), (1, 20));
        assert_eq!(query(Some("1000"), Some("500")).resolve(), (1000, 100));
    }

    #[test]
    fn test_accepts_gzip() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_gzip(&headers));

        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("deflate, gzip;q=0.8"));
        assert!(accepts_gzip(&headers));

        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip;q=0"));
        assert!(!accepts_gzip(&headers));

        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("br"));
        assert!(!accepts_gzip(&headers));
    }
}
