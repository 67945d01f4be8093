use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_http::validate_request::ValidateRequestHeaderLayer;

use super::badge::uptime_badge;
use super::cache::ResponseCache;
use super::handlers::{alerts, health_check, stats, status_by_key, statuses, AppState};
use super::security::BasicAuth;
use crate::alerts::NotifierRegistry;
use crate::config::MonitorConfig;
use crate::monitor::{
    http_client_timeout, ClientEvaluator, MetricsSink, MonitorContext, NoopMetrics,
    ResultCounters, Scheduler,
};
use crate::storage::{flush_blocking, FileBackend, FlushWorker, MemoryStore, Store};

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    // Statuses and alerts, behind basic auth when configured
    let mut protected: Router<Arc<AppState>> = Router::new()
        .route("/api/v1/statuses", get(statuses))
        .route("/api/v1/statuses/:key", get(status_by_key))
        .route("/api/v1/alerts", get(alerts));
    if let Some(auth) = state.security.clone() {
        protected = protected.route_layer(ValidateRequestHeaderLayer::custom(auth));
    }

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .merge(protected)
        // Badges
        .route("/api/v1/badges/uptime/:duration/:key", get(uptime_badge))
        // Stats
        .route("/stats", get(stats))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Start monitoring and serve the HTTP API until interrupted
pub async fn run_server(config: MonitorConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    // Initialize storage, restoring the last snapshot if one is configured
    let store: Arc<dyn Store> = match &config.storage.file {
        Some(path) => {
            let backend = Arc::new(FileBackend::new(path)?);
            tracing::info!("Persisting statuses to {}", path.display());
            Arc::new(MemoryStore::with_backend(backend, config.retention())?)
        }
        None => {
            tracing::info!("Persistence disabled; statuses are kept in memory only");
            Arc::new(MemoryStore::with_retention(config.retention()))
        }
    };

    let notifiers = NotifierRegistry::from_webhooks(&config.alerting, http_client_timeout())?;
    notifiers.validate(&config.services)?;

    let counters = config.metrics.then(|| Arc::new(ResultCounters::new()));
    let metrics: Arc<dyn MetricsSink> = match &counters {
        Some(counters) => Arc::clone(counters) as Arc<dyn MetricsSink>,
        None => Arc::new(NoopMetrics),
    };

    let context = MonitorContext::new(
        Arc::clone(&store),
        Arc::new(ClientEvaluator::from_env()?),
        Arc::new(notifiers),
        metrics,
        config.monitor_settings(),
    );
    let alert_board = Arc::clone(&context.alert_board);

    // Start monitoring
    let mut scheduler = Scheduler::new(context);
    scheduler.start(&config.services)?;

    // Start background workers
    let cancel = CancellationToken::new();
    let cache = Arc::new(ResponseCache::with_config(
        config.cache.max_entries,
        config.cache_ttl(),
    ));
    let janitor_interval = config.cache_ttl().max(Duration::from_secs(1));
    let janitor_handle = Arc::clone(&cache).start_janitor(janitor_interval, cancel.child_token());

    let flush_worker = config.storage.file.as_ref().map(|_| {
        Arc::new(FlushWorker::new(Arc::clone(&store), config.flush_interval()))
    });
    let flush_handle = flush_worker.as_ref().map(|w| Arc::clone(w).start());

    let state = Arc::new(AppState {
        store: Arc::clone(&store),
        cache,
        alert_board,
        counters,
        security: config.security.as_ref().map(|s| BasicAuth::new(&s.basic)),
    });
    if state.security.is_some() {
        tracing::info!("Basic authentication enabled for status routes");
    }

    // Build router
    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.web.address, config.web.port).parse()?;
    tracing::info!("Starting Vigil server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop monitoring before the final save
    scheduler.shutdown().await;
    cancel.cancel();
    if let Err(e) = janitor_handle.await {
        tracing::warn!(error = %e, "Cache janitor ended abnormally");
    }

    if let Some(worker) = flush_worker {
        worker.stop();
        if let Some(handle) = flush_handle {
            handle.abort();
        }
        flush_blocking(Arc::clone(&store)).await;
    }

    tracing::info!("Vigil server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received, stopping monitoring...");
}
