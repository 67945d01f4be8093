//! Vigil Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - VIGIL_CONFIG: Path to the JSON configuration (default: config/config.json)
//! - VIGIL_HOST: Bind address, overrides `web.address`
//! - VIGIL_PORT: Port number, overrides `web.port`
//! - HTTP_CLIENT_TIMEOUT_IN_SECONDS: Timeout of HTTP evaluations (default: 10)
//! - RUST_LOG: Log level (default: info)

use vigil::api::run_server;
use vigil::config::MonitorConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::var("VIGIL_CONFIG").unwrap_or_else(|_| "config/config.json".to_string());
    let mut config = MonitorConfig::load(&path)?;

    // Environment overrides
    if let Ok(host) = std::env::var("VIGIL_HOST") {
        config.web.address = host;
    }
    if let Some(port) = std::env::var("VIGIL_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
    {
        config.web.port = port;
    }

    tracing::info!("Vigil configuration ({}):", path);
    tracing::info!("  Listen: {}:{}", config.web.address, config.web.port);
    tracing::info!("  Services: {}", config.services.len());
    tracing::info!(
        "  Monitoring lock: {}",
        if config.disable_monitoring_lock {
            "DISABLED (evaluations run concurrently)"
        } else {
            "ENABLED (one evaluation at a time)"
        }
    );
    tracing::info!(
        "  Retention: {} results, {} events per service",
        config.storage.max_results,
        config.storage.max_events
    );
    match &config.storage.file {
        Some(file) => tracing::info!(
            "  Persistence: {} (every {} seconds)",
            file.display(),
            config.storage.flush_interval_secs
        ),
        None => tracing::info!("  Persistence: DISABLED"),
    }
    tracing::info!(
        "  Cache: {} seconds TTL, {} entries max",
        config.cache.ttl_secs,
        config.cache.max_entries
    );
    for service in &config.services {
        tracing::info!(
            "    - {} every {}s ({} alerts)",
            service.key(),
            service.interval.as_secs(),
            service.alerts.len()
        );
    }

    println!(
        r#"
 __      ___       _ _
 \ \    / (_)     (_) |
  \ \  / / _  __ _ _| |
   \ \/ / | |/ _` | | |
    \  /  | | (_| | | |
     \/   |_|\__, |_|_|
              __/ |
             |___/

 Service Health Monitor
 Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );

    run_server(config).await
}
