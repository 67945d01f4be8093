//! Response caching for the status listing
//!
//! Uses moka for concurrent caching with TTL-based expiration. Concurrent
//! misses on one key are coalesced so the listing is rendered once per key and
//! TTL window no matter how many requests arrive together. Entries are evicted
//! least recently used first once `max_entries` is reached; with keys bounded
//! by page and page size that limit is only a backstop.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::data::CheckResult;
use crate::storage::Store;

/// Content encoding of a cached body
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Encoding {
    Identity,
    Gzip,
}

/// Cache key for a rendered listing
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct CacheKey {
    pub page: usize,
    pub page_size: usize,
    pub encoding: Encoding,
}

impl CacheKey {
    pub fn new(page: usize, page_size: usize, encoding: Encoding) -> Self {
        Self {
            page,
            page_size,
            encoding,
        }
    }
}

/// Rendered responses with TTL and single-flight misses
pub struct ResponseCache {
    cache: Cache<CacheKey, Bytes>,
    /// Cache hit count
    hits: AtomicU64,
    /// Cache miss count
    misses: AtomicU64,
    /// Number of times a body was rendered
    computations: AtomicU64,
    /// TTL for cache entries
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache with default settings
    pub fn new() -> Self {
        Self::with_config(10_000, Duration::from_secs(10))
    }

    /// Create a cache with custom configuration
    pub fn with_config(max_entries: u64, ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_entries)
                .eviction_policy(EvictionPolicy::lru())
                .time_to_live(ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            computations: AtomicU64::new(0),
            ttl,
        }
    }

    /// Return the cached body for `key`, running `compute` on a miss.
    ///
    /// Callers that miss on the same key at the same time wait for a single
    /// `compute` and share its bytes. A failed computation is not cached and
    /// its error is returned to the callers that waited on it.
    pub async fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Result<Bytes, Arc<CacheError>>
    where
        F: Future<Output = Result<Bytes, CacheError>>,
    {
        let entry = self
            .cache
            .entry(key)
            .or_try_insert_with(async {
                self.computations.fetch_add(1, Ordering::Relaxed);
                compute.await
            })
            .await?;

        if entry.is_fresh() {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }

        Ok(entry.into_value())
    }

    /// Rendered status listing for one page, served from cache when possible
    pub async fn statuses(
        &self,
        store: &dyn Store,
        page: usize,
        page_size: usize,
        encoding: Encoding,
    ) -> Result<Bytes, Arc<CacheError>> {
        let key = CacheKey::new(page, page_size, encoding);
        self.get_or_compute(key, async move {
            render_statuses(store, page, page_size, encoding)
        })
        .await
    }

    /// Invalidate all cache entries
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Expire and evict entries now instead of waiting for housekeeping
    pub async fn sweep(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// Periodically sweep expired entries until `cancel` fires
    pub fn start_janitor(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.sweep().await,
                    _ = cancel.cancelled() => {
                        tracing::debug!("Cache janitor shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            computations: self.computations.load(Ordering::Relaxed),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            entry_count: self.cache.entry_count(),
            ttl_secs: self.ttl.as_secs(),
        }
    }

    /// Get TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of rendered bodies, including failed attempts
    pub computations: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
    /// Approximate number of entries in cache
    pub entry_count: u64,
    /// TTL in seconds
    pub ttl_secs: u64,
}

/// Listing entry; events and uptime are only served by the per-service endpoint
#[derive(Serialize)]
struct StatusSummary<'a> {
    name: &'a str,
    group: &'a str,
    key: &'a str,
    results: &'a VecDeque<CheckResult>,
}

/// Render one page of every status as a JSON object keyed by service key,
/// optionally gzip-compressed
pub fn render_statuses(
    store: &dyn Store,
    page: usize,
    page_size: usize,
    encoding: Encoding,
) -> Result<Bytes, CacheError> {
    let statuses = store.get_all_service_statuses_with_result_pagination(page, page_size);
    let summaries: BTreeMap<&str, StatusSummary<'_>> = statuses
        .iter()
        .map(|(key, s)| {
            let summary = StatusSummary {
                name: &s.name,
                group: &s.group,
                key: &s.key,
                results: &s.results,
            };
            (key.as_str(), summary)
        })
        .collect();

    let json = serde_json::to_vec(&summaries)?;
    match encoding {
        Encoding::Identity => Ok(Bytes::from(json)),
        Encoding::Gzip => Ok(Bytes::from(gzip(&json)?)),
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Unable to marshal object to JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unable to compress response: {0}")]
    Compression(#[from] std::io::Error),
}
