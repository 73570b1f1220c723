//! Cache Store Module
//!
//! Main cache engine: keys and sanitizes writes, dispatches to the configured
//! backend, annotates hits while degraded and feeds metrics and telemetry.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::cache::backend::Backend;
use crate::cache::entry::NewEntry;
use crate::cache::key::{normalize, query_hash};
use crate::cache::local::LocalBackend;
use crate::cache::sanitize::sanitize;
use crate::cache::{CacheEntry, PopularQuery};
use crate::config::StorageConfig;
use crate::coordinator::ModeCoordinator;
use crate::error::{CacheError, Result};
use crate::metrics::{Metrics, MetricsAggregator};
use crate::telemetry::{Telemetry, TelemetryEvent};

// == Lookup ==
/// Result of a lookup together with the mode it was served under.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub entry: Option<CacheEntry>,
    /// Mode flag read once per lookup; a hit's payload is annotated iff set
    pub degraded: bool,
}

/// Blank categories key the same as no category.
fn effective_category(category: Option<&str>) -> Option<&str> {
    category.filter(|c| !c.trim().is_empty())
}

// == Cache Store ==
/// Query-result cache shared by request handlers.
#[derive(Debug)]
pub struct CacheStore {
    backend: Backend,
    coordinator: Arc<ModeCoordinator>,
    metrics: Arc<MetricsAggregator>,
    telemetry: Telemetry,
}

impl CacheStore {
    // == Constructors ==
    /// Opens the configured backend. A failure here should abort startup.
    pub async fn open(
        storage: &StorageConfig,
        coordinator: Arc<ModeCoordinator>,
        metrics: Arc<MetricsAggregator>,
        telemetry: Telemetry,
    ) -> Result<Self> {
        let backend = Backend::from_config(storage).await?;
        Ok(Self::with_backend(backend, coordinator, metrics, telemetry))
    }

    /// Wraps an already constructed backend.
    pub fn with_backend(
        backend: Backend,
        coordinator: Arc<ModeCoordinator>,
        metrics: Arc<MetricsAggregator>,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            backend,
            coordinator,
            metrics,
            telemetry,
        }
    }

    /// Memory-only store with a fresh coordinator and metrics, for tests and
    /// embedding without disk.
    pub fn in_memory(max_capacity: usize) -> Self {
        let metrics = Arc::new(MetricsAggregator::new());
        let coordinator = Arc::new(ModeCoordinator::new(metrics.clone(), Telemetry::disabled()));
        Self::with_backend(
            Backend::Local(LocalBackend::ephemeral(max_capacity)),
            coordinator,
            metrics,
            Telemetry::disabled(),
        )
    }

    pub fn coordinator(&self) -> &Arc<ModeCoordinator> {
        &self.coordinator
    }

    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    // == Put ==
    /// Caches a successful result.
    ///
    /// Credential-shaped keys are stripped from `payload` before storage.
    /// Repeated writes for the same key bump `usage_count`. Storage failures
    /// are logged and leave the result uncached.
    pub async fn put(
        &self,
        query: &str,
        category: Option<&str>,
        mut payload: Value,
        response_time_ms: u64,
        relevance_score: f64,
    ) -> Result<()> {
        if normalize(query).is_empty() {
            return Err(CacheError::InvalidRequest("Query cannot be empty".to_string()));
        }

        let category = effective_category(category);
        let hash = query_hash(query, category);
        let dropped = sanitize(&mut payload);
        if dropped > 0 {
            debug!(query_hash = %hash, dropped, "Stripped credential fields from payload");
        }

        let started = Instant::now();
        let outcome = self
            .backend
            .put(NewEntry {
                query: query.to_string(),
                query_hash: hash.clone(),
                category: category.map(str::to_string),
                payload,
                response_time_ms,
                relevance_score,
            })
            .await;

        if !outcome.evicted.is_empty() {
            let count = outcome.evicted.len();
            self.metrics.record_evictions(count as u64);
            info!(count, size = ?outcome.size, "Evicted low-value cache entries");
            self.telemetry.emit(TelemetryEvent::new(
                "cache",
                "eviction",
                true,
                started.elapsed().as_millis() as u64,
                json!({ "evicted": count, "size": outcome.size }),
            ));
        }

        debug!(query_hash = %hash, usage_count = ?outcome.usage_count, "Cached result");
        Ok(())
    }

    // == Get ==
    /// Looks up a cached result and records the hit.
    ///
    /// While degraded the returned copy is annotated; the stored entry is not.
    pub async fn get(&self, query: &str, category: Option<&str>) -> Option<CacheEntry> {
        self.lookup(query, category).await.entry
    }

    /// Like [`get`](Self::get), also reporting whether the answer was served
    /// as degraded.
    pub async fn lookup(&self, query: &str, category: Option<&str>) -> Lookup {
        let started = Instant::now();
        let hash = query_hash(query, effective_category(category));

        let entry = self.backend.get(&hash).await;
        let degraded = self.coordinator.is_degraded();

        let entry = match entry {
            Some(entry) => {
                self.metrics.record_hit();
                self.telemetry.emit(TelemetryEvent::new(
                    "cache",
                    "hit",
                    true,
                    started.elapsed().as_millis() as u64,
                    json!({
                        "query_hash": hash,
                        "usage_count": entry.usage_count,
                        "degraded": degraded,
                    }),
                ));
                Some(if degraded { entry.degraded_copy() } else { entry })
            }
            None => {
                self.metrics.record_miss();
                self.telemetry.emit(TelemetryEvent::new(
                    "cache",
                    "miss",
                    false,
                    started.elapsed().as_millis() as u64,
                    json!({ "query_hash": hash }),
                ));
                None
            }
        };

        Lookup { entry, degraded }
    }

    // == Clear ==
    /// Empties the store and zeroes the metrics.
    pub async fn clear(&self) {
        self.backend.clear().await;
        self.metrics.reset();
        info!(backend = self.backend.name(), "Cache cleared");
    }

    // == Metrics ==
    /// Counter snapshot with the current entry count.
    pub async fn metrics_snapshot(&self) -> Metrics {
        self.metrics.snapshot(self.backend.len().await)
    }

    // == Popular ==
    /// Most used queries first.
    pub async fn popular(&self, limit: usize) -> Vec<PopularQuery> {
        self.backend.popular(limit).await
    }

    // == Length ==
    /// Current entry count (0 for the shared backend).
    pub async fn len(&self) -> usize {
        self.backend.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // == Close ==
    /// Flushes pending persistence. Call once at shutdown.
    pub async fn close(&self) {
        self.backend.close().await;
    }
}
