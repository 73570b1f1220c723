//! Yacht Cache - resilient query-result cache
//!
//! Caches search and inference answers by normalized query, evicts with a
//! hybrid LFU/LRU policy, persists across restarts and serves annotated
//! cached answers when no external service is reachable.

pub mod api;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod models;
pub mod probe;
pub mod tasks;
pub mod telemetry;

pub use api::AppState;
pub use cache::{CacheEntry, CacheStore};
pub use config::Config;
pub use coordinator::{Mode, ModeCoordinator, ModeState};
pub use error::{CacheError, Result};
pub use metrics::{Metrics, MetricsAggregator};
pub use probe::{ConnectivityProber, ConnectivityState};
pub use tasks::spawn_probe_task;
pub use telemetry::{Telemetry, TelemetryEvent, TelemetrySink};
