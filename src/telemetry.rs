//! Telemetry Module
//!
//! Fire-and-forget event reporting. Components push [`TelemetryEvent`]s into
//! a bounded channel; one background task drains it into a sink so callers
//! never wait on the collector. When the queue is full, new events are
//! dropped and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{CacheError, Result};

/// Events queued ahead of the sink before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

// == Telemetry Event ==
/// One observation reported to the external collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    /// Subsystem, e.g. `cache` or `connectivity`
    pub category: String,
    /// What happened, e.g. `hit`, `miss`, `eviction`, `mode_transition`
    pub stage: String,
    pub success: bool,
    pub duration_ms: u64,
    pub metadata: Value,
}

impl TelemetryEvent {
    pub fn new(category: &str, stage: &str, success: bool, duration_ms: u64, metadata: Value) -> Self {
        Self {
            category: category.to_string(),
            stage: stage.to_string(),
            success,
            duration_ms,
            metadata,
        }
    }
}

// == Telemetry Sink ==
/// Where drained events end up.
#[derive(Debug, Clone)]
pub enum TelemetrySink {
    /// Structured log lines via `tracing`
    Log,
    /// JSON POST to an HTTP collector
    Http { client: reqwest::Client, url: String },
}

impl TelemetrySink {
    /// HTTP sink posting each event to `url`, giving up on a post after
    /// `timeout`.
    pub fn http(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Config(format!("failed to build telemetry client: {e}")))?;
        Ok(Self::Http {
            client,
            url: url.into(),
        })
    }

    async fn deliver(&self, event: &TelemetryEvent) {
        match self {
            Self::Log => {
                info!(
                    category = %event.category,
                    stage = %event.stage,
                    success = event.success,
                    duration_ms = event.duration_ms,
                    metadata = %event.metadata,
                    "telemetry"
                );
            }
            Self::Http { client, url } => {
                let result = client
                    .post(url)
                    .json(event)
                    .send()
                    .await
                    .and_then(|response| response.error_for_status());
                if let Err(e) = result {
                    debug!(error = %e, stage = %event.stage, "Dropping telemetry event");
                }
            }
        }
    }
}

// == Telemetry Handle ==
/// Cloneable handle used by the components to emit events.
#[derive(Debug, Clone)]
pub struct Telemetry {
    tx: Option<mpsc::Sender<TelemetryEvent>>,
    dropped: Arc<AtomicU64>,
}

impl Telemetry {
    /// Starts the drain task for `sink` with [`DEFAULT_QUEUE_CAPACITY`].
    pub fn spawn(sink: TelemetrySink) -> (Self, JoinHandle<()>) {
        Self::spawn_with_capacity(sink, DEFAULT_QUEUE_CAPACITY)
    }

    /// Starts the drain task for `sink` and returns the handle.
    ///
    /// The task ends once every handle clone is dropped and the queue is empty.
    pub fn spawn_with_capacity(sink: TelemetrySink, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<TelemetryEvent>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                sink.deliver(&event).await;
            }
            debug!("Telemetry channel closed");
        });

        let telemetry = Self {
            tx: Some(tx),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (telemetry, handle)
    }

    /// A handle that discards every event.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queues an event. Never blocks and never fails.
    pub fn emit(&self, event: TelemetryEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(stage = %event.stage, "Telemetry queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
