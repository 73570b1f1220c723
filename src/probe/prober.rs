//! Connectivity Prober
//!
//! Pings every configured service concurrently and never fails: errors,
//! timeouts and non-2xx statuses all become `reachable: false`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::ServiceEndpoint;
use crate::error::{CacheError, Result};
use crate::probe::{ConnectivityState, ProbeReport};

// == Connectivity Prober ==
#[derive(Debug)]
pub struct ConnectivityProber {
    client: Client,
    services: Vec<ServiceEndpoint>,
    timeout: Duration,
    sequence: AtomicU64,
}

impl ConnectivityProber {
    // == Constructor ==
    /// Creates a prober for `services`, each check bounded by `timeout`.
    pub fn new(services: Vec<ServiceEndpoint>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| CacheError::Config(format!("failed to build probe client: {e}")))?;

        Ok(Self {
            client,
            services,
            timeout,
            sequence: AtomicU64::new(0),
        })
    }

    pub fn services(&self) -> &[ServiceEndpoint] {
        &self.services
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // == Probe Once ==
    /// Checks every service in parallel and collects one state per name.
    pub async fn probe_once(&self) -> ProbeReport {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let started_at = Utc::now();

        let checks = self.services.iter().map(|service| self.check(service));
        let states: HashMap<String, ConnectivityState> = join_all(checks)
            .await
            .into_iter()
            .map(|state| (state.name.clone(), state))
            .collect();

        let reachable = states.values().filter(|s| s.reachable).count();
        debug!(
            sequence,
            reachable,
            total = states.len(),
            "Connectivity probe complete"
        );

        ProbeReport {
            sequence,
            started_at,
            states,
        }
    }

    async fn check(&self, service: &ServiceEndpoint) -> ConnectivityState {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.client.get(&service.url).send()).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(response)) if response.status().is_success() => {
                ConnectivityState::reachable(&service.name, latency_ms)
            }
            Ok(Ok(response)) => {
                let detail = format!("status {}", response.status());
                debug!(service = %service.name, %detail, "Service unhealthy");
                ConnectivityState::unreachable(&service.name, latency_ms, detail)
            }
            Ok(Err(e)) => {
                debug!(service = %service.name, error = %e, "Service unreachable");
                ConnectivityState::unreachable(&service.name, latency_ms, e.to_string())
            }
            Err(_) => {
                warn!(
                    service = %service.name,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Probe timed out"
                );
                ConnectivityState::unreachable(&service.name, latency_ms, "timed out")
            }
        }
    }
}
