//! Shared Backend
//!
//! Delegates every operation to a PostgREST-style table over HTTP. The
//! service owns capacity and retention, so no eviction happens here and the
//! entry count is not tracked. Failures are logged and turned into misses or
//! skipped writes.
//!
//! Read-modify-write sequences are serialized per key, so lookups of
//! different queries never wait on each other. Every operation, lock wait
//! included, is bounded by the configured timeout.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::entry::NewEntry;
use crate::cache::{CacheEntry, PopularQuery};
use crate::error::{CacheError, Result};

// == Shared Backend ==
#[derive(Debug)]
pub struct SharedBackend {
    client: Client,
    table_url: String,
    api_key: Option<String>,
    timeout: Duration,
    /// One async lock per key with a read-modify-write in flight
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SharedBackend {
    /// Builds the client. The service is not contacted here: it may be
    /// offline at startup and that is not fatal.
    pub fn open(
        base_url: &str,
        table: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(CacheError::StorageInit(
                "shared backend selected but SHARED_STORE_URL is empty".to_string(),
            ));
        }
        if table.trim().is_empty() {
            return Err(CacheError::StorageInit("shared store table is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::StorageInit(format!("failed to build HTTP client: {e}")))?;

        info!(base_url, table, timeout_ms = timeout.as_millis() as u64, "Shared cache backend configured");

        Ok(Self {
            client,
            table_url: format!("{base_url}/{}", table.trim()),
            api_key,
            timeout,
            locks: std::sync::Mutex::new(HashMap::new()),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the lock for `hash`, dropping locks nobody else holds.
    fn key_lock(&self, hash: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(hash.to_string()).or_default().clone()
    }

    /// Runs `op` under the lock for `hash`, giving up after the timeout.
    async fn locked<T>(&self, hash: &str, op: impl Future<Output = Option<T>>) -> Option<T> {
        let lock = self.key_lock(hash);
        let bounded = async {
            let _guard = lock.lock().await;
            op.await
        };

        match tokio::time::timeout(self.timeout, bounded).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Shared cache did not answer in time"
                );
                None
            }
        }
    }

    fn request(&self, method: Method) -> RequestBuilder {
        let builder = self.client.request(method, &self.table_url);
        match &self.api_key {
            Some(key) => builder.header("apikey", key).bearer_auth(key),
            None => builder,
        }
    }

    // == Row Access ==
    /// Fetches the row for `hash`.
    pub async fn fetch(&self, hash: &str) -> Result<Option<CacheEntry>> {
        let rows: Vec<CacheEntry> = self
            .request(Method::GET)
            .query(&[("query_hash", format!("eq.{hash}")), ("limit", "1".to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Inserts or replaces the row keyed by `entry.query_hash`.
    pub async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        self.request(Method::POST)
            .query(&[("on_conflict", "query_hash")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[entry])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    // == Get ==
    /// Fetches, records the hit remotely and returns the updated copy.
    pub async fn get(&self, hash: &str) -> Option<CacheEntry> {
        self.locked(hash, async {
            let mut entry = match self.fetch(hash).await {
                Ok(Some(entry)) => entry,
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "Shared cache read failed, treating as miss");
                    return None;
                }
            };

            entry.touch(Utc::now());
            if let Err(e) = self.upsert(&entry).await {
                warn!(error = %e, "Failed to record usage in shared cache");
            }
            Some(entry)
        })
        .await
    }

    // == Put ==
    /// Upserts, preserving `created_at` and incrementing usage of an existing
    /// row. Returns the resulting usage count, or `None` if nothing was stored.
    pub async fn put(&self, new: NewEntry) -> Option<u64> {
        let hash = new.query_hash.clone();
        self.locked(&hash, async move {
            let now = Utc::now();
            let entry = match self.fetch(&new.query_hash).await {
                Ok(Some(mut existing)) => {
                    existing.overwrite(new, now);
                    existing
                }
                Ok(None) => CacheEntry::new(new, now),
                Err(e) => {
                    warn!(error = %e, "Shared cache unavailable, result not cached");
                    return None;
                }
            };

            match self.upsert(&entry).await {
                Ok(()) => Some(entry.usage_count),
                Err(e) => {
                    warn!(error = %e, "Shared cache write failed, result not cached");
                    None
                }
            }
        })
        .await
    }

    // == Clear ==
    pub async fn clear(&self) {
        let result = self
            .request(Method::DELETE)
            .query(&[("usage_count", "gte.0")])
            .send()
            .await
            .and_then(|response| response.error_for_status());
        match result {
            Ok(_) => debug!("Shared cache cleared"),
            Err(e) => warn!(error = %e, "Failed to clear shared cache"),
        }
    }

    // == Popular ==
    pub async fn popular(&self, limit: usize) -> Vec<PopularQuery> {
        let result = async {
            let rows: Vec<PopularQuery> = self
                .request(Method::GET)
                .query(&[
                    ("select", "query,usage_count,last_used_at".to_string()),
                    ("order", "usage_count.desc,last_used_at.desc".to_string()),
                    ("limit", limit.to_string()),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok::<_, CacheError>(rows)
        }
        .await;

        result.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to list popular queries from shared cache");
            Vec::new()
        })
    }
}
