//! Cache Entry Module
//!
//! Defines one cached answer for one normalized query, plus the diagnostic
//! row returned by popularity listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::cache::key::truncate_query;
use crate::cache::MAX_QUERY_LENGTH;

/// Warning attached to cache hits served while degraded.
pub const DEGRADED_WARNING: &str =
    "Offline mode: no live service is reachable, this cached answer may be out of date.";

// == Cache Entry ==
/// A single cached answer with usage metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Original query text, truncated for storage
    pub query: String,
    /// Digest of the normalized query and category
    pub query_hash: String,
    /// Optional classifier, part of the key
    #[serde(default)]
    pub category: Option<String>,
    /// Sanitized response payload
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    /// Always true: failed lookups are never cached
    pub success: bool,
    /// Latency observed when the answer was first produced
    pub response_time_ms: u64,
    /// Caller-supplied quality estimate in 0..=1
    pub relevance_score: f64,
    /// Writes plus read hits, starting at 1
    pub usage_count: u64,
}

/// Fields a producer supplies on `put`, already hashed and sanitized.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub query: String,
    pub query_hash: String,
    pub category: Option<String>,
    pub payload: Value,
    pub response_time_ms: u64,
    pub relevance_score: f64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates the first entry for a hash, stamped at `now`.
    pub fn new(new: NewEntry, now: DateTime<Utc>) -> Self {
        Self {
            query: truncate_query(&new.query, MAX_QUERY_LENGTH),
            query_hash: new.query_hash,
            category: new.category,
            payload: new.payload,
            created_at: now,
            last_used_at: now,
            success: true,
            response_time_ms: new.response_time_ms,
            relevance_score: clamp_score(new.relevance_score),
            usage_count: 1,
        }
    }

    // == Overwrite ==
    /// Applies a repeated write: bumps usage and replaces everything but
    /// `created_at`.
    pub fn overwrite(&mut self, new: NewEntry, now: DateTime<Utc>) {
        self.query = truncate_query(&new.query, MAX_QUERY_LENGTH);
        self.category = new.category;
        self.payload = new.payload;
        self.last_used_at = now;
        self.success = true;
        self.response_time_ms = new.response_time_ms;
        self.relevance_score = clamp_score(new.relevance_score);
        self.usage_count += 1;
    }

    // == Touch ==
    /// Records a read hit.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.usage_count += 1;
        self.last_used_at = now;
    }

    // == Degraded Copy ==
    /// Returns a copy whose payload carries the degraded flag and warning.
    ///
    /// Object payloads gain `degraded` and `warning` keys; anything else is
    /// wrapped under `result`.
    pub fn degraded_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.payload = match copy.payload {
            Value::Object(mut map) => {
                map.insert("degraded".to_string(), Value::Bool(true));
                map.insert("warning".to_string(), Value::String(DEGRADED_WARNING.to_string()));
                Value::Object(map)
            }
            other => json!({
                "result": other,
                "degraded": true,
                "warning": DEGRADED_WARNING,
            }),
        };
        copy
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

// == Popular Query ==
/// Diagnostic row for the most used queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularQuery {
    pub query: String,
    pub usage_count: u64,
    pub last_used_at: DateTime<Utc>,
}

impl From<&CacheEntry> for PopularQuery {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            query: entry.query.clone(),
            usage_count: entry.usage_count,
            last_used_at: entry.last_used_at,
        }
    }
}
