//! Eviction Policy Module
//!
//! Hybrid LFU/LRU selection: usage frequency dominates, recency breaks ties.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::cache::CacheEntry;

/// Size the store is brought down to once it exceeds `max_capacity`.
pub fn low_watermark(max_capacity: usize) -> usize {
    // ceil(0.9 * max_capacity)
    (max_capacity * 9).div_ceil(10)
}

/// Orders entries from least to most valuable.
pub fn rank(a: &CacheEntry, b: &CacheEntry) -> Ordering {
    a.usage_count
        .cmp(&b.usage_count)
        .then_with(|| a.last_used_at.cmp(&b.last_used_at))
        .then_with(|| a.query_hash.cmp(&b.query_hash))
}

/// Evicts in passes of the lowest-ranked 10% (at least one) until the map is
/// at or under the low watermark. Returns the evicted hashes in removal order.
///
/// Does nothing while `entries.len() <= max_capacity`.
pub fn evict(entries: &mut HashMap<String, CacheEntry>, max_capacity: usize) -> Vec<String> {
    let mut evicted = Vec::new();
    if entries.len() <= max_capacity {
        return evicted;
    }

    let target = low_watermark(max_capacity);
    while entries.len() > target {
        let batch = (entries.len() / 10).max(1).min(entries.len() - target);

        let mut ranked: Vec<&CacheEntry> = entries.values().collect();
        ranked.sort_by(|a, b| rank(a, b));
        let victims: Vec<String> = ranked
            .into_iter()
            .take(batch)
            .map(|entry| entry.query_hash.clone())
            .collect();

        for hash in victims {
            entries.remove(&hash);
            evicted.push(hash);
        }
    }

    evicted
}
