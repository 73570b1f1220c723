//! Integration Tests for Local Persistence
//!
//! Writes through a file-backed store, closes it and reopens the same file.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use yacht_cache::config::StorageConfig;
use yacht_cache::{CacheError, CacheStore, MetricsAggregator, ModeCoordinator, Telemetry};

// == Helper Functions ==

async fn open_store(config: &StorageConfig) -> yacht_cache::Result<CacheStore> {
    let metrics = Arc::new(MetricsAggregator::new());
    let coordinator = Arc::new(ModeCoordinator::new(metrics.clone(), Telemetry::disabled()));
    CacheStore::open(config, coordinator, metrics, Telemetry::disabled()).await
}

fn local(dir: &TempDir, max_capacity: usize) -> StorageConfig {
    StorageConfig::Local {
        max_capacity,
        path: dir.path().join("cache.json"),
    }
}

// == Restart ==

#[tokio::test]
async fn test_entries_survive_restart() {
    let dir = TempDir::new().unwrap();
    let config = local(&dir, 100);

    let store = open_store(&config).await.unwrap();
    store
        .put("generator service interval", Some("manuals"), json!({"answer": "250 hours"}), 40, 0.9)
        .await
        .unwrap();
    store.put("tender fuel", None, json!("premium"), 15, 0.6).await.unwrap();
    store.get("tender fuel", None).await.unwrap();
    store.close().await;
    drop(store);

    let reopened = open_store(&config).await.unwrap();
    assert_eq!(reopened.len().await, 2);
    assert_eq!(reopened.metrics_snapshot().await.size, 2);

    let entry = reopened
        .get("Generator Service Interval", Some("manuals"))
        .await
        .unwrap();
    assert_eq!(entry.payload["answer"], "250 hours");
    assert_eq!(entry.category.as_deref(), Some("manuals"));

    let popular = reopened.popular(10).await;
    let tender = popular.iter().find(|p| p.query == "tender fuel").unwrap();
    assert_eq!(tender.usage_count, 2);
    reopened.close().await;
}

#[tokio::test]
async fn test_clear_is_persisted() {
    let dir = TempDir::new().unwrap();
    let config = local(&dir, 100);

    let store = open_store(&config).await.unwrap();
    store.put("q", None, json!({}), 1, 0.5).await.unwrap();
    store.clear().await;
    store.close().await;
    drop(store);

    let reopened = open_store(&config).await.unwrap();
    assert!(reopened.is_empty().await);
    reopened.close().await;
}

#[tokio::test]
async fn test_reopen_with_smaller_capacity_trims() {
    let dir = TempDir::new().unwrap();

    let store = open_store(&local(&dir, 100)).await.unwrap();
    for i in 0..10 {
        store.put(&format!("query {i}"), None, json!(i), 1, 0.5).await.unwrap();
    }
    store.close().await;
    drop(store);

    let reopened = open_store(&local(&dir, 5)).await.unwrap();
    assert!(reopened.len().await <= 5);
    reopened.close().await;
}

// == Damaged Files ==

#[tokio::test]
async fn test_corrupt_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(&path, b"{ this is not json").unwrap();

    let store = open_store(&local(&dir, 100)).await.unwrap();

    assert!(store.is_empty().await);
    assert!(dir.path().join("cache.corrupt").exists());
    store.put("after corruption", None, json!(1), 1, 0.5).await.unwrap();
    assert_eq!(store.len().await, 1);
    store.close().await;
}

#[tokio::test]
async fn test_unwritable_location_is_fatal() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"a file, not a directory").unwrap();

    let config = StorageConfig::Local {
        max_capacity: 100,
        path: blocker.join("cache.json"),
    };

    let result = open_store(&config).await;
    assert!(matches!(result, Err(CacheError::StorageInit(_))));
}
