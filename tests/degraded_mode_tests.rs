//! Integration Tests for Degraded Mode
//!
//! Drives the prober against fake services and checks that the coordinator
//! flips the store between fresh and annotated answers.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use yacht_cache::config::ServiceEndpoint;
use yacht_cache::{CacheStore, ConnectivityProber, ModeState};

// == Helper Functions ==

async fn service(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

fn endpoint(name: &str, server: &MockServer) -> ServiceEndpoint {
    ServiceEndpoint::new(name, format!("{}/health", server.uri()))
}

async fn seeded_store() -> CacheStore {
    let store = CacheStore::in_memory(100);
    store
        .put("windlass breaker", None, json!({"answer": "panel B, slot 4"}), 90, 0.8)
        .await
        .unwrap();
    store
}

// == Transitions ==

#[tokio::test]
async fn test_all_services_down_enters_degraded() {
    let nas = service(503).await;
    let inference = service(500).await;
    let prober = ConnectivityProber::new(
        vec![endpoint("nas_search", &nas), endpoint("local_inference", &inference)],
        Duration::from_secs(2),
    )
    .unwrap();
    let store = seeded_store().await;

    let transition = store.coordinator().apply_probe(prober.probe_once().await);

    let transition = transition.expect("expected a transition");
    assert_eq!(transition.from, ModeState::Normal);
    assert_eq!(transition.to, ModeState::Degraded);
    assert!(store.coordinator().is_degraded());
    assert_eq!(store.metrics_snapshot().await.mode_transitions, 1);

    let entry = store.get("windlass breaker", None).await.unwrap();
    assert_eq!(entry.payload["answer"], "panel B, slot 4");
    assert_eq!(entry.payload["degraded"], true);
    assert!(entry.payload["warning"].is_string());
}

#[tokio::test]
async fn test_single_reachable_service_keeps_normal() {
    let nas = service(200).await;
    let internet = service(503).await;
    let prober = ConnectivityProber::new(
        vec![endpoint("nas_search", &nas), endpoint("internet", &internet)],
        Duration::from_secs(2),
    )
    .unwrap();
    let store = seeded_store().await;

    assert!(store.coordinator().apply_probe(prober.probe_once().await).is_none());
    assert!(!store.coordinator().is_degraded());

    let connectivity = store.coordinator().connectivity();
    assert!(connectivity["nas_search"].reachable);
    assert!(!connectivity["internet"].reachable);

    let entry = store.get("windlass breaker", None).await.unwrap();
    assert!(entry.payload.get("degraded").is_none());
}

#[tokio::test]
async fn test_recovery_returns_to_normal() {
    let down = service(503).await;
    let up = service(200).await;
    let store = seeded_store().await;

    let offline = ConnectivityProber::new(vec![endpoint("nas_search", &down)], Duration::from_secs(2)).unwrap();
    store.coordinator().apply_probe(offline.probe_once().await);
    assert!(store.coordinator().is_degraded());

    // A later probe must carry a higher sequence than the one already applied.
    let online = ConnectivityProber::new(vec![endpoint("nas_search", &up)], Duration::from_secs(2)).unwrap();
    online.probe_once().await;
    let transition = store.coordinator().apply_probe(online.probe_once().await).unwrap();

    assert_eq!(transition.to, ModeState::Normal);
    assert_eq!(store.metrics_snapshot().await.mode_transitions, 2);

    let entry = store.get("windlass breaker", None).await.unwrap();
    assert_eq!(entry.payload, json!({"answer": "panel B, slot 4"}));
}

#[tokio::test]
async fn test_stale_probe_is_discarded() {
    let down = service(503).await;
    let up = service(200).await;
    let prober_up = ConnectivityProber::new(vec![endpoint("nas_search", &up)], Duration::from_secs(2)).unwrap();
    let prober_down = ConnectivityProber::new(vec![endpoint("nas_search", &down)], Duration::from_secs(2)).unwrap();
    let store = seeded_store().await;

    let old = prober_down.probe_once().await;
    prober_up.probe_once().await;
    let newer = prober_up.probe_once().await;

    store.coordinator().apply_probe(newer);
    assert!(store.coordinator().apply_probe(old).is_none());
    assert!(!store.coordinator().is_degraded());
}

#[tokio::test]
async fn test_slow_service_counts_as_unreachable() {
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&slow)
        .await;
    let prober = ConnectivityProber::new(
        vec![ServiceEndpoint::new("vector_index", slow.uri())],
        Duration::from_millis(200),
    )
    .unwrap();
    let store = seeded_store().await;

    store.coordinator().apply_probe(prober.probe_once().await);

    assert!(store.coordinator().is_degraded());
    let connectivity = store.coordinator().connectivity();
    let state = &connectivity["vector_index"];
    assert!(!state.reachable);
    assert!(state.detail.is_some());
}
