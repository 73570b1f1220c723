//! API Handlers
//!
//! HTTP request handlers exposing the cache, coordinator and prober to the
//! rest of the assistant.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::cache::key::query_hash;
use crate::cache::{CacheStore, DEFAULT_POPULAR_LIMIT};
use crate::coordinator::{Mode, ModeCoordinator};
use crate::error::{CacheError, Result};
use crate::metrics::{Metrics, MetricsAggregator};
use crate::models::{
    ClearResponse, ConnectivityResponse, HealthResponse, LookupParams, LookupResponse,
    ModeRequest, PopularParams, PopularResponse, ProbeResponse, PutRequest, PutResponse,
};
use crate::probe::ConnectivityProber;

/// Application state shared across all handlers.
///
/// Every component is constructed once at startup and injected here.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheStore>,
    pub coordinator: Arc<ModeCoordinator>,
    pub metrics: Arc<MetricsAggregator>,
    pub prober: Arc<ConnectivityProber>,
}

impl AppState {
    /// Creates a new AppState, sharing the store's coordinator and metrics.
    pub fn new(cache: Arc<CacheStore>, prober: Arc<ConnectivityProber>) -> Self {
        Self {
            coordinator: cache.coordinator().clone(),
            metrics: cache.metrics().clone(),
            cache,
            prober,
        }
    }
}

/// Handler for GET /cache
///
/// Looks up a cached result. A miss is a normal 200 response with `hit: false`.
pub async fn lookup_handler(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> Json<LookupResponse> {
    let lookup = state
        .cache
        .lookup(&params.query, params.category.as_deref())
        .await;

    Json(match lookup.entry {
        Some(entry) => LookupResponse::hit(entry, lookup.degraded),
        None => LookupResponse::miss(lookup.degraded),
    })
}

/// Handler for PUT /cache
///
/// Stores a producer result.
pub async fn put_handler(
    State(state): State<AppState>,
    Json(req): Json<PutRequest>,
) -> Result<Json<PutResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let hash = query_hash(&req.query, req.category.as_deref());
    state
        .cache
        .put(
            &req.query,
            req.category.as_deref(),
            req.payload,
            req.response_time_ms,
            req.relevance_score,
        )
        .await?;

    Ok(Json(PutResponse::new(hash)))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache.clear().await;
    Json(ClearResponse::new())
}

/// Handler for GET /cache/popular
pub async fn popular_handler(
    State(state): State<AppState>,
    Query(params): Query<PopularParams>,
) -> Json<PopularResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_POPULAR_LIMIT);
    Json(PopularResponse {
        queries: state.cache.popular(limit).await,
    })
}

/// Handler for GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Json<Metrics> {
    Json(state.cache.metrics_snapshot().await)
}

/// Handler for GET /mode
pub async fn mode_handler(State(state): State<AppState>) -> Json<Mode> {
    Json(state.coordinator.current_mode())
}

/// Handler for PUT /mode
///
/// Operator override; the next probe result replaces it.
pub async fn force_mode_handler(
    State(state): State<AppState>,
    Json(req): Json<ModeRequest>,
) -> Json<Mode> {
    let reason = req.reason.unwrap_or_else(|| "operator override".to_string());
    state.coordinator.force_mode(req.mode, &reason);
    Json(state.coordinator.current_mode())
}

/// Handler for POST /probe
///
/// Runs one probe now and applies it.
pub async fn probe_handler(State(state): State<AppState>) -> Json<ProbeResponse> {
    let report = state.prober.probe_once().await;
    let any_reachable = report.any_reachable();
    let services = ConnectivityResponse::new(report.states.values().cloned()).services;
    state.coordinator.apply_probe(report);

    Json(ProbeResponse {
        any_reachable,
        mode: state.coordinator.current_mode(),
        services,
    })
}

/// Handler for GET /connectivity
pub async fn connectivity_handler(State(state): State<AppState>) -> Json<ConnectivityResponse> {
    Json(ConnectivityResponse::new(state.coordinator.connectivity().into_values()))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::new(
        state.coordinator.current_mode().current,
        state.cache.backend_name(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ModeState;
    use serde_json::json;
    use std::time::Duration;

    fn test_state() -> AppState {
        let prober = ConnectivityProber::new(Vec::new(), Duration::from_secs(1)).unwrap();
        AppState::new(Arc::new(CacheStore::in_memory(100)), Arc::new(prober))
    }

    fn put_request(query: &str) -> PutRequest {
        PutRequest {
            query: query.to_string(),
            category: None,
            payload: json!({"answer": "replace impeller"}),
            response_time_ms: 300,
            relevance_score: 0.8,
        }
    }

    #[tokio::test]
    async fn test_put_and_lookup_handler() {
        let state = test_state();

        let result = put_handler(State(state.clone()), Json(put_request("raw water pump"))).await;
        assert!(result.is_ok());

        let response = lookup_handler(
            State(state.clone()),
            Query(LookupParams {
                query: "raw water pump".to_string(),
                category: None,
            }),
        )
        .await;
        assert!(response.hit);
        assert!(!response.degraded);
        assert_eq!(
            response.entry.as_ref().unwrap().payload["answer"],
            "replace impeller"
        );
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let state = test_state();
        let response = lookup_handler(
            State(state),
            Query(LookupParams {
                query: "nonexistent".to_string(),
                category: None,
            }),
        )
        .await;
        assert!(!response.hit);
        assert!(response.entry.is_none());
    }

    #[tokio::test]
    async fn test_put_invalid_request() {
        let state = test_state();
        let result = put_handler(State(state), Json(put_request(""))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clear_handler() {
        let state = test_state();
        put_handler(State(state.clone()), Json(put_request("q"))).await.unwrap();

        clear_handler(State(state.clone())).await;

        assert!(state.cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_force_mode_and_health() {
        let state = test_state();

        let mode = force_mode_handler(
            State(state.clone()),
            Json(ModeRequest {
                mode: ModeState::Degraded,
                reason: None,
            }),
        )
        .await;
        assert_eq!(mode.current, ModeState::Degraded);
        assert_eq!(mode.reason, "operator override");

        let health = health_handler(State(state)).await;
        assert_eq!(health.status, "degraded");
    }

    #[tokio::test]
    async fn test_lookup_reports_degraded_with_annotation() {
        let state = test_state();
        put_handler(State(state.clone()), Json(put_request("holding tank"))).await.unwrap();
        state.coordinator.force_mode(ModeState::Degraded, "test");

        let response = lookup_handler(
            State(state),
            Query(LookupParams {
                query: "holding tank".to_string(),
                category: None,
            }),
        )
        .await;
        assert!(response.degraded);
        assert_eq!(response.entry.as_ref().unwrap().payload["degraded"], true);
    }

    #[tokio::test]
    async fn test_metrics_handler() {
        let state = test_state();
        let response = metrics_handler(State(state)).await;
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 0);
    }

    #[tokio::test]
    async fn test_probe_without_services_keeps_mode() {
        let state = test_state();
        let response = probe_handler(State(state)).await;
        assert!(!response.any_reachable);
        assert_eq!(response.mode.current, ModeState::Normal);
        assert!(response.services.is_empty());
    }
}
