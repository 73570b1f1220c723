//! Response DTOs for the host HTTP surface
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheEntry, PopularQuery};
use crate::coordinator::{Mode, ModeState};
use crate::probe::ConnectivityState;

/// Response body for lookups (GET /cache)
#[derive(Debug, Clone, Serialize)]
pub struct LookupResponse {
    /// Whether a cached entry was found
    pub hit: bool,
    /// True when the answer is served while degraded
    pub degraded: bool,
    /// The cached entry, possibly annotated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<CacheEntry>,
}

impl LookupResponse {
    pub fn hit(entry: CacheEntry, degraded: bool) -> Self {
        Self {
            hit: true,
            degraded,
            entry: Some(entry),
        }
    }

    pub fn miss(degraded: bool) -> Self {
        Self {
            hit: false,
            degraded,
            entry: None,
        }
    }
}

/// Response body for PUT /cache
#[derive(Debug, Clone, Serialize)]
pub struct PutResponse {
    /// Success message
    pub message: String,
    /// Key the result was stored under
    pub query_hash: String,
}

impl PutResponse {
    pub fn new(query_hash: impl Into<String>) -> Self {
        let query_hash = query_hash.into();
        Self {
            message: format!("Result cached under '{}'", query_hash),
            query_hash,
        }
    }
}

/// Response body for DELETE /cache
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn new() -> Self {
        Self {
            message: "Cache cleared".to_string(),
        }
    }
}

impl Default for ClearResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Response body for GET /cache/popular
#[derive(Debug, Clone, Serialize)]
pub struct PopularResponse {
    pub queries: Vec<PopularQuery>,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// Current mode
    pub mode: ModeState,
    /// Storage backend in use
    pub backend: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn new(mode: ModeState, backend: &str) -> Self {
        let status = match mode {
            ModeState::Normal => "healthy",
            ModeState::Degraded => "degraded",
        };
        Self {
            status: status.to_string(),
            mode,
            backend: backend.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for GET /connectivity
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityResponse {
    /// Latest state per service, sorted by name
    pub services: Vec<ConnectivityState>,
}

impl ConnectivityResponse {
    pub fn new(services: impl IntoIterator<Item = ConnectivityState>) -> Self {
        let mut services: Vec<ConnectivityState> = services.into_iter().collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Self { services }
    }
}

/// Response body for POST /probe
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResponse {
    pub any_reachable: bool,
    /// Mode after the probe was applied
    pub mode: Mode,
    pub services: Vec<ConnectivityState>,
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_miss_omits_entry() {
        let json = serde_json::to_value(LookupResponse::miss(false)).unwrap();
        assert_eq!(json["hit"], false);
        assert!(json.get("entry").is_none());
    }

    #[test]
    fn test_put_response_serialize() {
        let resp = PutResponse::new("abc123");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("abc123"));
        assert!(json.contains("cached"));
    }

    #[test]
    fn test_health_response_reflects_mode() {
        let resp = HealthResponse::new(ModeState::Degraded, "local");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["mode"], "DEGRADED");
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn test_connectivity_sorted() {
        let resp = ConnectivityResponse::new(vec![
            ConnectivityState::reachable("vector_index", 1),
            ConnectivityState::unreachable("internet", 4000, "timed out"),
        ]);
        assert_eq!(resp.services[0].name, "internet");
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
