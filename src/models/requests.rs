//! Request DTOs for the host HTTP surface
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::cache::key::normalize;
use crate::coordinator::ModeState;

/// Request body for caching a producer result (PUT /cache)
#[derive(Debug, Clone, Deserialize)]
pub struct PutRequest {
    /// The query the result answers
    pub query: String,
    /// Optional classifier, part of the key
    #[serde(default, deserialize_with = "blank_as_none")]
    pub category: Option<String>,
    /// Response payload to cache
    pub payload: Value,
    /// Latency of the producer in milliseconds
    #[serde(default)]
    pub response_time_ms: u64,
    /// Quality estimate in 0..=1
    #[serde(default = "default_relevance")]
    pub relevance_score: f64,
}

fn default_relevance() -> f64 {
    0.5
}

/// `category=` and whitespace-only categories mean no category.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let category = Option::<String>::deserialize(deserializer)?;
    Ok(category.filter(|c| !c.trim().is_empty()))
}

impl PutRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if normalize(&self.query).is_empty() {
            return Some("Query cannot be empty".to_string());
        }
        if !self.relevance_score.is_finite() {
            return Some("relevance_score must be a number".to_string());
        }
        None
    }
}

/// Query string for lookups (GET /cache)
#[derive(Debug, Clone, Deserialize)]
pub struct LookupParams {
    pub query: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub category: Option<String>,
}

/// Query string for GET /cache/popular
#[derive(Debug, Clone, Deserialize)]
pub struct PopularParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Request body for the operator mode override (PUT /mode)
#[derive(Debug, Clone, Deserialize)]
pub struct ModeRequest {
    pub mode: ModeState,
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_request_deserialize() {
        let json = r#"{"query": "oil filter", "payload": {"answer": "A"}}"#;
        let req: PutRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.query, "oil filter");
        assert!(req.category.is_none());
        assert_eq!(req.response_time_ms, 0);
        assert_eq!(req.relevance_score, 0.5);
    }

    #[test]
    fn test_put_request_full() {
        let json = r#"{"query": "q", "category": "manuals", "payload": "x", "response_time_ms": 250, "relevance_score": 0.75}"#;
        let req: PutRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.category.as_deref(), Some("manuals"));
        assert_eq!(req.response_time_ms, 250);
        assert_eq!(req.relevance_score, 0.75);
    }

    #[test]
    fn test_validate_empty_query() {
        let req: PutRequest = serde_json::from_str(r#"{"query": "  ", "payload": null}"#).unwrap();
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_valid_request() {
        let req: PutRequest = serde_json::from_str(r#"{"query": "gen set", "payload": {}}"#).unwrap();
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_blank_category_is_none() {
        let req: PutRequest =
            serde_json::from_str(r#"{"query": "q", "category": " ", "payload": 1}"#).unwrap();
        assert!(req.category.is_none());
        let req: PutRequest =
            serde_json::from_str(r#"{"query": "q", "category": null, "payload": 1}"#).unwrap();
        assert!(req.category.is_none());
    }

    #[test]
    fn test_mode_request_deserialize() {
        let req: ModeRequest = serde_json::from_str(r#"{"mode": "DEGRADED"}"#).unwrap();
        assert_eq!(req.mode, ModeState::Degraded);
        assert!(req.reason.is_none());
    }
}
