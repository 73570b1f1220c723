//! Probe result types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Connectivity State ==
/// Outcome of the latest check against one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectivityState {
    pub name: String,
    pub last_checked_at: DateTime<Utc>,
    pub reachable: bool,
    pub last_latency_ms: u64,
    /// Why the check failed, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ConnectivityState {
    pub fn reachable(name: &str, latency_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            last_checked_at: Utc::now(),
            reachable: true,
            last_latency_ms: latency_ms,
            detail: None,
        }
    }

    pub fn unreachable(name: &str, latency_ms: u64, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            last_checked_at: Utc::now(),
            reachable: false,
            last_latency_ms: latency_ms,
            detail: Some(detail.into()),
        }
    }
}

// == Probe Report ==
/// One completed probe run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    /// Increases with every probe started by the same prober
    pub sequence: u64,
    pub started_at: DateTime<Utc>,
    pub states: HashMap<String, ConnectivityState>,
}

impl ProbeReport {
    pub fn any_reachable(&self) -> bool {
        is_any_reachable(&self.states)
    }

    /// Names of reachable (or unreachable) services, sorted.
    pub fn services_where(&self, reachable: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .states
            .values()
            .filter(|s| s.reachable == reachable)
            .map(|s| s.name.clone())
            .collect();
        names.sort();
        names
    }
}

/// True iff at least one service reports reachable.
pub fn is_any_reachable(states: &HashMap<String, ConnectivityState>) -> bool {
    states.values().any(|state| state.reachable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(flags: &[(&str, bool)]) -> HashMap<String, ConnectivityState> {
        flags
            .iter()
            .map(|(name, up)| {
                let state = if *up {
                    ConnectivityState::reachable(name, 5)
                } else {
                    ConnectivityState::unreachable(name, 5, "timeout")
                };
                (name.to_string(), state)
            })
            .collect()
    }

    #[test]
    fn test_none_reachable() {
        assert!(!is_any_reachable(&states(&[("nas_search", false), ("internet", false)])));
    }

    #[test]
    fn test_one_reachable_is_enough() {
        assert!(is_any_reachable(&states(&[("nas_search", false), ("internet", true)])));
    }

    #[test]
    fn test_empty_is_not_reachable() {
        assert!(!is_any_reachable(&HashMap::new()));
    }

    #[test]
    fn test_services_where_sorted() {
        let report = ProbeReport {
            sequence: 1,
            started_at: Utc::now(),
            states: states(&[("vector_index", true), ("local_inference", true), ("internet", false)]),
        };
        assert_eq!(report.services_where(true), vec!["local_inference", "vector_index"]);
        assert_eq!(report.services_where(false), vec!["internet"]);
    }
}
