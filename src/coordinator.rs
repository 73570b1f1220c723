//! Degraded-Mode Coordinator
//!
//! Owns the process-wide NORMAL/DEGRADED mode. Probe reports drive it: one
//! report with nothing reachable flips to DEGRADED, one report with anything
//! reachable flips back. There is no debounce.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::metrics::MetricsAggregator;
use crate::probe::{ConnectivityState, ProbeReport};
use crate::telemetry::{Telemetry, TelemetryEvent};

// == Mode ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModeState {
    Normal,
    Degraded,
}

impl fmt::Display for ModeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Degraded => write!(f, "DEGRADED"),
        }
    }
}

/// Snapshot of the current mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mode {
    pub current: ModeState,
    pub since: DateTime<Utc>,
    pub reason: String,
}

/// A mode change, as logged and reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub from: ModeState,
    pub to: ModeState,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CoordinatorState {
    mode: Mode,
    /// Sequence of the newest probe applied so far
    last_sequence: u64,
    connectivity: HashMap<String, ConnectivityState>,
}

// == Mode Coordinator ==
#[derive(Debug)]
pub struct ModeCoordinator {
    state: watch::Sender<CoordinatorState>,
    metrics: Arc<MetricsAggregator>,
    telemetry: Telemetry,
}

impl ModeCoordinator {
    // == Constructor ==
    /// Starts in NORMAL.
    pub fn new(metrics: Arc<MetricsAggregator>, telemetry: Telemetry) -> Self {
        let (state, _) = watch::channel(CoordinatorState {
            mode: Mode {
                current: ModeState::Normal,
                since: Utc::now(),
                reason: "startup".to_string(),
            },
            last_sequence: 0,
            connectivity: HashMap::new(),
        });
        Self {
            state,
            metrics,
            telemetry,
        }
    }

    pub fn current_mode(&self) -> Mode {
        self.state.borrow().mode.clone()
    }

    pub fn is_degraded(&self) -> bool {
        self.state.borrow().mode.current == ModeState::Degraded
    }

    /// States from the newest applied probe.
    pub fn connectivity(&self) -> HashMap<String, ConnectivityState> {
        self.state.borrow().connectivity.clone()
    }

    // == Apply Probe ==
    /// Applies a completed probe.
    ///
    /// Reports older than the newest one already applied are discarded, as
    /// are reports that checked no services.
    pub fn apply_probe(&self, report: ProbeReport) -> Option<Transition> {
        if report.states.is_empty() {
            debug!(sequence = report.sequence, "Probe checked no services, ignoring");
            return None;
        }

        let reachable = report.services_where(true);
        let (next, reason) = if reachable.is_empty() {
            (
                ModeState::Degraded,
                format!(
                    "no external service reachable (checked: {})",
                    report.services_where(false).join(", ")
                ),
            )
        } else {
            (ModeState::Normal, format!("reachable: {}", reachable.join(", ")))
        };

        let mut transition = None;
        let applied = self.state.send_if_modified(|state| {
            if report.sequence <= state.last_sequence {
                return false;
            }
            state.last_sequence = report.sequence;
            state.connectivity = report.states.clone();
            transition = Self::transition(state, next, &reason);
            true
        });

        if !applied {
            debug!(sequence = report.sequence, "Discarding stale probe result");
            return None;
        }

        if let Some(t) = &transition {
            self.announce(t);
        }
        transition
    }

    // == Set Mode ==
    /// Moves to `next` if not already there.
    pub(crate) fn set_mode(&self, next: ModeState, reason: &str) -> Option<Transition> {
        let mut transition = None;
        self.state.send_if_modified(|state| {
            transition = Self::transition(state, next, reason);
            transition.is_some()
        });
        if let Some(t) = &transition {
            self.announce(t);
        }
        transition
    }

    /// Operator override. The next probe result takes over again.
    pub fn force_mode(&self, next: ModeState, reason: &str) -> Option<Transition> {
        warn!(mode = %next, reason, "Mode forced by operator");
        self.set_mode(next, reason)
    }

    fn transition(state: &mut CoordinatorState, next: ModeState, reason: &str) -> Option<Transition> {
        if state.mode.current == next {
            return None;
        }
        let timestamp = Utc::now();
        let transition = Transition {
            from: state.mode.current,
            to: next,
            reason: reason.to_string(),
            timestamp,
        };
        state.mode = Mode {
            current: next,
            since: timestamp,
            reason: reason.to_string(),
        };
        Some(transition)
    }

    fn announce(&self, t: &Transition) {
        match t.to {
            ModeState::Degraded => warn!(
                from = %t.from,
                to = %t.to,
                reason = %t.reason,
                timestamp = %t.timestamp,
                "Entering degraded mode, serving cached answers only"
            ),
            ModeState::Normal => info!(
                from = %t.from,
                to = %t.to,
                reason = %t.reason,
                timestamp = %t.timestamp,
                "Connectivity restored, leaving degraded mode"
            ),
        }

        self.metrics.record_transition();
        self.telemetry.emit(TelemetryEvent::new(
            "connectivity",
            "mode_transition",
            t.to == ModeState::Normal,
            0,
            json!({
                "from": t.from,
                "to": t.to,
                "reason": t.reason,
                "timestamp": t.timestamp,
            }),
        ));
    }
}
