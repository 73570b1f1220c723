//! Connectivity Probe Task
//!
//! Background task that periodically probes external services and feeds the
//! result to the mode coordinator.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::coordinator::ModeCoordinator;
use crate::probe::ConnectivityProber;

/// Spawns a background task that probes connectivity every
/// `interval_secs` seconds, starting immediately.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let probe_handle = spawn_probe_task(prober.clone(), coordinator.clone(), 30);
/// // Later, during shutdown:
/// probe_handle.abort();
/// ```
pub fn spawn_probe_task(
    prober: Arc<ConnectivityProber>,
    coordinator: Arc<ModeCoordinator>,
    interval_secs: u64,
) -> JoinHandle<()> {
    let period = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting connectivity probe task with interval of {} seconds",
            period.as_secs()
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let report = prober.probe_once().await;
            let reachable = report.any_reachable();
            match coordinator.apply_probe(report) {
                Some(transition) => debug!(to = %transition.to, "Probe changed mode"),
                None => debug!(reachable, "Probe left mode unchanged"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceEndpoint;
    use crate::coordinator::ModeState;
    use crate::metrics::MetricsAggregator;
    use crate::telemetry::Telemetry;

    fn coordinator() -> Arc<ModeCoordinator> {
        Arc::new(ModeCoordinator::new(
            Arc::new(MetricsAggregator::new()),
            Telemetry::disabled(),
        ))
    }

    #[tokio::test]
    async fn test_probe_task_degrades_when_nothing_answers() {
        let prober = Arc::new(
            ConnectivityProber::new(
                vec![ServiceEndpoint::new("nas_search", "http://127.0.0.1:9/health")],
                Duration::from_millis(500),
            )
            .unwrap(),
        );
        let coordinator = coordinator();

        let handle = spawn_probe_task(prober, coordinator.clone(), 60);

        // The first tick fires immediately.
        let mut waited = 0;
        while !coordinator.is_degraded() && waited < 30 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            waited += 1;
        }
        assert_eq!(coordinator.current_mode().current, ModeState::Degraded);

        handle.abort();
    }

    #[tokio::test]
    async fn test_probe_task_can_be_aborted() {
        let prober = Arc::new(ConnectivityProber::new(Vec::new(), Duration::from_millis(100)).unwrap());

        let handle = spawn_probe_task(prober, coordinator(), 1);

        // Abort immediately
        handle.abort();

        // Wait a bit and verify task is finished
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
