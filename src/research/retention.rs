//! Background eviction of finished jobs.

use super::orchestrator::Orchestrator;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Periodically remove terminal jobs older than `max_age`.
///
/// The first sweep runs after one `interval`. Sweep errors are logged and the
/// loop keeps going.
pub fn spawn_sweeper(
    orchestrator: Orchestrator,
    max_age: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = orchestrator.prune_expired(max_age).await {
                tracing::warn!(error = %e, "Retention sweep failed");
            }
        }
    })
}
