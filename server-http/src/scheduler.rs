use keeper::planes::control::{ReclamationCoordinator, ReclamationError};
use keeper::ports::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Run one reclamation cycle every `interval` until `shutdown` flips to true.
///
/// The first cycle starts one interval after spawning. A cycle that overruns
/// the interval delays the next tick instead of queueing extra ones.
pub fn spawn(
    coordinator: Arc<ReclamationCoordinator>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!("Reclamation scheduler started, interval {:?}", interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => run_once(&coordinator, clock.as_ref()).await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Reclamation scheduler stopped");
    })
}

async fn run_once(coordinator: &ReclamationCoordinator, clock: &dyn Clock) {
    match coordinator.run_cycle(clock.now_ms()).await {
        Ok(report) => {
            for failure in report.failures() {
                tracing::warn!(
                    "Reclamation failure at {:?} for {}: {}",
                    failure.stage,
                    failure.key.as_deref().unwrap_or("<listing>"),
                    failure.error
                );
            }
            for anomaly in report.anomalies() {
                tracing::warn!("Reclamation anomaly: {:?}", anomaly);
            }
        }
        Err(ReclamationError::CycleInProgress) => {
            tracing::warn!("Skipping tick, previous reclamation cycle still running");
        }
        Err(e) => tracing::error!("Reclamation cycle failed: {}", e),
    }
}
