use super::error::ReclamationError;
use super::eviction::SizeBoundEvictor;
use super::expiration::ExpirationSweep;
use super::report::{CycleOutcome, CycleReport, EvictionReport, Failure, PolicyState, Stage};
use super::Deadline;
use crate::domain::ReclamationPolicy;
use crate::ports::{BlobStore, IndexStore};
use crate::tracker::AccessTracker;
use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Runs reclamation cycles: expiration, then size eviction on the survivors.
///
/// Cycles never overlap; the eviction step depends on the survivor set and
/// occupancy left behind by the expiration step of the same cycle.
pub struct ReclamationCoordinator {
    sweep: ExpirationSweep,
    evictor: SizeBoundEvictor,
    tracker: AccessTracker,
    policy: ReclamationPolicy,
    cycle_gate: Mutex<()>,
}

impl ReclamationCoordinator {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        index: Arc<dyn IndexStore>,
        policy: ReclamationPolicy,
    ) -> Self {
        let tracker = AccessTracker::new(index);
        Self {
            sweep: ExpirationSweep::new(blobs.clone(), tracker.clone(), &policy),
            evictor: SizeBoundEvictor::new(blobs, tracker.clone(), &policy),
            tracker,
            policy,
            cycle_gate: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &ReclamationPolicy {
        &self.policy
    }

    /// Run one cycle as of `now` (milliseconds since the epoch)
    pub async fn run_cycle(&self, now: i64) -> Result<CycleReport, ReclamationError> {
        let deadline = self
            .policy
            .cycle_timeout
            .map(Deadline::after)
            .unwrap_or_default();
        self.run_cycle_until(now, deadline).await
    }

    /// Run one cycle that starts no new deletion once `deadline` has passed
    pub async fn run_cycle_until(
        &self,
        now: i64,
        deadline: Deadline,
    ) -> Result<CycleReport, ReclamationError> {
        let _cycle = self
            .cycle_gate
            .try_lock()
            .map_err(|_| ReclamationError::CycleInProgress)?;
        let started = Instant::now();

        let expiration = match self.sweep.run(now, &deadline).await {
            Ok(expiration) => expiration,
            Err(e) => {
                tracing::error!("Reclamation cycle aborted: {}", e);
                return Err(e);
            }
        };

        let eviction = if !self.evictor.is_enabled() {
            EvictionReport::new(PolicyState::Disabled, None)
        } else if deadline.expired() {
            tracing::warn!("Deadline passed after expiration, skipping size eviction");
            EvictionReport::new(PolicyState::Skipped, self.policy.size_budget())
        } else {
            self.evictor.run(&expiration.survivors, &deadline).await
        };

        let (healed, healing_failures) = self.heal_orphans(&eviction.orphans, &deadline).await;

        let partial = !expiration.deferred.is_empty()
            || !eviction.deferred.is_empty()
            || (eviction.state == PolicyState::Skipped && eviction.failures.is_empty());
        let outcome = if partial {
            CycleOutcome::Partial
        } else {
            CycleOutcome::Completed
        };

        let report = CycleReport {
            now,
            outcome,
            expiration,
            eviction,
            healed,
            healing_failures,
            elapsed: started.elapsed(),
        };

        if outcome == CycleOutcome::Partial {
            tracing::warn!(
                "Reclamation cycle stopped at its deadline after {:?}: deleted {}, deferred {}",
                report.elapsed,
                report.deleted().count(),
                report.expiration.deferred.len() + report.eviction.deferred.len()
            );
        } else {
            tracing::info!(
                "Reclamation cycle completed in {:?}: expired {}, evicted {}, healed {}, failures {}",
                report.elapsed,
                report.expiration.expired.len(),
                report.eviction.evicted.len(),
                report.healed.len(),
                report.failures().count()
            );
        }

        Ok(report)
    }

    /// Drop tracking entries whose blob is missing from the inventory
    async fn heal_orphans(
        &self,
        orphans: &[String],
        deadline: &Deadline,
    ) -> (Vec<String>, Vec<Failure>) {
        let results: Vec<(String, Option<shared::Result<()>>)> = stream::iter(orphans.iter().cloned())
            .map(|key| async move {
                if deadline.expired() {
                    return (key.clone(), None);
                }
                (key.clone(), Some(self.tracker.delete_tracked(&key).await))
            })
            .buffered(self.policy.concurrency())
            .collect()
            .await;

        let mut healed = Vec::new();
        let mut failures = Vec::new();
        for (key, result) in results {
            match result {
                Some(Ok(())) => {
                    tracing::info!("Removed orphaned tracking entry for '{}'", key);
                    healed.push(key);
                }
                Some(Err(error)) => {
                    tracing::warn!("Failed to remove orphaned tracking entry '{}': {}", key, error);
                    failures.push(Failure::for_key(key, Stage::DeleteIndex, error));
                }
                None => {}
            }
        }
        (healed, failures)
    }
}
