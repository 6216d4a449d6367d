use super::report::{EvictionReport, Failure, PolicyState, Stage, Survivor};
use super::{Deadline, Removal, remove_entry};
use crate::domain::ReclamationPolicy;
use crate::inventory::SizeInventory;
use crate::ports::BlobStore;
use crate::tracker::AccessTracker;
use futures::{FutureExt, StreamExt};
use futures::stream;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Candidate {
    key: String,
    last_accessed_at: i64,
    size: u64,
}

/// Evicts least-recently-used survivors while occupancy exceeds the budget
pub struct SizeBoundEvictor {
    blobs: Arc<dyn BlobStore>,
    tracker: AccessTracker,
    inventory: SizeInventory,
    budget: Option<u64>,
    concurrency: usize,
}

impl SizeBoundEvictor {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        tracker: AccessTracker,
        policy: &ReclamationPolicy,
    ) -> Self {
        Self {
            inventory: SizeInventory::new(blobs.clone()),
            blobs,
            tracker,
            budget: policy.size_budget(),
            concurrency: policy.concurrency(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.budget.is_some()
    }

    /// Bring occupancy under budget by evicting from `survivors`, oldest access first.
    ///
    /// Takes its occupancy snapshot when called, so it must run after the
    /// expiration sweep of the same cycle.
    pub async fn run(&self, survivors: &[Survivor], deadline: &Deadline) -> EvictionReport {
        let Some(budget) = self.budget else {
            return EvictionReport::new(PolicyState::Disabled, None);
        };
        let mut report = EvictionReport::new(PolicyState::Ran, Some(budget));

        let occupancy = match self.inventory.compute_occupancy().await {
            Ok(occupancy) => occupancy,
            Err(error) => {
                tracing::warn!("Skipping size eviction, inventory failed: {}", error);
                report.state = PolicyState::Skipped;
                report.failures.push(Failure::listing(Stage::Inventory, error));
                return report;
            }
        };

        let mut candidates = Vec::with_capacity(survivors.len());
        for survivor in survivors {
            match occupancy.size_of(&survivor.key) {
                Some(size) => candidates.push(Candidate {
                    key: survivor.key.clone(),
                    last_accessed_at: survivor.last_accessed_at,
                    size,
                }),
                None => {
                    tracing::debug!("Survivor '{}' has no blob in the inventory", survivor.key);
                    report.orphans.push(survivor.key.clone());
                }
            }
        }

        let mut total = occupancy.total_bytes;
        report.occupancy_before = Some(total);

        if total > budget {
            candidates.sort_by(|a, b| {
                a.last_accessed_at
                    .cmp(&b.last_accessed_at)
                    .then_with(|| a.key.cmp(&b.key))
            });
            total = self
                .evict(VecDeque::from(candidates), total, budget, deadline, &mut report)
                .await;
        }

        report.occupancy_after = Some(total);
        report.over_budget = total > budget && report.deferred.is_empty();
        if report.over_budget {
            tracing::warn!(
                "Still over budget after eviction: {} > {} byte(s), no candidates left",
                total,
                budget
            );
        }

        tracing::info!(
            "Size eviction: {} -> {} byte(s) (budget {}), evicted {}, failures {}",
            occupancy.total_bytes,
            total,
            budget,
            report.evicted.len(),
            report.failures.len()
        );
        report
    }

    /// Delete candidates in LRU order, one wave at a time, until under budget
    async fn evict(
        &self,
        mut queue: VecDeque<Candidate>,
        mut total: u64,
        budget: u64,
        deadline: &Deadline,
        report: &mut EvictionReport,
    ) -> u64 {
        while total > budget && !queue.is_empty() {
            if deadline.expired() {
                report
                    .deferred
                    .extend(queue.drain(..).map(|candidate| candidate.key));
                break;
            }

            let wave = next_wave(&mut queue, total - budget, self.concurrency);
            let results: Vec<(Candidate, Removal)> = stream::iter(wave)
                .map(|candidate| async move {
                    let removal = remove_entry(
                        self.blobs.as_ref(),
                        &self.tracker,
                        &candidate.key,
                        deadline,
                    )
                    .await;
                    (candidate, removal)
                }
                .boxed())
                .buffered(self.concurrency)
                .collect()
                .await;

            for (candidate, removal) in results {
                match removal {
                    Removal::Removed => {
                        tracing::debug!(
                            "Evicted '{}' ({} byte(s), last access {})",
                            candidate.key,
                            candidate.size,
                            candidate.last_accessed_at
                        );
                        total = total.saturating_sub(candidate.size);
                        report.evicted.push(candidate.key);
                    }
                    Removal::Failed(failure) => report.failures.push(failure),
                    Removal::Deferred => report.deferred.push(candidate.key),
                }
            }
        }
        total
    }
}

/// Shortest LRU prefix whose sizes cover `excess`, capped at `limit` keys
fn next_wave(queue: &mut VecDeque<Candidate>, excess: u64, limit: usize) -> Vec<Candidate> {
    let mut planned = 0u64;
    let mut wave = Vec::new();
    while planned < excess && wave.len() < limit {
        let Some(candidate) = queue.pop_front() else {
            break;
        };
        planned = planned.saturating_add(candidate.size);
        wave.push(candidate);
    }
    wave
}
