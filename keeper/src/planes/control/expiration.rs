use super::error::ReclamationError;
use super::report::{Anomaly, ExpirationReport, Failure, PolicyState, Stage, Survivor};
use super::{Deadline, Removal, remove_entry};
use crate::domain::{ReclamationPolicy, TRACKING_PREFIX};
use crate::ports::BlobStore;
use crate::tracker::{AccessTracker, LastAccess, Tracked};
use futures::{FutureExt, StreamExt};
use shared::{Error, Result};
use std::sync::Arc;

enum Step {
    Survived(Survivor, Option<Anomaly>),
    Expired {
        key: String,
        anomaly: Option<Anomaly>,
        removal: Removal,
    },
    Unreadable(Failure),
    ListingFailed(Error),
}

/// Deletes every tracked key idle for longer than the configured limit
pub struct ExpirationSweep {
    blobs: Arc<dyn BlobStore>,
    tracker: AccessTracker,
    max_idle: Option<i64>,
    concurrency: usize,
}

impl ExpirationSweep {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        tracker: AccessTracker,
        policy: &ReclamationPolicy,
    ) -> Self {
        Self {
            blobs,
            tracker,
            max_idle: policy.max_idle(),
            concurrency: policy.concurrency(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_idle.is_some()
    }

    /// Whether a key last accessed at `last_access` has expired at `now`
    pub fn is_expired(&self, last_access: &LastAccess, now: i64) -> bool {
        let Some(max_idle) = self.max_idle else {
            return false;
        };
        match last_access {
            LastAccess::At(at) => now.saturating_sub(*at) > max_idle,
            LastAccess::Unparsable(_) => true,
        }
    }

    /// Walk every tracked key once, deleting the expired ones.
    ///
    /// Returns the survivors with the timestamps read, for size eviction.
    /// Fails only when the very first listing page cannot be fetched.
    pub async fn run(
        &self,
        now: i64,
        deadline: &Deadline,
    ) -> std::result::Result<ExpirationReport, ReclamationError> {
        let state = if self.is_enabled() {
            PolicyState::Ran
        } else {
            PolicyState::Disabled
        };
        let mut report = ExpirationReport::new(state);

        let steps = self
            .tracker
            .list_tracked(TRACKING_PREFIX)
            .map(|item| self.step(item, now, deadline).boxed())
            .buffered(self.concurrency);
        let mut steps = std::pin::pin!(steps);

        let mut seen_any = false;
        while let Some(step) = steps.next().await {
            match step {
                Step::ListingFailed(error) if !seen_any => {
                    return Err(ReclamationError::CycleFatal(error));
                }
                Step::ListingFailed(error) => {
                    tracing::warn!("Tracked key listing ended early: {}", error);
                    report
                        .failures
                        .push(Failure::listing(Stage::ListTracked, error));
                }
                Step::Unreadable(failure) => {
                    seen_any = true;
                    report.failures.push(failure);
                }
                Step::Survived(survivor, anomaly) => {
                    seen_any = true;
                    report.scanned += 1;
                    report.anomalies.extend(anomaly);
                    report.survivors.push(survivor);
                }
                Step::Expired {
                    key,
                    anomaly,
                    removal,
                } => {
                    seen_any = true;
                    report.scanned += 1;
                    report.anomalies.extend(anomaly);
                    match removal {
                        Removal::Removed => report.expired.push(key),
                        Removal::Failed(failure) => report.failures.push(failure),
                        Removal::Deferred => report.deferred.push(key),
                    }
                }
            }
        }

        tracing::info!(
            "Expiration sweep: scanned {}, expired {}, survivors {}, deferred {}, failures {}",
            report.scanned,
            report.expired.len(),
            report.survivors.len(),
            report.deferred.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn step(&self, item: Result<Tracked>, now: i64, deadline: &Deadline) -> Step {
        let entry = match item {
            Ok(Tracked::Entry(entry)) => entry,
            Ok(Tracked::Unreadable { key, error }) => {
                tracing::warn!("Skipping '{}' this cycle, timestamp unreadable: {}", key, error);
                return Step::Unreadable(Failure::for_key(key, Stage::ReadTimestamp, error));
            }
            Err(error) => return Step::ListingFailed(error),
        };

        let anomaly = match &entry.last_access {
            LastAccess::Unparsable(raw) => {
                tracing::warn!("Unparsable timestamp '{}' for key '{}'", raw, entry.key);
                Some(Anomaly::UnparsableTimestamp {
                    key: entry.key.clone(),
                    raw: raw.clone(),
                })
            }
            LastAccess::At(_) => None,
        };

        if self.is_expired(&entry.last_access, now) {
            tracing::debug!("Key '{}' expired", entry.key);
            let removal =
                remove_entry(self.blobs.as_ref(), &self.tracker, &entry.key, deadline).await;
            return Step::Expired {
                key: entry.key,
                anomaly,
                removal,
            };
        }

        let last_accessed_at = entry.last_access.millis().unwrap_or(i64::MIN);
        Step::Survived(
            Survivor {
                key: entry.key,
                last_accessed_at,
            },
            anomaly,
        )
    }
}
