//! Control plane: the reclamation engine.
//!
//! A cycle runs [`ExpirationSweep`] and then, on its survivors only,
//! [`SizeBoundEvictor`]. Removing an entry always deletes the blob first and
//! the tracking entry second, so a failure in between leaves the pair for
//! the next cycle instead of an untracked blob.

pub mod coordinator;
pub mod error;
pub mod eviction;
pub mod expiration;
pub mod report;

pub use coordinator::ReclamationCoordinator;
pub use error::ReclamationError;
pub use eviction::SizeBoundEvictor;
pub use expiration::ExpirationSweep;
pub use report::{
    Anomaly, CycleOutcome, CycleReport, EvictionReport, ExpirationReport, Failure, PolicyState,
    Stage, Survivor,
};

use crate::ports::BlobStore;
use crate::tracker::AccessTracker;
use std::time::Duration;
use tokio::time::Instant;

/// Point after which a cycle starts no new deletions
#[derive(Clone, Copy, Debug, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    pub fn expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }
}

pub(crate) enum Removal {
    Removed,
    Failed(Failure),
    /// Not attempted: the deadline had passed
    Deferred,
}

/// Delete the blob of `key`, then its tracking entry.
///
/// The tracking entry stays when the blob delete fails, so both are retried
/// together next cycle.
pub(crate) async fn remove_entry(
    blobs: &dyn BlobStore,
    tracker: &AccessTracker,
    key: &str,
    deadline: &Deadline,
) -> Removal {
    if deadline.expired() {
        return Removal::Deferred;
    }

    if let Err(error) = blobs.delete(key).await {
        tracing::warn!("Failed to delete blob '{}': {}", key, error);
        return Removal::Failed(Failure::for_key(key, Stage::DeleteBlob, error));
    }

    if let Err(error) = tracker.delete_tracked(key).await {
        tracing::warn!(
            "Deleted blob '{}' but failed to delete its tracking entry: {}",
            key,
            error
        );
        return Removal::Failed(Failure::for_key(key, Stage::DeleteIndex, error));
    }

    tracing::debug!("Removed cache entry '{}'", key);
    Removal::Removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBlobStore, FakeIndexStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_remove_entry_deletes_both_stores() {
        let blobs = FakeBlobStore::new();
        let index = Arc::new(FakeIndexStore::new());
        blobs.insert("a", 10);
        index.insert("LAST_USED_a", "1");
        let tracker = AccessTracker::new(index.clone());

        let removal = remove_entry(&blobs, &tracker, "a", &Deadline::none()).await;
        assert!(matches!(removal, Removal::Removed));
        assert!(!blobs.contains("a"));
        assert_eq!(index.value("LAST_USED_a"), None);
    }

    #[tokio::test]
    async fn test_remove_absent_entry_succeeds() {
        let blobs = FakeBlobStore::new();
        let index = Arc::new(FakeIndexStore::new());
        let tracker = AccessTracker::new(index);

        let removal = remove_entry(&blobs, &tracker, "ghost", &Deadline::none()).await;
        assert!(matches!(removal, Removal::Removed));
    }

    #[tokio::test]
    async fn test_blob_failure_keeps_tracking_entry() {
        let blobs = FakeBlobStore::new();
        let index = Arc::new(FakeIndexStore::new());
        blobs.insert("a", 10);
        blobs.fail_delete("a");
        index.insert("LAST_USED_a", "1");
        let tracker = AccessTracker::new(index.clone());

        let removal = remove_entry(&blobs, &tracker, "a", &Deadline::none()).await;
        match removal {
            Removal::Failed(failure) => assert_eq!(failure.stage, Stage::DeleteBlob),
            _ => panic!("expected a blob failure"),
        }
        assert!(blobs.contains("a"));
        assert_eq!(index.value("LAST_USED_a").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_expired_deadline_defers_removal() {
        let blobs = FakeBlobStore::new();
        let index = Arc::new(FakeIndexStore::new());
        blobs.insert("a", 10);
        let tracker = AccessTracker::new(index);

        let deadline = Deadline::at(Instant::now());
        assert!(deadline.expired());
        assert!(!Deadline::none().expired());

        let removal = remove_entry(&blobs, &tracker, "a", &deadline).await;
        assert!(matches!(removal, Removal::Deferred));
        assert!(blobs.contains("a"));
    }
}
