use crate::domain::{BlobMetadata, BlobObject, ByteRange, StoredBlob, validate_key};
use crate::planes::data::operation::ObjectOperations;
use crate::ports::{BlobStore, Clock};
use crate::tracker::AccessTracker;
use async_trait::async_trait;
use bytes::Bytes;
use shared::{Error, Result};
use std::sync::Arc;

/// Serves GET/PUT against the blob store and refreshes last-access times.
///
/// Access recording is best-effort: a failed index write is logged and the
/// request still succeeds.
#[derive(Clone)]
pub struct CacheGateway {
    blobs: Arc<dyn BlobStore>,
    tracker: AccessTracker,
    clock: Arc<dyn Clock>,
}

impl CacheGateway {
    pub fn new(blobs: Arc<dyn BlobStore>, tracker: AccessTracker, clock: Arc<dyn Clock>) -> Self {
        Self {
            blobs,
            tracker,
            clock,
        }
    }
}

impl std::fmt::Debug for CacheGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheGateway").finish_non_exhaustive()
    }
}

#[async_trait]
impl ObjectOperations for CacheGateway {
    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<Option<BlobObject>> {
        validate_key(key)?;

        let object = self.blobs.get(key, range).await?;
        match &object {
            Some(object) => {
                tracing::debug!("Cache hit for '{}' ({} byte(s))", key, object.body.len());
                self.tracker.record_access(key, self.clock.now_ms()).await;
            }
            None => tracing::debug!("Cache miss for '{}'", key),
        }
        Ok(object)
    }

    async fn put(&self, key: &str, body: Bytes, metadata: BlobMetadata) -> Result<StoredBlob> {
        validate_key(key)?;
        if body.is_empty() {
            return Err(Error::InvalidRequest(
                "request body must not be empty".to_string(),
            ));
        }

        // Blob first: a tracking entry never points at a blob that was not written
        let stored = self.blobs.put(key, body, metadata).await?;
        self.tracker.record_access(key, self.clock.now_ms()).await;

        tracing::debug!("Stored '{}' ({} byte(s), etag {})", key, stored.size, stored.etag);
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBlobStore, FakeIndexStore, ManualClock};

    struct Fixture {
        blobs: Arc<FakeBlobStore>,
        index: Arc<FakeIndexStore>,
        clock: Arc<ManualClock>,
        gateway: CacheGateway,
    }

    fn fixture() -> Fixture {
        let blobs = Arc::new(FakeBlobStore::new());
        let index = Arc::new(FakeIndexStore::new());
        let clock = Arc::new(ManualClock::at(1_000));
        let gateway = CacheGateway::new(
            blobs.clone(),
            AccessTracker::new(index.clone()),
            clock.clone(),
        );
        Fixture {
            blobs,
            index,
            clock,
            gateway,
        }
    }

    #[tokio::test]
    async fn test_put_writes_blob_then_tracks_access() {
        let fx = fixture();

        let stored = fx
            .gateway
            .put("img/logo.png", Bytes::from_static(b"png"), BlobMetadata::default())
            .await
            .unwrap();

        assert_eq!(stored.size, 3);
        assert!(fx.blobs.contains("img/logo.png"));
        assert_eq!(
            fx.index.value("LAST_USED_img/logo.png").as_deref(),
            Some("1000")
        );
    }

    #[tokio::test]
    async fn test_get_hit_refreshes_last_access() {
        let fx = fixture();
        fx.blobs.insert("a", 4);
        fx.index.insert("LAST_USED_a", "1");
        fx.clock.set(5_000);

        let object = fx.gateway.get("a", None).await.unwrap().unwrap();

        assert_eq!(object.body.len(), 4);
        assert_eq!(fx.index.value("LAST_USED_a").as_deref(), Some("5000"));
    }

    #[tokio::test]
    async fn test_get_miss_does_not_track() {
        let fx = fixture();

        assert!(fx.gateway.get("missing", None).await.unwrap().is_none());
        assert!(fx.index.keys().is_empty());
    }

    #[tokio::test]
    async fn test_ranged_get_returns_slice() {
        let fx = fixture();
        fx.blobs.insert("a", 10);

        let object = fx
            .gateway
            .get("a", Some(ByteRange::Bounded { first: 2, last: 4 }))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(object.body.len(), 3);
        assert_eq!(object.size, 10);

        let result = fx.gateway.get("a", Some(ByteRange::From(10))).await;
        assert!(matches!(result, Err(Error::InvalidRange(_))));
    }

    #[tokio::test]
    async fn test_tracking_failure_does_not_fail_request() {
        let fx = fixture();
        fx.index.fail_puts(true);

        let result = fx
            .gateway
            .put("a", Bytes::from_static(b"x"), BlobMetadata::default())
            .await;

        assert!(result.is_ok());
        assert!(fx.blobs.contains("a"));
        assert!(fx.index.keys().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_empty_key_and_body() {
        let fx = fixture();

        let result = fx.gateway.get("", None).await;
        assert!(matches!(result, Err(Error::InvalidKey(_))));

        let result = fx
            .gateway
            .put("a", Bytes::new(), BlobMetadata::default())
            .await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
        assert!(!fx.blobs.contains("a"));
    }
}
