use crate::domain::{BlobMetadata, BlobObject, ByteRange, StoredBlob};
use async_trait::async_trait;
use bytes::Bytes;
use shared::Result;

/// Application-level object operations behind the HTTP surface
#[async_trait]
pub trait ObjectOperations: Send + Sync + 'static {
    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<Option<BlobObject>>;

    async fn put(&self, key: &str, body: Bytes, metadata: BlobMetadata) -> Result<StoredBlob>;
}
