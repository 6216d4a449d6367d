#![deny(clippy::all)]

use crate::domain::{BlobListing, BlobMetadata, BlobObject, ByteRange, Page, StoredBlob};
use async_trait::async_trait;
use bytes::Bytes;
use shared::Result;
use shared::config::Config;
use std::sync::Arc;

// Ports are the pluggable extension points for the stores behind the cache

/// Byte-object storage addressed by key
///
/// Every call is atomic for its single key. Nothing is transactional across
/// keys, or across this store and the [`IndexStore`].
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Read a blob, or the requested byte range of it; None when absent
    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<Option<BlobObject>>;

    /// Write (or overwrite) a blob with its content headers
    async fn put(&self, key: &str, body: Bytes, metadata: BlobMetadata) -> Result<StoredBlob>;

    /// Remove a blob; removing an absent key succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    /// One page of `(key, size)` pairs, starting after `cursor`
    async fn list(&self, cursor: Option<String>) -> Result<Page<BlobListing>>;
}

/// Lightweight string key-value store
#[async_trait]
pub trait IndexStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: String) -> Result<()>;

    /// Remove an entry; removing an absent key succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    /// One page of keys starting with `prefix`, in key order, after `cursor`
    async fn list_keys(&self, prefix: &str, cursor: Option<String>) -> Result<Page<String>>;
}

/// Directory consulted by the gateway's credential check
#[async_trait]
pub trait CredentialDirectory: Send + Sync + 'static {
    /// Stored secret for `username`: a plaintext password or an argon2 PHC hash
    async fn lookup_password(&self, username: &str) -> Result<Option<String>>;
}

/// Source of "now" for the hot path
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Both stores the cache runs on
#[derive(Clone)]
pub struct Stores {
    pub blobs: Arc<dyn BlobStore>,
    pub index: Arc<dyn IndexStore>,
}

/// Port for creating the stores from configuration
/// This allows different storage backends to be plugged in
pub trait StorageFactory: Send + Sync + 'static {
    fn create_from_config(&self, config: &Config) -> Result<Stores>;
}
