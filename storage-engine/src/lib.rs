pub mod memory;
pub mod sled_store;

pub use memory::{MemoryBlobStore, MemoryIndexStore};
pub use sled_store::{SledBlobStore, SledIndexStore};

use keeper::ports::{StorageFactory, Stores};
use shared::Result;
use shared::config::{Config, StorageBackend};
use std::path::Path;
use std::sync::Arc;

/// File name of the sled database under the data directory
const SLED_DB_NAME: &str = "keeper.sled";

/// Fresh version tag for a blob write
pub(crate) fn new_etag() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Unified factory that builds the blob and index stores for the configured backend
pub struct UnifiedStorageFactory;

impl StorageFactory for UnifiedStorageFactory {
    fn create_from_config(&self, config: &Config) -> Result<Stores> {
        match config.storage {
            StorageBackend::Sled => {
                let path = Path::new(&config.data_dir).join(SLED_DB_NAME);
                tracing::info!("Opening sled stores at {}", path.display());
                let db = sled_store::open_db(&path)?;
                Ok(Stores {
                    blobs: Arc::new(SledBlobStore::open(&db, config.list_page_size)?),
                    index: Arc::new(SledIndexStore::open(&db, config.list_page_size)?),
                })
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory stores, cached objects are lost on restart");
                Ok(Stores {
                    blobs: Arc::new(MemoryBlobStore::new(config.list_page_size)),
                    index: Arc::new(MemoryIndexStore::new(config.list_page_size)),
                })
            }
        }
    }
}
