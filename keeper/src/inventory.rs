use crate::pagination::paginate;
use crate::ports::BlobStore;
use futures::TryStreamExt;
use shared::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Snapshot of the blob store's occupancy
#[derive(Clone, Debug, Default)]
pub struct Occupancy {
    pub total_bytes: u64,
    pub sizes: HashMap<String, u64>,
}

impl Occupancy {
    pub fn size_of(&self, key: &str) -> Option<u64> {
        self.sizes.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

/// Computes occupied bytes by walking the full blob listing
#[derive(Clone)]
pub struct SizeInventory {
    blobs: Arc<dyn BlobStore>,
}

impl SizeInventory {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// One complete snapshot, however many pages the store splits it into.
    /// Fails if any page fails, since a partial total would under-count.
    pub async fn compute_occupancy(&self) -> Result<Occupancy> {
        let blobs = self.blobs.clone();
        let mut listing = paginate(move |cursor| {
            let blobs = blobs.clone();
            async move { blobs.list(cursor).await }
        });

        let mut occupancy = Occupancy::default();
        while let Some(entry) = listing.try_next().await? {
            // A key repeated across pages counts once, with its latest size
            if let Some(previous) = occupancy.sizes.insert(entry.key, entry.size) {
                occupancy.total_bytes -= previous;
            }
            occupancy.total_bytes += entry.size;
        }

        tracing::debug!(
            "Computed occupancy: {} blob(s), {} byte(s)",
            occupancy.len(),
            occupancy.total_bytes
        );
        Ok(occupancy)
    }
}
