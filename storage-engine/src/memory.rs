use async_trait::async_trait;
use bytes::Bytes;
use keeper::domain::{BlobListing, BlobMetadata, BlobObject, ByteRange, Page, StoredBlob};
use keeper::ports::{BlobStore, IndexStore};
use parking_lot::RwLock;
use shared::Result;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Up to `page_size` entries with keys starting with `prefix`, after `cursor`
pub(crate) fn page_of<V, T>(
    map: &BTreeMap<String, V>,
    prefix: &str,
    cursor: Option<&str>,
    page_size: usize,
    item: impl Fn(&str, &V) -> T,
) -> Page<T> {
    let lower = match cursor {
        Some(cursor) if cursor >= prefix => Bound::Excluded(cursor.to_string()),
        _ => Bound::Included(prefix.to_string()),
    };
    let mut matching = map
        .range((lower, Bound::Unbounded))
        .take_while(|(k, _)| k.starts_with(prefix));

    let items: Vec<(String, T)> = matching
        .by_ref()
        .take(page_size)
        .map(|(k, v)| (k.clone(), item(k, v)))
        .collect();
    let more = matching.next().is_some();

    let cursor = if more {
        items.last().map(|(k, _)| k.clone())
    } else {
        None
    };
    Page {
        items: items.into_iter().map(|(_, t)| t).collect(),
        cursor,
    }
}

struct MemoryBlob {
    body: Bytes,
    metadata: BlobMetadata,
    etag: String,
    uploaded_at: i64,
}

/// Blob store held in an ordered in-process map; contents die with the process
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, MemoryBlob>>,
    page_size: usize,
}

impl MemoryBlobStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<Option<BlobObject>> {
        let blobs = self.blobs.read();
        let Some(blob) = blobs.get(key) else {
            return Ok(None);
        };

        let size = blob.body.len() as u64;
        let range = range.map(|r| r.resolve(size)).transpose()?;
        let body = match range {
            Some(r) => blob
                .body
                .slice(r.offset as usize..(r.offset + r.length) as usize),
            None => blob.body.clone(),
        };

        Ok(Some(BlobObject {
            key: key.to_string(),
            body,
            metadata: blob.metadata.clone(),
            etag: blob.etag.clone(),
            size,
            range,
        }))
    }

    async fn put(&self, key: &str, body: Bytes, metadata: BlobMetadata) -> Result<StoredBlob> {
        let stored = StoredBlob {
            key: key.to_string(),
            size: body.len() as u64,
            etag: crate::new_etag(),
            uploaded_at: chrono::Utc::now().timestamp_millis(),
        };
        self.blobs.write().insert(
            key.to_string(),
            MemoryBlob {
                body,
                metadata,
                etag: stored.etag.clone(),
                uploaded_at: stored.uploaded_at,
            },
        );
        Ok(stored)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs.write().remove(key);
        Ok(())
    }

    async fn list(&self, cursor: Option<String>) -> Result<Page<BlobListing>> {
        let blobs = self.blobs.read();
        Ok(page_of(
            &blobs,
            "",
            cursor.as_deref(),
            self.page_size,
            |key, blob| BlobListing {
                key: key.to_string(),
                size: blob.body.len() as u64,
            },
        ))
    }
}

impl std::fmt::Debug for MemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let blobs = self.blobs.read();
        f.debug_struct("MemoryBlobStore")
            .field("blobs", &blobs.len())
            .field(
                "newest_upload",
                &blobs.values().map(|b| b.uploaded_at).max(),
            )
            .finish()
    }
}

/// Index store held in an ordered in-process map
pub struct MemoryIndexStore {
    entries: RwLock<BTreeMap<String, String>>,
    page_size: usize,
}

impl MemoryIndexStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str, cursor: Option<String>) -> Result<Page<String>> {
        let entries = self.entries.read();
        Ok(page_of(
            &entries,
            prefix,
            cursor.as_deref(),
            self.page_size,
            |key, _| key.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blob_put_get_and_range() {
        let store = MemoryBlobStore::new(10);
        let metadata = BlobMetadata {
            content_type: Some("text/plain".to_string()),
            ..BlobMetadata::default()
        };

        let stored = store
            .put("greeting", Bytes::from_static(b"hello world"), metadata.clone())
            .await
            .unwrap();
        assert_eq!(stored.size, 11);

        let object = store.get("greeting", None).await.unwrap().unwrap();
        assert_eq!(object.body, Bytes::from_static(b"hello world"));
        assert_eq!(object.metadata, metadata);
        assert_eq!(object.etag, stored.etag);

        let object = store
            .get("greeting", Some(ByteRange::Suffix(5)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(object.body, Bytes::from_static(b"world"));
        assert_eq!(object.size, 11);
    }

    #[tokio::test]
    async fn test_overwrite_changes_etag() {
        let store = MemoryBlobStore::new(10);
        let first = store
            .put("k", Bytes::from_static(b"1"), BlobMetadata::default())
            .await
            .unwrap();
        let second = store
            .put("k", Bytes::from_static(b"22"), BlobMetadata::default())
            .await
            .unwrap();

        assert_ne!(first.etag, second.etag);
        assert_eq!(store.get("k", None).await.unwrap().unwrap().size, 2);
    }

    #[tokio::test]
    async fn test_deletes_are_idempotent() {
        let blobs = MemoryBlobStore::new(10);
        let index = MemoryIndexStore::new(10);

        blobs
            .put("k", Bytes::from_static(b"x"), BlobMetadata::default())
            .await
            .unwrap();
        blobs.delete("k").await.unwrap();
        blobs.delete("k").await.unwrap();
        assert!(blobs.get("k", None).await.unwrap().is_none());

        index.delete("never-written").await.unwrap();
    }

    #[tokio::test]
    async fn test_index_listing_respects_prefix_and_cursor() {
        let index = MemoryIndexStore::new(2);
        for key in ["LAST_USED_a", "LAST_USED_b", "LAST_USED_c", "USER_admin", "A"] {
            index.put(key, "1".to_string()).await.unwrap();
        }

        let first = index.list_keys("LAST_USED_", None).await.unwrap();
        assert_eq!(first.items, vec!["LAST_USED_a", "LAST_USED_b"]);
        assert_eq!(first.cursor.as_deref(), Some("LAST_USED_b"));

        let second = index.list_keys("LAST_USED_", first.cursor).await.unwrap();
        assert_eq!(second.items, vec!["LAST_USED_c"]);
        assert_eq!(second.cursor, None);
    }

    #[tokio::test]
    async fn test_blob_listing_pages() {
        let store = MemoryBlobStore::new(2);
        for (key, body) in [("a", "1"), ("b", "22"), ("c", "333")] {
            store
                .put(key, Bytes::from(body), BlobMetadata::default())
                .await
                .unwrap();
        }

        let first = store.list(None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        let second = store.list(first.cursor).await.unwrap();
        assert_eq!(
            second.items,
            vec![BlobListing {
                key: "c".to_string(),
                size: 3
            }]
        );
        assert_eq!(second.cursor, None);
    }
}
