use async_trait::async_trait;
use bytes::Bytes;
use keeper::domain::{BlobListing, BlobMetadata, BlobObject, ByteRange, Page, StoredBlob};
use keeper::ports::{BlobStore, IndexStore};
use serde::{Deserialize, Serialize};
use shared::{Error, Result};
use sled::transaction::{ConflictableTransactionResult, TransactionResult};
use sled::{IVec, Transactional};
use std::ops::Bound;
use std::path::Path;

const BLOBS_TREE: &str = "blobs";
const BLOB_META_TREE: &str = "blob_meta";
const INDEX_TREE: &str = "index";

/// Open (or create) the sled database backing both stores.
/// Creates the parent directory if it doesn't exist.
pub fn open_db(path: impl AsRef<Path>) -> Result<sled::Db> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Internal(format!("Failed to create directory: {}", e)))?;
    }

    sled::open(path).map_err(|e| Error::Internal(format!("Failed to open Sled database: {}", e)))
}

/// Per-blob record kept next to the body
#[derive(Debug, Serialize, Deserialize)]
struct BlobRecord {
    metadata: BlobMetadata,
    etag: String,
    size: u64,
    uploaded_at: i64,
}

/// Collect one page from an ordered sled iterator
fn collect_page<T>(
    iter: impl Iterator<Item = sled::Result<(IVec, IVec)>>,
    page_size: usize,
    mut item: impl FnMut(String, IVec) -> Result<T>,
    on_error: impl Fn(sled::Error) -> Error,
) -> Result<Page<T>> {
    let mut items = Vec::new();
    let mut last_key = None;
    let mut more = false;

    for entry in iter {
        let (key, value) = entry.map_err(&on_error)?;
        if items.len() == page_size {
            more = true;
            break;
        }
        let key = String::from_utf8_lossy(&key).into_owned();
        last_key = Some(key.clone());
        items.push(item(key, value)?);
    }

    Ok(Page {
        items,
        cursor: if more { last_key } else { None },
    })
}

fn after(cursor: Option<&str>) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    match cursor {
        Some(cursor) => (Bound::Excluded(cursor.as_bytes().to_vec()), Bound::Unbounded),
        None => (Bound::Unbounded, Bound::Unbounded),
    }
}

/// Blob store on two sled trees: bodies in `blobs`, records in `blob_meta`
pub struct SledBlobStore {
    blobs: sled::Tree,
    records: sled::Tree,
    page_size: usize,
}

impl SledBlobStore {
    pub fn open(db: &sled::Db, page_size: usize) -> Result<Self> {
        let open_tree = |name: &str| {
            db.open_tree(name)
                .map_err(|e| Error::Internal(format!("Failed to open tree '{}': {}", name, e)))
        };
        Ok(Self {
            blobs: open_tree(BLOBS_TREE)?,
            records: open_tree(BLOB_META_TREE)?,
            page_size: page_size.max(1),
        })
    }

    fn record(&self, key: &str) -> Result<Option<BlobRecord>> {
        let Some(raw) = self
            .records
            .get(key.as_bytes())
            .map_err(|e| Error::blob("get", key, e))?
        else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| Error::blob("decode", key, e))
    }
}

#[async_trait]
impl BlobStore for SledBlobStore {
    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<Option<BlobObject>> {
        let Some(record) = self.record(key)? else {
            return Ok(None);
        };
        let Some(body) = self
            .blobs
            .get(key.as_bytes())
            .map_err(|e| Error::blob("get", key, e))?
        else {
            return Ok(None);
        };

        let size = body.len() as u64;
        let range = range.map(|r| r.resolve(size)).transpose()?;
        let body = match range {
            Some(r) => {
                Bytes::copy_from_slice(&body[r.offset as usize..(r.offset + r.length) as usize])
            }
            None => Bytes::copy_from_slice(&body),
        };

        Ok(Some(BlobObject {
            key: key.to_string(),
            body,
            metadata: record.metadata,
            etag: record.etag,
            size,
            range,
        }))
    }

    async fn put(&self, key: &str, body: Bytes, metadata: BlobMetadata) -> Result<StoredBlob> {
        let record = BlobRecord {
            metadata,
            etag: crate::new_etag(),
            size: body.len() as u64,
            uploaded_at: chrono::Utc::now().timestamp_millis(),
        };
        let encoded = serde_json::to_vec(&record).map_err(|e| Error::blob("encode", key, e))?;

        let written: TransactionResult<(), sled::Error> = (&self.blobs, &self.records)
            .transaction(|(blobs, records)| -> ConflictableTransactionResult<(), sled::Error> {
                blobs.insert(key.as_bytes(), body.as_ref())?;
                records.insert(key.as_bytes(), encoded.as_slice())?;
                Ok(())
            });
        written.map_err(|e| Error::blob("put", key, e))?;

        tracing::debug!("Wrote blob '{}' ({} byte(s)) to sled", key, record.size);
        Ok(StoredBlob {
            key: key.to_string(),
            size: record.size,
            etag: record.etag,
            uploaded_at: record.uploaded_at,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let removed: TransactionResult<(), sled::Error> = (&self.blobs, &self.records)
            .transaction(|(blobs, records)| -> ConflictableTransactionResult<(), sled::Error> {
                blobs.remove(key.as_bytes())?;
                records.remove(key.as_bytes())?;
                Ok(())
            });
        removed.map_err(|e| Error::blob("delete", key, e))
    }

    async fn list(&self, cursor: Option<String>) -> Result<Page<BlobListing>> {
        let target = cursor.clone().unwrap_or_default();
        collect_page(
            self.records.range(after(cursor.as_deref())),
            self.page_size,
            |key, raw| {
                let record: BlobRecord =
                    serde_json::from_slice(&raw).map_err(|e| Error::blob("decode", &key, e))?;
                Ok(BlobListing {
                    key,
                    size: record.size,
                })
            },
            |e| Error::blob("list", target.clone(), e),
        )
    }
}

/// Index store on the sled tree `index`
pub struct SledIndexStore {
    entries: sled::Tree,
    page_size: usize,
}

impl SledIndexStore {
    pub fn open(db: &sled::Db, page_size: usize) -> Result<Self> {
        let entries = db
            .open_tree(INDEX_TREE)
            .map_err(|e| Error::Internal(format!("Failed to open tree '{}': {}", INDEX_TREE, e)))?;
        Ok(Self {
            entries,
            page_size: page_size.max(1),
        })
    }
}

#[async_trait]
impl IndexStore for SledIndexStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .entries
            .get(key.as_bytes())
            .map_err(|e| Error::index("get", key, e))?;
        Ok(value.map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.entries
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| Error::index("put", key, e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries
            .remove(key.as_bytes())
            .map_err(|e| Error::index("delete", key, e))?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str, cursor: Option<String>) -> Result<Page<String>> {
        let on_error = |e: sled::Error| Error::index("list", prefix, e);
        match cursor {
            Some(cursor) => collect_page(
                self.entries
                    .range(after(Some(&cursor)))
                    .take_while(|entry| match entry {
                        Ok((key, _)) => key.starts_with(prefix.as_bytes()),
                        Err(_) => true,
                    }),
                self.page_size,
                |key, _| Ok(key),
                on_error,
            ),
            None => collect_page(
                self.entries.scan_prefix(prefix.as_bytes()),
                self.page_size,
                |key, _| Ok(key),
                on_error,
            ),
        }
    }
}
