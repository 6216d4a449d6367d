//! In-memory store fakes with failure injection for unit tests.

use crate::domain::{BlobListing, BlobMetadata, BlobObject, ByteRange, Page, StoredBlob};
use crate::ports::{BlobStore, Clock, IndexStore};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use shared::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

const DEFAULT_PAGE_SIZE: usize = 1000;

fn page_after<V, T>(
    map: &BTreeMap<String, V>,
    cursor: Option<String>,
    page_size: usize,
    accept: impl Fn(&str) -> bool,
    item: impl Fn(&String, &V) -> T,
) -> Page<T> {
    let lower = match &cursor {
        Some(cursor) => Bound::Excluded(cursor.clone()),
        None => Bound::Unbounded,
    };
    let mut matching = map
        .range((lower, Bound::Unbounded))
        .filter(|(k, _)| accept(k));

    let mut items = Vec::new();
    let mut last_key = None;
    for (k, v) in matching.by_ref().take(page_size) {
        items.push(item(k, v));
        last_key = Some(k.clone());
    }
    let more = matching.next().is_some();

    Page {
        items,
        cursor: if more { last_key } else { None },
    }
}

#[derive(Default)]
pub struct FakeIndexStore {
    entries: Mutex<BTreeMap<String, String>>,
    page_size: usize,
    fail_puts: AtomicBool,
    fail_listing: AtomicBool,
    failing_gets: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
}

impl FakeIndexStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_get(&self, key: &str) {
        self.failing_gets.lock().insert(key.to_string());
    }

    pub fn fail_delete(&self, key: &str) {
        self.failing_deletes.lock().insert(key.to_string());
    }
}

#[async_trait]
impl IndexStore for FakeIndexStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.failing_gets.lock().contains(key) {
            return Err(Error::index("get", key, "injected failure"));
        }
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::index("put", key, "injected failure"));
        }
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.failing_deletes.lock().contains(key) {
            return Err(Error::index("delete", key, "injected failure"));
        }
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str, cursor: Option<String>) -> Result<Page<String>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::index("list", prefix, "injected failure"));
        }
        let entries = self.entries.lock();
        Ok(page_after(
            &entries,
            cursor,
            self.page_size,
            |k| k.starts_with(prefix),
            |k, _| k.clone(),
        ))
    }
}

#[derive(Default)]
pub struct FakeBlobStore {
    blobs: Mutex<BTreeMap<String, Bytes>>,
    page_size: usize,
    fail_listing: AtomicBool,
    failing_deletes: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeBlobStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    /// Store a zero-filled blob of `size` bytes
    pub fn insert(&self, key: &str, size: usize) {
        self.blobs
            .lock()
            .insert(key.to_string(), Bytes::from(vec![0u8; size]));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.lock().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.blobs.lock().keys().cloned().collect()
    }

    /// Keys removed by successful deletes, in call order
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, key: &str) {
        self.failing_deletes.lock().insert(key.to_string());
    }

    pub fn heal_delete(&self, key: &str) {
        self.failing_deletes.lock().remove(key);
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<Option<BlobObject>> {
        let Some(body) = self.blobs.lock().get(key).cloned() else {
            return Ok(None);
        };
        let size = body.len() as u64;
        let range = range.map(|r| r.resolve(size)).transpose()?;
        let body = match range {
            Some(r) => body.slice(r.offset as usize..(r.offset + r.length) as usize),
            None => body,
        };
        Ok(Some(BlobObject {
            key: key.to_string(),
            body,
            metadata: BlobMetadata::default(),
            etag: format!("etag-{key}"),
            size,
            range,
        }))
    }

    async fn put(&self, key: &str, body: Bytes, _metadata: BlobMetadata) -> Result<StoredBlob> {
        let size = body.len() as u64;
        self.blobs.lock().insert(key.to_string(), body);
        Ok(StoredBlob {
            key: key.to_string(),
            size,
            etag: format!("etag-{key}"),
            uploaded_at: 0,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.failing_deletes.lock().contains(key) {
            return Err(Error::blob("delete", key, "injected failure"));
        }
        self.blobs.lock().remove(key);
        self.deleted.lock().push(key.to_string());
        Ok(())
    }

    async fn list(&self, cursor: Option<String>) -> Result<Page<BlobListing>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::blob("list", cursor.unwrap_or_default(), "injected failure"));
        }
        let blobs = self.blobs.lock();
        Ok(page_after(
            &blobs,
            cursor,
            self.page_size,
            |_| true,
            |k, body| BlobListing {
                key: k.clone(),
                size: body.len() as u64,
            },
        ))
    }
}

pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn at(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}
