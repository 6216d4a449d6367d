use crate::domain::TRACKING_PREFIX;
use crate::pagination::paginate;
use crate::ports::IndexStore;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use shared::{Error, Result};
use std::sync::Arc;

/// Last-access timestamp as read back from the index store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LastAccess {
    At(i64),
    /// Stored value is not an integer; the key is treated as stale
    Unparsable(String),
}

impl LastAccess {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(millis) => LastAccess::At(millis),
            Err(_) => LastAccess::Unparsable(raw.to_string()),
        }
    }

    pub fn millis(&self) -> Option<i64> {
        match self {
            LastAccess::At(millis) => Some(*millis),
            LastAccess::Unparsable(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedEntry {
    pub key: String,
    pub last_access: LastAccess,
}

/// One item of a tracked-key listing
#[derive(Debug)]
pub enum Tracked {
    Entry(TrackedEntry),
    /// Listed, but reading its timestamp failed
    Unreadable { key: String, error: Error },
}

/// Records and lists per-key last-access times in the index store
#[derive(Clone)]
pub struct AccessTracker {
    index: Arc<dyn IndexStore>,
}

impl AccessTracker {
    pub fn new(index: Arc<dyn IndexStore>) -> Self {
        Self { index }
    }

    /// Index-store key holding the timestamp of `key`
    pub fn tracking_key(key: &str) -> String {
        format!("{TRACKING_PREFIX}{key}")
    }

    /// Object key of a tracking entry; None for keys outside the convention
    pub fn object_key(tracking_key: &str) -> Option<&str> {
        tracking_key.strip_prefix(TRACKING_PREFIX)
    }

    /// Set `lastAccessedAt[key] = now`, surfacing store failures
    pub async fn try_record_access(&self, key: &str, now: i64) -> Result<()> {
        self.index
            .put(&Self::tracking_key(key), now.to_string())
            .await
    }

    /// Best-effort variant used on the request path: a failure is logged, never returned
    pub async fn record_access(&self, key: &str, now: i64) {
        if let Err(e) = self.try_record_access(key, now).await {
            tracing::warn!("Failed to record access for key '{}': {}", key, e);
        }
    }

    pub async fn last_access(&self, key: &str) -> Result<Option<LastAccess>> {
        let raw = self.index.get(&Self::tracking_key(key)).await?;
        Ok(raw.as_deref().map(LastAccess::parse))
    }

    /// Lazily list every tracked key under `prefix` with its timestamp.
    ///
    /// Entries deleted between the listing and the read are skipped. A failed
    /// page fetch is yielded as `Err` and ends the stream.
    pub fn list_tracked(&self, prefix: &str) -> BoxStream<'static, Result<Tracked>> {
        let prefix: Arc<str> = Arc::from(prefix);

        let keys = {
            let index = self.index.clone();
            let prefix = prefix.clone();
            paginate(move |cursor| {
                let index = index.clone();
                let prefix = prefix.clone();
                async move { index.list_keys(&prefix, cursor).await }
            })
        };

        let index = self.index.clone();
        keys.try_filter_map(move |tracking_key| {
            let index = index.clone();
            let prefix = prefix.clone();
            async move {
                let key = tracking_key
                    .strip_prefix(prefix.as_ref())
                    .unwrap_or(&tracking_key)
                    .to_string();

                match index.get(&tracking_key).await {
                    Ok(Some(raw)) => Ok(Some(Tracked::Entry(TrackedEntry {
                        key,
                        last_access: LastAccess::parse(&raw),
                    }))),
                    Ok(None) => Ok(None),
                    Err(error) => Ok(Some(Tracked::Unreadable { key, error })),
                }
            }
        })
        .boxed()
    }

    /// Forget the timestamp of `key`; forgetting an untracked key succeeds
    pub async fn delete_tracked(&self, key: &str) -> Result<()> {
        self.index.delete(&Self::tracking_key(key)).await
    }
}
