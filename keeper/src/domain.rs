use bytes::Bytes;
use serde::{Deserialize, Serialize};
use shared::config::ReclamationSettings;
use shared::{Error, Result};
use std::time::Duration;

/// Index-store prefix of last-access timestamps: `LAST_USED_<key>`
pub const TRACKING_PREFIX: &str = "LAST_USED_";

/// Index-store prefix of credential entries: `USER_<username>`
pub const CREDENTIAL_PREFIX: &str = "USER_";

/// Reject keys the gateway cannot address
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}

/// Content headers captured on PUT and replayed on GET
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
    pub expires: Option<String>,
}

/// What the blob store reports back after a write
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    pub key: String,
    pub size: u64,
    pub etag: String,
    pub uploaded_at: i64,
}

/// A blob read back from the store, possibly a byte range of it
#[derive(Clone, Debug)]
pub struct BlobObject {
    pub key: String,
    pub body: Bytes,
    pub metadata: BlobMetadata,
    pub etag: String,
    /// Full size of the stored blob, independent of `range`
    pub size: u64,
    pub range: Option<ResolvedRange>,
}

/// One entry of a blob store listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobListing {
    pub key: String,
    pub size: u64,
}

/// One page of a cursor-paginated listing; `cursor` is None on the last page
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: None,
        }
    }
}

/// Requested byte range, as carried by an HTTP `Range: bytes=` header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteRange {
    /// `first-last`, both inclusive
    Bounded { first: u64, last: u64 },
    /// `first-`
    From(u64),
    /// `-n`: the final n bytes
    Suffix(u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedRange {
    pub offset: u64,
    pub length: u64,
}

impl ResolvedRange {
    /// Inclusive index of the last byte
    pub fn last(&self) -> u64 {
        self.offset + self.length - 1
    }
}

impl ByteRange {
    /// Clamp the range against a blob of `size` bytes
    pub fn resolve(&self, size: u64) -> Result<ResolvedRange> {
        let unsatisfiable = || Error::InvalidRange(format!("{self:?} of {size} bytes"));
        match *self {
            ByteRange::Bounded { first, last } => {
                if first > last || first >= size {
                    return Err(unsatisfiable());
                }
                let last = last.min(size - 1);
                Ok(ResolvedRange {
                    offset: first,
                    length: last - first + 1,
                })
            }
            ByteRange::From(first) => {
                if first >= size {
                    return Err(unsatisfiable());
                }
                Ok(ResolvedRange {
                    offset: first,
                    length: size - first,
                })
            }
            ByteRange::Suffix(n) => {
                if n == 0 || size == 0 {
                    return Err(unsatisfiable());
                }
                let length = n.min(size);
                Ok(ResolvedRange {
                    offset: size - length,
                    length,
                })
            }
        }
    }
}

/// Limits of one reclamation cycle
#[derive(Clone, Debug)]
pub struct ReclamationPolicy {
    pub max_idle_ms: i64,
    pub max_size_bytes: i64,
    pub delete_concurrency: usize,
    pub cycle_timeout: Option<Duration>,
}

impl ReclamationPolicy {
    /// Idle limit, or None when expiration is disabled
    pub fn max_idle(&self) -> Option<i64> {
        (self.max_idle_ms > 0).then_some(self.max_idle_ms)
    }

    /// Occupancy budget, or None when size eviction is disabled
    pub fn size_budget(&self) -> Option<u64> {
        (self.max_size_bytes > 0).then_some(self.max_size_bytes as u64)
    }

    pub fn concurrency(&self) -> usize {
        self.delete_concurrency.max(1)
    }
}

impl Default for ReclamationPolicy {
    fn default() -> Self {
        Self {
            max_idle_ms: 7 * 24 * 60 * 60 * 1000,
            max_size_bytes: 0,
            delete_concurrency: 8,
            cycle_timeout: None,
        }
    }
}

impl From<&ReclamationSettings> for ReclamationPolicy {
    fn from(settings: &ReclamationSettings) -> Self {
        Self {
            max_idle_ms: settings.max_idle_ms,
            max_size_bytes: settings.max_size_bytes,
            delete_concurrency: settings.delete_concurrency,
            cycle_timeout: settings.sweep_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("avatar.png").is_ok());
        assert!(validate_key("nested/path/is/one/key").is_ok());
        assert!(matches!(validate_key(""), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_resolve_ranges() {
        let bounded = ByteRange::Bounded { first: 2, last: 5 };
        assert_eq!(
            bounded.resolve(10).unwrap(),
            ResolvedRange {
                offset: 2,
                length: 4
            }
        );

        // Last byte past the end is clamped
        let clamped = ByteRange::Bounded { first: 8, last: 100 };
        assert_eq!(clamped.resolve(10).unwrap().last(), 9);

        assert_eq!(ByteRange::From(7).resolve(10).unwrap().length, 3);
        assert_eq!(
            ByteRange::Suffix(4).resolve(10).unwrap(),
            ResolvedRange {
                offset: 6,
                length: 4
            }
        );
        assert_eq!(ByteRange::Suffix(40).resolve(10).unwrap().offset, 0);
    }

    #[test]
    fn test_unsatisfiable_ranges() {
        assert!(ByteRange::From(10).resolve(10).is_err());
        assert!(ByteRange::Bounded { first: 5, last: 2 }.resolve(10).is_err());
        assert!(ByteRange::Suffix(0).resolve(10).is_err());
        assert!(ByteRange::Suffix(3).resolve(0).is_err());
    }

    #[test]
    fn test_policy_disabled_values() {
        let policy = ReclamationPolicy {
            max_idle_ms: 0,
            max_size_bytes: -5,
            delete_concurrency: 0,
            cycle_timeout: None,
        };
        assert_eq!(policy.max_idle(), None);
        assert_eq!(policy.size_budget(), None);
        assert_eq!(policy.concurrency(), 1);

        let policy = ReclamationPolicy {
            max_size_bytes: 250,
            ..ReclamationPolicy::default()
        };
        assert_eq!(policy.max_idle(), Some(604_800_000));
        assert_eq!(policy.size_budget(), Some(250));
    }
}
