// shared/src/lib.rs

use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not found")]
    NotFound,
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("unsatisfiable range: {0}")]
    InvalidRange(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{store} store failed to {op} '{target}': {message}")]
    Store {
        store: StoreKind,
        op: &'static str,
        target: String,
        message: String,
    },
    #[error("configuration: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// Failure of a single blob store call against `target` (a key, or a cursor for listings)
    pub fn blob(op: &'static str, target: impl Into<String>, err: impl fmt::Display) -> Self {
        Error::Store {
            store: StoreKind::Blob,
            op,
            target: target.into(),
            message: err.to_string(),
        }
    }

    /// Failure of a single index store call
    pub fn index(op: &'static str, target: impl Into<String>, err: impl fmt::Display) -> Self {
        Error::Store {
            store: StoreKind::Index,
            op,
            target: target.into(),
            message: err.to_string(),
        }
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Error::Store { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Blob,
    Index,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Blob => f.write_str("blob"),
            StoreKind::Index => f.write_str("index"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod config;
