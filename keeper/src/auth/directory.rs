use super::error::AuthError;
use super::password::hash_password;
use crate::domain::CREDENTIAL_PREFIX;
use crate::ports::{CredentialDirectory, IndexStore};
use async_trait::async_trait;
use moka::future::Cache;
use shared::Result;
use std::sync::Arc;
use std::time::Duration;

/// Credentials kept in the index store as `USER_<username>` entries
pub struct IndexCredentialDirectory {
    index: Arc<dyn IndexStore>,
}

impl IndexCredentialDirectory {
    pub fn new(index: Arc<dyn IndexStore>) -> Self {
        Self { index }
    }

    pub fn credential_key(username: &str) -> String {
        format!("{CREDENTIAL_PREFIX}{username}")
    }

    /// Store an argon2 hash of `password` for `username` unless an entry exists.
    ///
    /// Returns whether a new entry was written.
    pub async fn provision(
        &self,
        username: &str,
        password: &str,
    ) -> std::result::Result<bool, AuthError> {
        let key = Self::credential_key(username);
        if self.index.get(&key).await?.is_some() {
            tracing::debug!("Credential for '{}' already present", username);
            return Ok(false);
        }

        let hash = hash_password(password)?;
        self.index.put(&key, hash).await?;
        tracing::info!("Provisioned credential for '{}'", username);
        Ok(true)
    }
}

#[async_trait]
impl CredentialDirectory for IndexCredentialDirectory {
    async fn lookup_password(&self, username: &str) -> Result<Option<String>> {
        self.index.get(&Self::credential_key(username)).await
    }
}

/// Short-lived cache in front of another directory.
/// Only hits are cached, so a newly added user is visible immediately.
pub struct CachedCredentialDirectory {
    inner: Arc<dyn CredentialDirectory>,
    cache: Cache<String, String>,
}

impl CachedCredentialDirectory {
    pub fn new(inner: Arc<dyn CredentialDirectory>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder().max_capacity(10_000).time_to_live(ttl).build(),
        }
    }
}

#[async_trait]
impl CredentialDirectory for CachedCredentialDirectory {
    async fn lookup_password(&self, username: &str) -> Result<Option<String>> {
        if let Some(stored) = self.cache.get(username).await {
            return Ok(Some(stored));
        }

        let stored = self.inner.lookup_password(username).await?;
        if let Some(stored) = &stored {
            self.cache.insert(username.to_string(), stored.clone()).await;
        }
        Ok(stored)
    }
}
