use super::error::AuthError;
use super::password::verify_credential;
use crate::ports::CredentialDirectory;
use std::sync::Arc;

pub struct AuthService {
    directory: Arc<dyn CredentialDirectory>,
}

impl AuthService {
    pub fn new(directory: Arc<dyn CredentialDirectory>) -> Self {
        Self { directory }
    }

    /// Authenticate a user by username and password
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if username.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let stored = self
            .directory
            .lookup_password(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_credential(password, &stored)? {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(())
    }
}
