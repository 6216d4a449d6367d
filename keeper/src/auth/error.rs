use thiserror::Error;

/// Why a credential check or provisioning step did not succeed
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user or wrong password; callers must not tell the two apart
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password must be at least 8 characters and mix letters and digits")]
    WeakPassword,

    #[error("Credential store error: {0}")]
    StorageError(#[from] shared::Error),

    #[error("Stored credential is not a valid hash: {0}")]
    PasswordHashError(String),
}
