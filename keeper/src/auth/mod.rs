// Public API
pub mod auth_service;
pub mod directory;
pub mod error;
pub mod password;

// Re-export commonly used types
pub use auth_service::AuthService;
pub use directory::{CachedCredentialDirectory, IndexCredentialDirectory};
pub use error::AuthError;
