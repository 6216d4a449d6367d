use argon2::password_hash::rand_core::OsRng;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};

use super::error::AuthError;

const MIN_PASSWORD_LEN: usize = 8;

/// A `USER_<name>` value as found in the index store
enum StoredCredential<'a> {
    Hashed(PasswordHash<'a>),
    /// Written by hand or by deployments that predate hashing
    Plain(&'a str),
}

impl<'a> StoredCredential<'a> {
    fn parse(stored: &'a str) -> Result<Self, AuthError> {
        if !stored.starts_with("$argon2") {
            return Ok(Self::Plain(stored));
        }
        PasswordHash::new(stored)
            .map(Self::Hashed)
            .map_err(|e| AuthError::PasswordHashError(e.to_string()))
    }

    fn matches(&self, password: &str) -> bool {
        match self {
            Self::Hashed(hash) => Argon2::default()
                .verify_password(password.as_bytes(), hash)
                .is_ok(),
            Self::Plain(expected) => constant_time_eq(password.as_bytes(), expected.as_bytes()),
        }
    }
}

/// Hash a credential for storage as an argon2 PHC string
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    validate_password_strength(password)?;

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHashError(e.to_string()))
}

/// Check a presented password against a stored credential, hashed or plain.
///
/// A stored value that claims to be argon2 but does not parse is an error,
/// not a mismatch.
pub fn verify_credential(password: &str, stored: &str) -> Result<bool, AuthError> {
    Ok(StoredCredential::parse(stored)?.matches(password))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Minimum bar for credentials this service provisions itself
pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let mixed = password.chars().any(char::is_alphabetic) && password.chars().any(char::is_numeric);
    if long_enough && mixed {
        Ok(())
    } else {
        Err(AuthError::WeakPassword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashed_credentials_verify() {
        let hash = hash_password("cache_secret42").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_credential("cache_secret42", &hash).unwrap());
        assert!(!verify_credential("wrong_secret42", &hash).unwrap());
    }

    #[test]
    fn test_plain_credentials_verify() {
        assert!(verify_credential("legacy-pass", "legacy-pass").unwrap());
        assert!(!verify_credential("legacy-pas", "legacy-pass").unwrap());
        assert!(!verify_credential("", "legacy-pass").unwrap());
    }

    #[test]
    fn test_weak_passwords_are_not_hashed() {
        assert!(validate_password_strength("admin123").is_ok());
        for weak in ["abc1", "onlyletters", "12345678", ""] {
            assert!(matches!(hash_password(weak), Err(AuthError::WeakPassword)));
        }
    }

    #[test]
    fn test_malformed_phc_is_an_error() {
        assert!(matches!(
            verify_credential("anything", "$argon2id$garbage"),
            Err(AuthError::PasswordHashError(_))
        ));
    }
}
