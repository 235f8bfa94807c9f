//! Password hashing
//!
//! Argon2id hashing and verification of the admin password. Hashes are PHC
//! strings (`$argon2id$v=19$m=...`) carrying their own parameters and salt.

use argon2::password_hash::{self, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::RngCore;

use crate::error::AuthError;

/// Memory cost in KiB.
pub const DEFAULT_MEMORY_COST: u32 = 65536;
pub const DEFAULT_TIME_COST: u32 = 3;
pub const DEFAULT_PARALLELISM: u32 = 4;

/// Hashes `password` with the default Argon2id cost parameters.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let params = Params::new(DEFAULT_MEMORY_COST, DEFAULT_TIME_COST, DEFAULT_PARALLELISM, None)
        .map_err(|e| AuthError::Hashing(format!("invalid parameters: {e}")))?;
    hash_password_with(password, params)
}

/// Hashes `password` with explicit Argon2id cost parameters.
pub fn hash_password_with(password: &str, params: Params) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AuthError::Hashing(format!("salt encoding failed: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}

/// Checks `password` against a stored PHC hash.
///
/// `Ok(false)` means the password is wrong; `Err` means the stored hash
/// itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::MalformedHash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::MalformedHash(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_hash(password: &str) -> String {
        hash_password_with(password, Params::new(8, 1, 1, None).unwrap()).unwrap()
    }

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = cheap_hash("s3cret");
        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(verify_password("s3cret", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(cheap_hash("same"), cheap_hash("same"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("x", "not-a-phc-string"),
            Err(AuthError::MalformedHash(_))
        ));
    }

    #[test]
    fn default_parameters_are_encoded_in_the_hash() {
        let hash = hash_password("pw").unwrap();
        assert!(hash.contains("m=65536,t=3,p=4"), "{hash}");
    }
}
