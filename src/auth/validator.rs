//! Login validation
//!
//! Checks submitted admin credentials against the configured username and
//! Argon2id hash.

use log::{error, warn};

use super::credentials::verify_password;
use crate::error::AuthError;
use crate::utils::validation::is_valid_input;

pub const MAX_CREDENTIAL_LENGTH: usize = 512;

/// Validates a login attempt.
///
/// Runs an Argon2 verification, so call it from a blocking context.
pub fn validate_login(
    username: &str,
    password: &str,
    admin_username: &str,
    admin_password_hash: &str,
) -> Result<(), AuthError> {
    if !is_valid_input(username, MAX_CREDENTIAL_LENGTH)
        || !is_valid_input(password, MAX_CREDENTIAL_LENGTH)
    {
        return Err(AuthError::MalformedInput(
            "Username and password required".into(),
        ));
    }

    if admin_password_hash.is_empty() {
        error!("Login attempted but no admin password hash is configured");
        return Err(AuthError::NotConfigured);
    }

    if username != admin_username {
        warn!("Failed login for unknown user {username:?}");
        return Err(AuthError::InvalidCredentials);
    }

    if verify_password(password, admin_password_hash)? {
        Ok(())
    } else {
        warn!("Failed login for {username:?}: wrong password");
        Err(AuthError::InvalidCredentials)
    }
}
