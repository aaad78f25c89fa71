pub mod accounts;
pub mod extractors;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod token;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::Role;

// Re-export necessary items
pub use extractors::AuthenticatedUser;
pub use middleware::AuthMiddleware;
pub use password::PasswordHasher;
pub use policy::{is_admin, require_admin};
pub use token::{Claims, Identity, IssuedToken, TokenError, TokenService};

lazy_static! {
    // Letters in any script, digits, spaces, underscores, dots and hyphens.
    static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[\p{L}\p{N} _.\-]+$").unwrap();
}

// bcrypt only reads the first 72 bytes of a password.
const BCRYPT_MAX_PASSWORD_BYTES: usize = 72;

fn validate_password_bytes(password: &str) -> Result<(), ValidationError> {
    if password.len() > BCRYPT_MAX_PASSWORD_BYTES {
        let mut error = ValidationError::new("length");
        error.message = Some(Cow::from("password must be at most 72 bytes"));
        return Err(error);
    }
    Ok(())
}

/// Represents the payload for a user login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    /// Must be at least 6 characters long.
    #[validate(length(min = 6))]
    pub password: String,
}

/// Payload for signup and for the admin bootstrap.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    /// Between 1 and 50 characters: letters, digits, spaces, underscores, dots or hyphens.
    /// Surrounding whitespace is trimmed before validation.
    #[validate(
        length(min = 1, max = 50),
        regex(
            path = "USERNAME_REGEX",
            message = "Username may only contain letters, digits, spaces, underscores, dots or hyphens"
        )
    )]
    pub username: String,
    #[validate(email)]
    pub email: String,
    /// At least 6 characters and at most 72 bytes of UTF-8.
    #[validate(length(min = 6), custom = "validate_password_bytes")]
    pub password: String,
}

/// Returned by a successful login.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Bearer token for the `Authorization` header.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub role: Role,
    pub username: String,
}

/// Returned by signup and the admin bootstrap.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub message: String,
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}
