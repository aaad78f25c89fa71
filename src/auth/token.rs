use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::Role;

/// Represents the claims encoded within a JWT.
///
/// Role and username are copied into the token at login and trusted until `exp`.
/// Changing a user's role does not touch tokens already issued: a demoted admin
/// keeps admin claims until their current token expires.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject of the token: the user's id.
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

/// The authenticated caller, as attached to a request by `AuthMiddleware`.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
        }
    }
}

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Well-formed and correctly signed, but past its expiry.
    Expired,
    /// Bad signature, wrong algorithm, or a payload that does not decode.
    Invalid,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Expired => f.write_str("Token expired"),
            TokenError::Invalid => f.write_str("Invalid token"),
        }
    }
}

impl std::error::Error for TokenError {}

/// A freshly signed token and the instant it stops being accepted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies HS256 session tokens with a key fixed at construction.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            Duration::hours(config.jwt_expiration_hours),
        )
    }

    /// Generates a token for the given user, valid for the configured lifetime.
    pub fn issue(&self, user_id: Uuid, username: &str, role: Role) -> Result<IssuedToken, AppError> {
        let issued_at = Utc::now();
        self.issue_at(user_id, username, role, issued_at, issued_at + self.ttl)
    }

    pub(crate) fn issue_at(
        &self,
        user_id: Uuid,
        username: &str,
        role: Role,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            role,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))?;

        // Report the second-truncated instant that is actually encoded.
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .unwrap_or(expires_at);

        Ok(IssuedToken { token, expires_at })
    }

    /// Verifies a token's signature and expiry and returns its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SECRET: &[u8] = b"test_secret_for_token_service";

    fn service() -> TokenService {
        TokenService::new(SECRET, Duration::hours(24))
    }

    #[test]
    fn test_token_generation_and_verification() {
        let tokens = service();
        let user_id = Uuid::new_v4();
        let issued = tokens.issue(user_id, "ana", Role::Admin).unwrap();
        let claims = tokens.verify(&issued.token).unwrap();

        assert_eq!(
            Identity::from(claims.clone()),
            Identity {
                user_id,
                username: "ana".to_string(),
                role: Role::Admin,
            }
        );
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert_eq!(claims.exp - claims.iat, Duration::hours(24).num_seconds());
    }

    #[test]
    fn test_token_expiration() {
        let tokens = service();
        let now = Utc::now();
        let expired = tokens
            .issue_at(
                Uuid::new_v4(),
                "ana",
                Role::Usuario,
                now - Duration::hours(3),
                now - Duration::hours(2),
            )
            .unwrap();

        assert_eq!(tokens.verify(&expired.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_invalid_token_signature() {
        let other = TokenService::new(b"a_completely_different_secret", Duration::hours(1));
        let foreign = other.issue(Uuid::new_v4(), "eve", Role::Admin).unwrap();

        assert_eq!(service().verify(&foreign.token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_tampered_tokens_are_invalid() {
        let tokens = service();
        let issued = tokens.issue(Uuid::new_v4(), "ana", Role::Usuario).unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let flip = |segment: &str| {
            let mut chars: Vec<char> = segment.chars().collect();
            chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
            chars.into_iter().collect::<String>()
        };

        let bad_signature = format!("{}.{}.{}", parts[0], parts[1], flip(parts[2]));
        let bad_payload = format!("{}.{}.{}", parts[0], flip(parts[1]), parts[2]);

        assert_eq!(tokens.verify(&bad_signature), Err(TokenError::Invalid));
        assert_eq!(tokens.verify(&bad_payload), Err(TokenError::Invalid));
        assert_eq!(tokens.verify("not-a-jwt"), Err(TokenError::Invalid));
        assert_eq!(tokens.verify(""), Err(TokenError::Invalid));
    }

    #[test]
    fn test_expired_and_invalid_are_distinguishable() {
        assert_ne!(TokenError::Expired.to_string(), TokenError::Invalid.to_string());
    }
}
