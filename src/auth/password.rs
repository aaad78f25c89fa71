use actix_web::web;

use crate::error::AppError;

/// bcrypt hashing with a configured work factor.
///
/// Both operations are CPU-bound, so they run on actix's blocking thread pool and
/// require a running actix system.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Returns a salted digest. The plaintext is dropped once the digest exists.
    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_owned();
        let cost = self.cost;
        let hashed = web::block(move || bcrypt::hash(password, cost)).await??;
        Ok(hashed)
    }

    /// Constant-time check of `password` against a stored digest. A digest that is
    /// not valid bcrypt is an internal error, not a mismatch.
    pub async fn verify(&self, password: &str, hashed_password: &str) -> Result<bool, AppError> {
        let password = password.to_owned();
        let hashed_password = hashed_password.to_owned();
        let matches = web::block(move || bcrypt::verify(password, &hashed_password)).await??;
        Ok(matches)
    }
}
