use std::sync::Arc;

use chrono::Duration;

use crate::auth::{PasswordHasher, TokenService};
use crate::config::Config;
use crate::error::AppError;
use crate::store::{MemoryStore, PgStore, TaskStore, UserStore};

// Lowest work factor bcrypt accepts.
const IN_MEMORY_BCRYPT_COST: u32 = 4;

/// Everything a handler needs, built once at startup and shared as `web::Data`.
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub tokens: TokenService,
    pub hasher: PasswordHasher,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        tokens: TokenService,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            users,
            tasks,
            tokens,
            hasher,
        }
    }

    /// Uses one backend for both users and tasks.
    pub fn with_store<S>(store: Arc<S>, tokens: TokenService, hasher: PasswordHasher) -> Self
    where
        S: UserStore + TaskStore + 'static,
    {
        Self::new(store.clone(), store, tokens, hasher)
    }

    /// In-memory state with a fixed secret and the cheapest bcrypt cost.
    pub fn in_memory(store: Arc<MemoryStore>, secret: &[u8]) -> Self {
        Self::with_store(
            store,
            TokenService::new(secret, Duration::hours(24)),
            PasswordHasher::new(IN_MEMORY_BCRYPT_COST),
        )
    }

    /// Connects the configured backend. Postgres migrations run here.
    pub async fn from_config(config: &Config) -> Result<Self, AppError> {
        let tokens = TokenService::from_config(config);
        let hasher = PasswordHasher::new(config.bcrypt_cost);

        if config.uses_memory_store() {
            log::warn!("DATABASE_URL selects the in-memory store; data is lost on exit");
            return Ok(Self::with_store(Arc::new(MemoryStore::new()), tokens, hasher));
        }

        let store = PgStore::connect(&config.database_url).await?;
        Ok(Self::with_store(Arc::new(store), tokens, hasher))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn test_in_memory_state_hashes_at_lowest_cost() {
        let state = AppState::in_memory(Arc::new(MemoryStore::new()), b"state_test_secret");
        let hashed = state.hasher.hash("password123").await.unwrap();
        assert!(hashed.starts_with("$2b$04$"), "unexpected digest {}", hashed);
        assert!(state.hasher.verify("password123", &hashed).await.unwrap());
    }
}
