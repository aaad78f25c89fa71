//! Account creation and credential checks shared by the HTTP handlers and startup.

use validator::Validate;

use crate::auth::{IssuedToken, LoginRequest, SignupRequest};
use crate::error::AppError;
use crate::models::{normalize_email, NewUser, Role, User};
use crate::state::AppState;

// Trims the username and normalises the email, then validates.
fn normalized(mut request: SignupRequest) -> Result<SignupRequest, AppError> {
    request.username = request.username.trim().to_string();
    request.email = normalize_email(&request.email);
    request.validate()?;
    Ok(request)
}

// Rejects a taken email and hashes the password. `request` is already normalised.
async fn prepare(
    state: &AppState,
    request: SignupRequest,
    role: Role,
) -> Result<NewUser, AppError> {
    if state.users.find_user_by_email(&request.email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }
    let password_hash = state.hasher.hash(&request.password).await?;
    Ok(NewUser {
        username: request.username,
        email: request.email,
        password_hash,
        role,
    })
}

/// Validates and stores a new account with the given role.
///
/// Nothing is written unless the payload validates and the email is free. The
/// store's unique index still backs the up-front check against concurrent signups.
pub async fn register(
    state: &AppState,
    request: SignupRequest,
    role: Role,
) -> Result<User, AppError> {
    let request = normalized(request)?;
    let new_user = prepare(state, request, role).await?;
    let user = state.users.insert_user(new_user).await?;

    log::info!("Registered user {} with role {}", user.id, user.role);
    Ok(user)
}

/// Creates the first administrator. Refuses once any admin exists, including
/// when another bootstrap wins a race.
pub async fn bootstrap_admin(state: &AppState, request: SignupRequest) -> Result<User, AppError> {
    let request = normalized(request)?;
    let admin_exists = || AppError::Conflict("An administrator already exists".into());
    if state.users.admin_exists().await? {
        return Err(admin_exists());
    }

    let new_user = prepare(state, request, Role::Admin).await?;
    let admin = state
        .users
        .insert_first_admin(new_user)
        .await?
        .ok_or_else(admin_exists)?;

    log::info!("Created bootstrap administrator {}", admin.id);
    Ok(admin)
}

/// Checks credentials and issues a token.
///
/// Unknown email and wrong password produce the same error.
pub async fn login(
    state: &AppState,
    mut request: LoginRequest,
) -> Result<(User, IssuedToken), AppError> {
    request.email = normalize_email(&request.email);
    request.validate()?;

    let invalid = || AppError::Unauthorized("Invalid credentials".into());
    let user = state
        .users
        .find_user_by_email(&request.email)
        .await?
        .ok_or_else(invalid)?;

    if !state.hasher.verify(&request.password, &user.password_hash).await? {
        log::debug!("Failed login for user {}", user.id);
        return Err(invalid());
    }

    let issued = state.tokens.issue(user.id, &user.username, user.role)?;
    Ok((user, issued))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (AppState::in_memory(store.clone(), b"accounts_test_secret"), store)
    }

    fn signup(email: &str) -> SignupRequest {
        SignupRequest {
            username: "Ana".into(),
            email: email.into(),
            password: "s3cret-pass".into(),
        }
    }

    #[actix_rt::test]
    async fn test_register_stores_hash_not_password() {
        let (state, store) = state();
        let user = register(&state, signup("Ana@Example.com "), Role::Usuario)
            .await
            .unwrap();

        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.role, Role::Usuario);
        let stored = &store.users().await[0];
        assert_ne!(stored.password_hash, "s3cret-pass");
        assert!(state
            .hasher
            .verify("s3cret-pass", &stored.password_hash)
            .await
            .unwrap());
    }

    #[actix_rt::test]
    async fn test_duplicate_email_is_rejected_case_insensitively() {
        let (state, store) = state();
        register(&state, signup("ana@example.com"), Role::Usuario)
            .await
            .unwrap();
        let second = register(&state, signup("ANA@example.com"), Role::Usuario).await;

        assert!(matches!(second, Err(AppError::Conflict(_))));
        assert_eq!(store.users().await.len(), 1);
    }

    #[actix_rt::test]
    async fn test_blank_username_is_rejected() {
        let (state, store) = state();
        let request = SignupRequest {
            username: "   ".into(),
            ..signup("ana@example.com")
        };
        let result = register(&state, request, Role::Usuario).await;

        match result {
            Err(AppError::ValidationError(fields)) => assert!(fields.contains_key("username")),
            other => panic!("expected ValidationError, got {:?}", other.map(|u| u.username)),
        }
        assert!(store.users().await.is_empty());
    }

    #[actix_rt::test]
    async fn test_username_is_stored_trimmed() {
        let (state, _store) = state();
        let request = SignupRequest {
            username: "  Ana  ".into(),
            ..signup("ana@example.com")
        };
        let user = register(&state, request, Role::Usuario).await.unwrap();
        assert_eq!(user.username, "Ana");
    }

    #[actix_rt::test]
    async fn test_invalid_signup_writes_nothing() {
        let (state, store) = state();
        let result = register(&state, signup("not-an-email"), Role::Usuario).await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert!(store.users().await.is_empty());
    }

    #[actix_rt::test]
    async fn test_bootstrap_admin_only_once() {
        let (state, store) = state();
        let admin = bootstrap_admin(&state, signup("root@example.com"))
            .await
            .unwrap();
        assert_eq!(admin.role, Role::Admin);

        let again = bootstrap_admin(&state, signup("other@example.com")).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
        assert_eq!(store.users().await.len(), 1);
    }

    #[actix_rt::test]
    async fn test_concurrent_bootstraps_create_one_admin() {
        let (state, store) = state();
        let (first, second) = futures::join!(
            bootstrap_admin(&state, signup("root@example.com")),
            bootstrap_admin(&state, signup("other@example.com")),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        let conflict = |r: &Result<User, AppError>| {
            matches!(r, Err(AppError::Conflict(msg)) if msg == "An administrator already exists")
        };
        assert!(outcomes.iter().any(conflict));
        let admins = store.users().await.into_iter().filter(User::is_admin).count();
        assert_eq!(admins, 1);
    }

    #[actix_rt::test]
    async fn test_login_checks_credentials() {
        let (state, _store) = state();
        let user = register(&state, signup("ana@example.com"), Role::Usuario)
            .await
            .unwrap();

        let (logged_in, issued) = login(
            &state,
            LoginRequest {
                email: " ANA@example.com ".into(),
                password: "s3cret-pass".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(state.tokens.verify(&issued.token).unwrap().sub, user.id);

        for (email, password) in [
            ("ana@example.com", "wrong-pass"),
            ("nobody@example.com", "s3cret-pass"),
        ] {
            let result = login(
                &state,
                LoginRequest {
                    email: email.into(),
                    password: password.into(),
                },
            )
            .await;
            match result {
                Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "Invalid credentials"),
                other => panic!("expected Unauthorized, got {:?}", other.map(|(u, _)| u.id)),
            }
        }
    }
}
