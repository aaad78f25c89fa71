use crate::{
    auth::{require_admin, AuthenticatedUser},
    error::AppError,
    models::{Role, UserSummary},
    state::AppState,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde_json::json;
use uuid::Uuid;

const USER_LIST_LIMIT: i64 = 10;

/// Lists up to ten accounts, oldest first. Admin only.
#[get("")]
pub async fn list_users(
    state: web::Data<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    require_admin(&identity)?;

    let users: Vec<UserSummary> = state
        .users
        .list_users(USER_LIST_LIMIT)
        .await?
        .into_iter()
        .map(UserSummary::from)
        .collect();

    Ok(HttpResponse::Ok().json(users))
}

/// Grants the admin role. Promoting an admin is a no-op.
#[post("/{id}/promote")]
pub async fn promote_user(
    state: web::Data<AppState>,
    user_id: web::Path<Uuid>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    change_role(&state, &identity, user_id.into_inner(), Role::Admin).await
}

/// Revokes the admin role. Demoting a regular user is a no-op.
///
/// Existing tokens keep the role they were issued with until they expire.
#[post("/{id}/demote")]
pub async fn demote_user(
    state: web::Data<AppState>,
    user_id: web::Path<Uuid>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    change_role(&state, &identity, user_id.into_inner(), Role::Usuario).await
}

async fn change_role(
    state: &AppState,
    identity: &crate::auth::Identity,
    user_id: Uuid,
    role: Role,
) -> Result<HttpResponse, AppError> {
    require_admin(identity)?;

    let user = state
        .users
        .set_role(user_id, role)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    log::info!("User {} set role of {} to {}", identity.user_id, user.id, role);

    let message = match role {
        Role::Admin => "User promoted to admin",
        Role::Usuario => "User demoted to usuario",
    };
    Ok(HttpResponse::Ok().json(json!({
        "message": message,
        "user": UserSummary::from(user),
    })))
}
