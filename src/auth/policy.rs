use crate::auth::token::Identity;
use crate::error::AppError;
use crate::models::Role;

pub fn is_admin(identity: &Identity) -> bool {
    identity.role == Role::Admin
}

/// Gate for admin-only operations. Call before touching the store.
pub fn require_admin(identity: &Identity) -> Result<(), AppError> {
    if is_admin(identity) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Administrator role required for this operation".into(),
        ))
    }
}
