use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::auth::token::{Identity, TokenError, TokenService};
use crate::error::AppError;
use crate::state::AppState;

/// Bearer-token gate for protected scopes.
///
/// Verifies the token with the application's `TokenService` and stores the caller's
/// [`Identity`] in the request extensions. Nothing is read from the database here,
/// so role and username are whatever the token says.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let outcome = match req.app_data::<web::Data<AppState>>() {
            Some(state) => {
                let auth_header = req
                    .headers()
                    .get(header::AUTHORIZATION)
                    .map(|value| value.to_str().unwrap_or_default());
                authenticate(auth_header, &state.tokens)
            }
            None => Err(AppError::InternalServerError(
                "AppState is not registered; AuthMiddleware cannot verify tokens".into(),
            )),
        };

        match outcome {
            Ok(identity) => {
                req.extensions_mut().insert(identity);
                Box::pin(self.service.call(req))
            }
            Err(app_err) => {
                log::debug!("Rejected {} {}: {}", req.method(), req.path(), app_err);
                Box::pin(async move { Err(app_err.into()) })
            }
        }
    }
}

/// Turns the raw `Authorization` header value into an identity.
///
/// A missing or non-bearer header and an expired token are 401s; a token that fails
/// verification for any other reason is a 403.
pub fn authenticate(auth_header: Option<&str>, tokens: &TokenService) -> Result<Identity, AppError> {
    let value = auth_header.ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;
    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Malformed authorization header".into()))?;

    match tokens.verify(token) {
        Ok(claims) => Ok(Identity::from(claims)),
        Err(TokenError::Expired) => Err(AppError::Unauthorized(TokenError::Expired.to_string())),
        Err(TokenError::Invalid) => Err(AppError::Forbidden(TokenError::Invalid.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Duration;
    use uuid::Uuid;

    fn tokens() -> TokenService {
        TokenService::new(b"middleware_test_secret", Duration::hours(1))
    }

    #[test]
    fn test_missing_and_malformed_headers_are_unauthorized() {
        let tokens = tokens();
        for header in [None, Some(""), Some("Token abc"), Some("Bearer "), Some("bearer abc")] {
            match authenticate(header, &tokens) {
                Err(AppError::Unauthorized(_)) => {}
                other => panic!("{:?} should be unauthorized, got {:?}", header, other),
            }
        }
    }

    #[test]
    fn test_invalid_token_is_forbidden() {
        match authenticate(Some("Bearer not.a.token"), &tokens()) {
            Err(AppError::Forbidden(msg)) => assert_eq!(msg, "Invalid token"),
            other => panic!("expected Forbidden, got {:?}", other),
        }
    }

    #[test]
    fn test_expired_token_is_unauthorized_not_forbidden() {
        let tokens = tokens();
        let now = chrono::Utc::now();
        let issued = tokens
            .issue_at(
                Uuid::new_v4(),
                "ana",
                Role::Usuario,
                now - Duration::hours(2),
                now - Duration::hours(1),
            )
            .unwrap();
        let header = format!("Bearer {}", issued.token);

        match authenticate(Some(&header), &tokens) {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "Token expired"),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_token_yields_identity() {
        let tokens = tokens();
        let user_id = Uuid::new_v4();
        let issued = tokens.issue(user_id, "ana", Role::Usuario).unwrap();
        let header = format!("Bearer {}", issued.token);

        let identity = authenticate(Some(&header), &tokens).unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.role, Role::Usuario);
    }
}
