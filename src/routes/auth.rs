use crate::{
    auth::{accounts, AuthResponse, LoginRequest, SignupRequest, SignupResponse},
    error::AppError,
    models::Role,
    state::AppState,
};
use actix_web::{post, web, HttpResponse, Responder};
use serde_json::json;

/// Register a new user
///
/// Creates a regular (`usuario`) account. No token is issued; clients log in next.
#[post("/signup")]
pub async fn signup(
    state: web::Data<AppState>,
    signup_data: web::Json<SignupRequest>,
) -> Result<impl Responder, AppError> {
    let user = accounts::register(&state, signup_data.into_inner(), Role::Usuario).await?;

    Ok(HttpResponse::Created().json(SignupResponse {
        message: "User registered successfully".into(),
        user_id: user.id,
        username: user.username,
        role: user.role,
    }))
}

/// Login user
///
/// Authenticates a user and returns a token carrying their role.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let (user, issued) = accounts::login(&state, login_data.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        role: user.role,
        username: user.username,
    }))
}

/// Tokens are stateless, so logging out is the client discarding its token.
#[post("/logout")]
pub async fn logout() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": "Logged out" }))
}

/// Create the first administrator. Only works while no admin exists.
#[post("/admin/bootstrap")]
pub async fn bootstrap_admin(
    state: web::Data<AppState>,
    signup_data: web::Json<SignupRequest>,
) -> Result<impl Responder, AppError> {
    let admin = accounts::bootstrap_admin(&state, signup_data.into_inner()).await?;

    Ok(HttpResponse::Created().json(SignupResponse {
        message: "Administrator created".into(),
        user_id: admin.id,
        username: admin.username,
        role: admin.role,
    }))
}
