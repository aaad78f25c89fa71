#![allow(dead_code)]

use actix_web::body::{self, MessageBody};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{header, StatusCode};
use actix_web::{test, web};
use serde_json::{json, Value};
use std::sync::Arc;
use task_leveling::store::MemoryStore;
use task_leveling::AppState;

pub const PASSWORD: &str = "Password123!";
pub const SECRET: &[u8] = b"integration_test_secret";

pub fn state() -> (web::Data<AppState>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::in_memory(store.clone(), SECRET);
    (web::Data::new(state), store)
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

/// Sends a request and returns the status with the parsed JSON body (`Null` when empty).
///
/// Errors raised by middleware are rendered the way the server would render them.
pub async fn send<S, B>(app: &S, req: actix_http::Request) -> (StatusCode, Value)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, bytes) = match test::try_call_service(app, req).await {
        Ok(resp) => {
            let status = resp.status();
            (status, test::read_body(resp).await)
        }
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            let bytes = body::to_bytes(resp.into_body())
                .await
                .unwrap_or_else(|_| panic!("Unreadable error body for {}", status));
            (status, bytes)
        }
    };
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            panic!(
                "Non-JSON body ({}): {:?}",
                e,
                String::from_utf8_lossy(&bytes)
            )
        })
    };
    (status, body)
}

pub async fn login<S, B>(app: &S, email: &str) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/login")
        .set_json(json!({ "email": email, "password": PASSWORD }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK, "Login failed: {}", body);
    body["token"].as_str().expect("token in login response").to_string()
}

/// Registers a regular user and returns a token for them.
pub async fn signup_and_login<S, B>(app: &S, username: &str, email: &str) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/signup")
        .set_json(json!({ "username": username, "email": email, "password": PASSWORD }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "Signup failed: {}", body);
    login(app, email).await
}

/// Creates the first administrator through the bootstrap route and returns a token for them.
pub async fn bootstrap_admin<S, B>(app: &S, email: &str) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/admin/bootstrap")
        .set_json(json!({ "username": "root", "email": email, "password": PASSWORD }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "Bootstrap failed: {}", body);
    login(app, email).await
}

pub async fn create_task<S, B>(app: &S, token: &str, payload: Value) -> Value
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/tasks")
        .insert_header(bearer(token))
        .set_json(payload)
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "Task creation failed: {}", body);
    body
}
