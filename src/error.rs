//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! It centralizes error management, providing a consistent way to handle and represent
//! the failure modes of the service, from bad credentials to database outages.
//!
//! `AppError` implements `actix_web::error::ResponseError` to convert application errors
//! into HTTP responses with JSON bodies of the form `{"error": "..."}`. Infrastructure
//! failures are logged with their detail and answered with a generic message, so store
//! or hashing internals never reach the client.

use actix_web::{error::BlockingError, error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use validator::ValidationErrors;

/// Field name to the list of messages reported for it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Missing, malformed or expired credentials (HTTP 401).
    Unauthorized(String),
    /// Valid request from a caller that is not allowed to perform it, or a token
    /// whose signature does not check out (HTTP 403).
    Forbidden(String),
    /// Malformed request that could not be deserialized (HTTP 400).
    BadRequest(String),
    /// A query parameter failed validation (HTTP 400). Names the offending field.
    InvalidArgument { field: String, message: String },
    /// The resource is absent or not owned by the caller (HTTP 404).
    NotFound(String),
    /// The request collides with existing state, such as a registered email (HTTP 400).
    Conflict(String),
    /// Unexpected server-side failure (HTTP 500).
    InternalServerError(String),
    /// Failure reported by the database driver (HTTP 500).
    DatabaseError(String),
    /// Request body violated its schema (HTTP 422), with per-field messages.
    ValidationError(FieldErrors),
}

impl AppError {
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::InvalidArgument { field, message } => {
                write!(f, "Invalid Argument: {}: {}", field, message)
            }
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::ValidationError(fields) => {
                let names: Vec<&str> = fields.keys().map(String::as_str).collect();
                write!(f, "Validation Error: {}", names.join(", "))
            }
        }
    }
}

/// Converts `AppError` variants into `HttpResponse` objects.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::InvalidArgument { .. } | AppError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => json!({ "error": msg }),
            AppError::InvalidArgument { field, message } => json!({
                "error": message,
                "field": field
            }),
            AppError::InternalServerError(detail) | AppError::DatabaseError(detail) => {
                log::error!("{}", detail);
                json!({ "error": INTERNAL_MESSAGE })
            }
            AppError::ValidationError(fields) => json!({
                "error": "Validation failed",
                "fields": fields
            }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` becomes `NotFound`, a unique-index violation becomes `Conflict`,
/// and everything else is a `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("Email already registered".into())
            }
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`.
///
/// Each field keeps every message reported for it; rules without a custom
/// message fall back to their code (`length`, `email`, ...).
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        let mut fields = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        AppError::ValidationError(fields)
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(format!("Password hashing failed: {}", error))
    }
}

impl From<BlockingError> for AppError {
    fn from(error: BlockingError) -> AppError {
        AppError::InternalServerError(format!("Blocking task failed: {}", error))
    }
}
