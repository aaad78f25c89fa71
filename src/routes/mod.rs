pub mod auth;
pub mod health;
pub mod tasks;
pub mod users;

use actix_web::{error, web, HttpRequest};

use crate::auth::AuthMiddleware;
use crate::error::AppError;

fn json_error(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid JSON body: {}", err)).into()
}

fn query_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid query string: {}", err)).into()
}

// An id that is not a UUID cannot name any resource.
fn path_error(_err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::NotFound("Resource not found".into()).into()
}

/// Mounts `/health` and the `/api` tree. `/api/users` and `/api/tasks` require a
/// bearer token; `AppState` must be registered as `web::Data` by the caller.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .app_data(web::PathConfig::default().error_handler(path_error))
        .service(health::health)
        .service(
            web::scope("/api")
                .service(auth::signup)
                .service(auth::login)
                .service(auth::logout)
                .service(auth::bootstrap_admin)
                .service(
                    web::scope("/users")
                        .wrap(AuthMiddleware)
                        .service(users::list_users)
                        .service(users::promote_user)
                        .service(users::demote_user),
                )
                .service(
                    web::scope("/tasks")
                        .wrap(AuthMiddleware)
                        .service(tasks::get_tasks)
                        .service(tasks::create_task)
                        .service(tasks::update_progress)
                        .service(tasks::update_difficulty)
                        .service(tasks::get_task)
                        .service(tasks::update_task)
                        .service(tasks::delete_task),
                ),
        );
}
