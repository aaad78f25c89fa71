use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::io;

use task_leveling::auth::{accounts, SignupRequest};
use task_leveling::config::Config;
use task_leveling::error::AppError;
use task_leveling::{routes, AppState};

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    log::error!("{}: {}", context, err);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| startup_error("Invalid configuration", e))?;
    let state = AppState::from_config(&config)
        .await
        .map_err(|e| startup_error("Failed to initialise storage", e))?;

    if let Some(admin) = config.bootstrap_admin.clone() {
        let request = SignupRequest {
            username: admin.username,
            email: admin.email,
            password: admin.password,
        };
        match accounts::bootstrap_admin(&state, request).await {
            Ok(user) => log::info!("Bootstrap administrator {} created", user.id),
            Err(AppError::Conflict(reason)) => log::info!("Skipping bootstrap administrator: {}", reason),
            Err(e) => return Err(startup_error("Failed to create bootstrap administrator", e)),
        }
    }

    let state = web::Data::new(state);
    log::info!("Starting Task Leveling server at {}", config.server_url());

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .configure(routes::config)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
