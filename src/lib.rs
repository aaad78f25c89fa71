#![doc = "The `task_leveling` library crate."]
#![doc = ""]
#![doc = "Domain models, persistence backends, authentication, routing and error handling"]
#![doc = "for the Task Leveling API. The binary (`main.rs`) builds an `AppState` from the"]
#![doc = "environment and serves `routes::config` with it."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

pub use crate::error::AppError;
pub use crate::state::AppState;
