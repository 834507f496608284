// API module - HTTP endpoints

pub mod access;
pub mod admin;
pub mod auth;
pub mod health;
pub mod middleware;
pub mod registration;
pub mod users;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::config::Config;
use crate::repository::Store;
use crate::services::{documents::DocumentStore, password::PasswordHasher};

/// Collaborators shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub documents: Arc<dyn DocumentStore>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub config: Arc<Config>,
}

/// Full HTTP surface, without transport layers (tracing, CORS)
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(registration::router(state.config.max_upload_bytes))
        .merge(auth::router())
        .merge(users::router())
        .merge(access::api_router())
        .merge(admin::legacy_router(state.clone()))
        .nest("/admin", admin::router(state.clone()));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(access::scan_router())
        .nest("/api", api)
        .with_state(state)
}
