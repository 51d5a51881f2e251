use std::{io, sync::Arc};

use axum::{routing::get_service, Extension, Router};
use tower_http::services::ServeDir;

pub mod api;
pub mod auth;
pub mod config;
pub mod content;
pub mod email;
pub mod error;
pub mod events;
pub mod models;
pub mod registration;
pub mod roll_no;
pub mod schema;
pub mod store;

use auth::{AdminCredentials, SessionKeys};
use error::{AppError, ErrorKind};
use registration::Registrar;
use store::Store;

/// Everything handlers need, shared through an `Extension`.
#[derive(Clone)]
pub struct AppState {
    pub registrar: Registrar,
    pub sessions: Arc<SessionKeys>,
    pub admin: Arc<AdminCredentials>,
}

impl AppState {
    pub fn store(&self) -> &dyn Store {
        self.registrar.store().as_ref()
    }
}

pub fn app(state: AppState) -> Router {
    let serve = get_service(ServeDir::new("assets")).handle_error(handle_error);
    Router::new()
        .nest("/api", api::app())
        .nest("/assets", serve)
        .layer(Extension(state))
}

async fn handle_error(_: io::Error) -> AppError {
    AppError::new(ErrorKind::Downstream, "failed to fetch asset")
}
