use std::sync::Arc;

use axum::{routing::post, Router};

use crate::handlers;
use crate::services::AuthService;

pub fn auth_routes(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/validate", post(handlers::validate_token))
        .route("/verify", post(handlers::verify_token))
        .with_state(service)
}
