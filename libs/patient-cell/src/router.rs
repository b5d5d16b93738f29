use std::sync::Arc;
use axum::{middleware, routing::get, Router};
use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers::*;

pub fn create_patient_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/me", get(get_patient_profile))
        .route("/me/dashboard", get(get_patient_dashboard))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
