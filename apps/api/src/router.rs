use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use auth_cell::AuthService;
use doctor_cell::router::doctor_routes;
use patient_cell::create_patient_router;
use shared_utils::AppState;

pub fn create_router(state: Arc<AppState>, auth: Arc<AuthService>) -> Router {
    Router::new()
        .route("/", get(|| async { "Doctor booking API is running!" }))
        .nest("/auth", auth_routes(auth))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/patients", create_patient_router(state))
}
