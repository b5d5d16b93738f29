use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/specialties", get(handlers::get_specialties))
        .route("/slots", get(handlers::get_slot_catalog))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/live", get(handlers::doctor_live));

    let protected_routes = Router::new()
        .route("/onboarding", post(handlers::complete_onboarding))
        .route(
            "/me/availability",
            get(handlers::get_my_availability).put(handlers::commit_availability),
        )
        .route("/me/availability/preview", post(handlers::preview_availability))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
