use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{PatientDashboard, PatientProfile};
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn get_patient_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<PatientProfile>, AppError> {
    let service = PatientService::new(&state);
    let profile = service.get_profile(&user).await?;

    Ok(Json(profile))
}

#[axum::debug_handler]
pub async fn get_patient_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<PatientDashboard>, AppError> {
    let service = PatientService::new(&state);
    let dashboard = service.get_dashboard(&user).await?;

    Ok(Json(dashboard))
}
