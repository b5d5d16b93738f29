use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;
use shared_utils::AppState;

use crate::models::{AppointmentDashboard, BookingRequest, BookingResponse};
use crate::services::{BookingService, DashboardService, LifecycleService};

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let booking_service = BookingService::new(&state);
    let booking = booking_service.book(&user, request).await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// Marks the appointment completed and returns the doctor's refreshed lists.
#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Doctor)?;

    let lifecycle_service = LifecycleService::new(&state);
    let appointment = lifecycle_service.mark_completed(&user, &appointment_id).await?;

    let dashboard_service = DashboardService::new(&state);
    let dashboard = dashboard_service.for_doctor(&user.id).await?;

    Ok(Json(json!({
        "appointment": appointment,
        "dashboard": dashboard
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<AppointmentDashboard>, AppError> {
    require_role(&user, Role::Doctor)?;

    let dashboard_service = DashboardService::new(&state);
    Ok(Json(dashboard_service.for_doctor(&user.id).await?))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<AppointmentDashboard>, AppError> {
    require_role(&user, Role::Patient)?;

    let dashboard_service = DashboardService::new(&state);
    Ok(Json(dashboard_service.for_patient(&user.id).await?))
}
