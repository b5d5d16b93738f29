use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tracing::warn;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;
use shared_utils::AppState;

use crate::models::{
    AvailabilityResponse, CommitAvailabilityRequest, DirectoryQuery, DoctorProfile,
    OnboardingRequest, PreviewAvailabilityRequest, DOCTOR_DASHBOARD_ROUTE, SLOT_CATALOG,
};
use crate::services::{AvailabilityService, DoctorService};

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DirectoryQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let doctors = doctor_service.search(&query).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_specialties(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let specialties = doctor_service.specialties().await?;

    Ok(Json(json!({ "specialties": specialties })))
}

#[axum::debug_handler]
pub async fn get_slot_catalog() -> Json<Value> {
    Json(json!({ "slots": SLOT_CATALOG }))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<DoctorProfile>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service.get_doctor(&doctor_id).await?;

    Ok(Json(doctor))
}

/// Server-sent events for one profile: `doctor` on every change, `not_found` while it is missing.
pub async fn doctor_live(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let subscription = doctor_service.subscribe(&doctor_id).await?;

    let stream = subscription.into_stream().map(move |update| {
        let event = match update {
            Some(doctor) => Event::default()
                .event("doctor")
                .json_data(&doctor)
                .unwrap_or_else(|e| {
                    warn!("Could not encode doctor {}: {}", doctor_id, e);
                    Event::default().event("error")
                }),
            None => Event::default().event("not_found").data(doctor_id.as_str()),
        };
        Ok(event)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn complete_onboarding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<OnboardingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service.create_profile(&user, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "doctor": doctor,
            "redirect_to": DOCTOR_DASHBOARD_ROUTE
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_my_availability(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    require_role(&user, Role::Doctor)?;

    let availability_service = AvailabilityService::new(&state);
    let availability = availability_service.get(&user.id).await?;

    Ok(Json(availability))
}

#[axum::debug_handler]
pub async fn preview_availability(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<PreviewAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Doctor)?;

    let availability_service = AvailabilityService::new(&state);
    let availability = availability_service.preview(&request)?;

    Ok(Json(json!({ "availability": availability })))
}

#[axum::debug_handler]
pub async fn commit_availability(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CommitAvailabilityRequest>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    require_role(&user, Role::Doctor)?;

    let availability_service = AvailabilityService::new(&state);
    let availability = availability_service
        .commit(&user.id, request.availability, request.expected_version)
        .await?;

    Ok(Json(availability))
}
