use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use appointment_cell::models::AppointmentDashboard;
use shared_database::StoreError;
use shared_models::auth::Role;
use shared_models::error::AppError;

/// Role-tagging document written at registration, keyed by user id.
pub const USERS_COLLECTION: &str = "users";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientDashboard {
    pub profile: PatientProfile,
    #[serde(flatten)]
    pub appointments: AppointmentDashboard,
}

#[derive(Debug, Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Unauthorized access to patient data")]
    Unauthorized,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Appointments(#[from] appointment_cell::models::AppointmentError),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound(err.to_string()),
            PatientError::Unauthorized => AppError::Forbidden(err.to_string()),
            PatientError::Store(e) => e.into(),
            PatientError::Appointments(e) => e.into(),
        }
    }
}
