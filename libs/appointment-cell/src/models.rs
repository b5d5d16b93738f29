use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use doctor_cell::models::SlotLabel;
use shared_database::StoreError;
use shared_models::error::AppError;

pub const APPOINTMENTS_COLLECTION: &str = "appointments";
pub const PATIENT_DASHBOARD_ROUTE: &str = "/dashboard";
pub const SELECT_DATE_AND_TIME: &str = "Please select a date and time.";

/// Attempts made at the booking transaction before giving up on a contended doctor.
pub const MAX_BOOKING_ATTEMPTS: usize = 3;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    /// Reserved; nothing sets it.
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no-show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentType {
    #[default]
    Consultation,
    #[serde(alias = "followup", alias = "follow_up")]
    FollowUp,
    Emergency,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentRecord {
    pub id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub doctor_specialty: String,
    pub patient_id: String,
    pub patient_name: String,
    pub date: NaiveDate,
    pub time: SlotLabel,
    pub status: AppointmentStatus,
    #[serde(rename = "type", default)]
    pub appointment_type: AppointmentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub fee: u32,
    /// Stamped by the store on creation.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AppointmentRecord {
    pub fn is_upcoming(&self) -> bool {
        self.status == AppointmentStatus::Scheduled
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub doctor_id: String,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    #[serde(default, rename = "type")]
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingResponse {
    pub appointment: AppointmentRecord,
    pub redirect_to: String,
    pub redirect_after_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AppointmentDashboard {
    pub upcoming: Vec<AppointmentRecord>,
    pub past: Vec<AppointmentRecord>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("{0}")]
    Validation(String),

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Appointment not found")]
    NotFound,

    #[error("This time slot is no longer available. Please choose another.")]
    SlotUnavailable,

    #[error("Failed to book appointment. Please try again.")]
    BookingFailed,

    #[error("Only the appointment's doctor can change it")]
    NotYourAppointment,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::DoctorNotFound | AppointmentError::NotFound => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::SlotUnavailable => AppError::SlotUnavailable(err.to_string()),
            AppointmentError::BookingFailed => AppError::BookingFailed(err.to_string()),
            AppointmentError::NotYourAppointment => AppError::Forbidden(err.to_string()),
            AppointmentError::InvalidStatusTransition(_) => AppError::Conflict(err.to_string()),
            AppointmentError::Store(e) => e.into(),
        }
    }
}
