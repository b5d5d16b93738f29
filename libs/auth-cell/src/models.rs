use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::auth::{Role, Session};
use shared_models::error::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 6 characters long.";
pub const SIGN_UP_FAILED: &str = "Failed to create an account. The email might already be in use.";
pub const SIGN_IN_FAILED: &str = "Invalid email or password.";

pub const DOCTOR_ONBOARDING_ROUTE: &str = "/doctor/onboarding";
pub const PATIENT_DASHBOARD_ROUTE: &str = "/dashboard";
pub const DOCTOR_DASHBOARD_ROUTE: &str = "/doctor/dashboard";

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Outcome of a provider sign-up. Hosted providers that require email
/// confirmation return no session.
#[derive(Debug, Clone)]
pub struct SignUpResult {
    pub user_id: String,
    pub display_name: String,
    pub session: Option<Session>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
    pub session: Option<Session>,
    pub redirect_to: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session: Session,
    pub redirect_to: String,
}

/// `users/{uid}` role-tagging document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<String>,
}

pub fn landing_route(role: Role, just_registered: bool) -> &'static str {
    match (role, just_registered) {
        (Role::Doctor, true) => DOCTOR_ONBOARDING_ROUTE,
        (Role::Doctor, false) => DOCTOR_DASHBOARD_ROUTE,
        (Role::Patient, _) => PATIENT_DASHBOARD_ROUTE,
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("{}", SIGN_UP_FAILED)]
    SignUpFailed,

    #[error("{}", SIGN_IN_FAILED)]
    SignInFailed,

    #[error("Missing or invalid session token")]
    InvalidSession,

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => AppError::ValidationError(msg),
            AuthError::SignUpFailed => AppError::Conflict(SIGN_UP_FAILED.to_string()),
            AuthError::SignInFailed => AppError::Auth(SIGN_IN_FAILED.to_string()),
            AuthError::InvalidSession => AppError::Auth(err.to_string()),
            AuthError::Provider(msg) => AppError::ExternalService(msg),
            AuthError::Store(e) => e.into(),
        }
    }
}
