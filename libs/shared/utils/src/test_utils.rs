use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::{AppConfig, StoreBackend};
use shared_models::auth::{JwtClaims, User};

use crate::jwt::issue_token;
use crate::state::AppState;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub store_backend: StoreBackend,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            store_backend: StoreBackend::Memory,
        }
    }
}

impl TestConfig {
    /// Config pointing the REST backend at a mock server.
    pub fn with_supabase(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            store_backend: StoreBackend::Supabase,
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            store_backend: self.store_backend,
            booking_redirect_delay_ms: 0,
            subscription_poll_interval_ms: 10,
            ..AppConfig::default()
        }
    }

    pub fn to_state(&self) -> Arc<AppState> {
        Arc::new(AppState::from_config(self.to_app_config()))
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub name: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", "patient")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
            name: "Test User".to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: Some(json!({"full_name": self.name, "role": self.role})),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let claims = JwtClaims {
            sub: user.id.clone(),
            exp: Some(exp.timestamp().max(0) as u64),
            email: Some(user.email.clone()),
            role: Some(user.role.clone()),
            app_metadata: None,
            user_metadata: Some(json!({"full_name": user.name, "role": user.role})),
            aud: Some("authenticated".to_string()),
            iat: Some(now.timestamp() as u64),
        };

        issue_token(&claims, secret).expect("test secret is never empty")
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn user_row(user_id: &str, role: &str) -> serde_json::Value {
        json!({
            "id": user_id,
            "version": 1,
            "uid": user_id,
            "name": "Test User",
            "email": "test@example.com",
            "role": role,
            "created_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn doctor_row(doctor_id: &str, availability: serde_json::Value) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "version": 1,
            "name": "Dr. Test Doctor",
            "email": "doctor@example.com",
            "qualification": "MD",
            "specialty": "Cardiology",
            "experience": 12,
            "rating": 4.5,
            "review_count": 0,
            "consultation_fee": 800,
            "profile_image": format!("https://avatar.iran.liara.run/public/boy?username={}", doctor_id),
            "bio": "Experienced cardiologist",
            "clinic": {
                "name": "Heart Care Clinic",
                "address": "To be updated",
                "city": "Mumbai"
            },
            "skills": ["Echocardiography"],
            "professional_memberships": [],
            "availability": availability
        })
    }

    pub fn appointment_row(
        id: &str,
        patient_id: &str,
        doctor_id: &str,
        date: &str,
        time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "version": 1,
            "patient_id": patient_id,
            "patient_name": "Test User",
            "doctor_id": doctor_id,
            "doctor_name": "Dr. Test Doctor",
            "doctor_specialty": "Cardiology",
            "date": date,
            "time": time,
            "status": status,
            "type": "consultation",
            "fee": 800,
            "created_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn auth_session_response(user_id: &str, email: &str, role: &str) -> serde_json::Value {
        json!({
            "access_token": "mock-access-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "mock-refresh-token",
            "user": {
                "id": user_id,
                "email": email,
                "role": "authenticated",
                "user_metadata": {"full_name": "Test User", "role": role}
            }
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}
