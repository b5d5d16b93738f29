use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_database::{ApiError, SupabaseClient};
use shared_models::auth::{Role, Session};

use crate::models::{AuthError, SignUpResult};
use crate::services::identity::IdentityProvider;

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: String,
    expires_in: Option<i64>,
    user: GoTrueUser,
}

impl GoTrueUser {
    fn display_name(&self) -> String {
        self.user_metadata
            .get("full_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.email.clone())
            .unwrap_or_default()
    }

    fn role(&self) -> Option<Role> {
        self.user_metadata
            .get("role")
            .and_then(Value::as_str)
            .and_then(|r| r.parse().ok())
    }
}

impl GoTrueSession {
    fn into_session(self) -> Session {
        let display_name = self.user.display_name();
        let role = self.user.role();
        Session {
            access_token: self.access_token,
            user_id: self.user.id,
            email: self.user.email.unwrap_or_default(),
            display_name,
            role,
            expires_at: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

/// Hosted identity provider speaking the GoTrue REST API.
pub struct SupabaseIdentityProvider {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseIdentityProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<SignUpResult, AuthError> {
        debug!("Signing up {} as {}", email, role);

        let body = json!({
            "email": email,
            "password": password,
            "data": { "full_name": name, "role": role }
        });

        let response: Value = self
            .supabase
            .request(Method::POST, "/auth/v1/signup", None, Some(body))
            .await
            .map_err(|e| {
                // Provider detail is logged, the caller only sees the generic message
                error!("Sign-up failed for {}: {}", email, e);
                AuthError::SignUpFailed
            })?;

        // With email confirmation enabled the provider answers with the bare user
        if response.get("access_token").is_some() {
            let session: GoTrueSession = serde_json::from_value(response)
                .map_err(|e| AuthError::Provider(e.to_string()))?;
            let user_id = session.user.id.clone();
            let session = Session {
                display_name: name.to_string(),
                role: Some(role),
                ..session.into_session()
            };
            return Ok(SignUpResult {
                user_id,
                display_name: name.to_string(),
                session: Some(session),
            });
        }

        let user = response.get("user").cloned().unwrap_or(response);
        let user: GoTrueUser =
            serde_json::from_value(user).map_err(|e| AuthError::Provider(e.to_string()))?;
        Ok(SignUpResult {
            user_id: user.id,
            display_name: name.to_string(),
            session: None,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        debug!("Signing in {}", email);

        let body = json!({ "email": email, "password": password });
        let session: GoTrueSession = self
            .supabase
            .request(Method::POST, "/auth/v1/token?grant_type=password", None, Some(body))
            .await
            .map_err(|e| {
                error!("Sign-in failed for {}: {}", email, e);
                match e.downcast_ref::<ApiError>() {
                    Some(api) if api.status < 500 => AuthError::SignInFailed,
                    Some(api) => {
                        AuthError::Provider(format!("identity provider returned {}", api.status))
                    }
                    None => AuthError::Provider("identity provider unreachable".to_string()),
                }
            })?;

        Ok(session.into_session())
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        debug!("Signing out {}", session.user_id);

        let _: Value = self
            .supabase
            .request(Method::POST, "/auth/v1/logout", Some(&session.access_token), None)
            .await
            .map_err(|e| {
                error!("Sign-out failed for {}: {}", session.user_id, e);
                AuthError::Provider("Failed to sign out".to_string())
            })?;

        Ok(())
    }
}
