use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::StoreBackend;
use shared_database::{DocumentStore, StoreError};
use shared_models::auth::{Role, Session, User};
use shared_utils::jwt::validate_token;
use shared_utils::AppState;

use crate::models::{
    landing_route, AuthError, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    MIN_PASSWORD_LENGTH, PASSWORD_TOO_SHORT,
};
use crate::services::identity::IdentityProvider;
use crate::services::local::LocalIdentityProvider;
use crate::services::session::{SessionEvent, SessionObserver};
use crate::services::supabase::SupabaseIdentityProvider;

pub const USERS_COLLECTION: &str = "users";

fn is_valid_email(email: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok()
    });

    email.len() <= 254 && pattern.as_ref().is_some_and(|re| re.is_match(email))
}

/// Sign-up, sign-in and sign-out against the identity provider, publishing
/// every change on one session stream.
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    sessions: SessionObserver,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(state: &AppState) -> Self {
        let provider: Arc<dyn IdentityProvider> = match state.config.store_backend {
            StoreBackend::Memory => Arc::new(LocalIdentityProvider::new(
                state.store.clone(),
                &state.config.supabase_jwt_secret,
            )),
            StoreBackend::Supabase => Arc::new(SupabaseIdentityProvider::new(&state.config)),
        };
        Self::with_provider(state, provider)
    }

    pub fn with_provider(state: &AppState, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            store: state.store.clone(),
            sessions: SessionObserver::new(),
            jwt_secret: state.config.supabase_jwt_secret.clone(),
        }
    }

    pub fn sessions(&self) -> &SessionObserver {
        &self.sessions
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    fn validate_registration(request: &RegisterRequest) -> Result<(), AuthError> {
        if request.name.trim().is_empty() {
            return Err(AuthError::Validation("Please enter your full name.".to_string()));
        }
        if !is_valid_email(request.email.trim()) {
            return Err(AuthError::Validation("Please enter a valid email address.".to_string()));
        }
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(PASSWORD_TOO_SHORT.to_string()));
        }
        Ok(())
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, AuthError> {
        Self::validate_registration(&request)?;
        let name = request.name.trim();
        let email = request.email.trim();
        debug!("Registering {} as {}", email, request.role);

        let result = self
            .provider
            .sign_up(name, email, &request.password, request.role)
            .await?;

        let record = json!({
            "name": name,
            "email": email,
            "role": request.role,
            "created_at": null,
        });
        match self.store.create(USERS_COLLECTION, Some(&result.user_id), record.clone()).await {
            Ok(_) => {}
            Err(StoreError::AlreadyExists(_)) => {
                warn!("users/{} already existed, overwriting role document", result.user_id);
                self.store.set(USERS_COLLECTION, &result.user_id, record).await?;
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(session) = &result.session {
            self.sessions.publish(SessionEvent::LoggedIn(session.clone()));
        }

        info!("Registered user {} with role {}", result.user_id, request.role);
        Ok(RegisterResponse {
            user_id: result.user_id,
            display_name: result.display_name,
            role: request.role,
            session: result.session,
            redirect_to: landing_route(request.role, true).to_string(),
        })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation("Please enter your email and password.".to_string()));
        }

        let mut session = self.provider.sign_in(request.email.trim(), &request.password).await?;

        if session.role.is_none() {
            session.role = self.stored_role(&session.user_id).await?;
        }
        let role = session.role.unwrap_or(Role::Patient);

        self.sessions.publish(SessionEvent::LoggedIn(session.clone()));
        info!("User {} signed in", session.user_id);

        Ok(LoginResponse {
            session,
            redirect_to: landing_route(role, false).to_string(),
        })
    }

    /// Ends the session carried by `token`.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let user = validate_token(token, &self.jwt_secret).map_err(|e| {
            debug!("Logout with unusable token: {}", e);
            AuthError::InvalidSession
        })?;

        let session = session_from_user(&user, token);
        self.provider.sign_out(&session).await?;
        self.sessions.publish(SessionEvent::LoggedOut);

        info!("User {} signed out", user.id);
        Ok(())
    }

    async fn stored_role(&self, user_id: &str) -> Result<Option<Role>, AuthError> {
        let doc = self.store.get(USERS_COLLECTION, user_id).await?;
        Ok(doc
            .as_ref()
            .and_then(|d| d.field("role"))
            .and_then(|v| v.as_str())
            .and_then(|r| r.parse().ok()))
    }
}

fn session_from_user(user: &User, token: &str) -> Session {
    Session {
        access_token: token.to_string(),
        user_id: user.id.clone(),
        email: user.email.clone().unwrap_or_default(),
        display_name: user.display_name().unwrap_or_default(),
        role: user.role(),
        expires_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_utils::test_utils::TestConfig;

    fn service() -> AuthService {
        AuthService::new(&AppState::in_memory(TestConfig::default().to_app_config()))
    }

    fn request(name: &str, email: &str, password: &str, role: Role) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_sign_up() {
        let result = service()
            .register(request("Anil", "anil@example.com", "12345", Role::Patient))
            .await;
        assert_matches!(result, Err(AuthError::Validation(msg)) if msg == PASSWORD_TOO_SHORT);
    }

    #[tokio::test]
    async fn malformed_email_is_rejected() {
        let result = service()
            .register(request("Anil", "anil-at-example", "123456", Role::Patient))
            .await;
        assert_matches!(result, Err(AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn doctor_registration_writes_role_and_points_to_onboarding() {
        let service = service();
        let response = service
            .register(request("Dr. Sen", "sen@example.com", "123456", Role::Doctor))
            .await
            .unwrap();

        assert_eq!(response.redirect_to, "/doctor/onboarding");
        let doc = service.store.get(USERS_COLLECTION, &response.user_id).await.unwrap().unwrap();
        assert_eq!(doc.data["role"], "doctor");
        assert!(doc.data["created_at"].is_string());
        assert_matches!(service.sessions().current(), SessionEvent::LoggedIn(_));
    }

    #[tokio::test]
    async fn login_and_logout_drive_the_session_stream() {
        let service = service();
        service
            .register(request("Anil", "anil@example.com", "123456", Role::Patient))
            .await
            .unwrap();

        let login = service
            .login(LoginRequest {
                email: "anil@example.com".to_string(),
                password: "123456".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(login.redirect_to, "/dashboard");

        service.logout(&login.session.access_token).await.unwrap();
        assert_eq!(service.sessions().current(), SessionEvent::LoggedOut);
    }
}
