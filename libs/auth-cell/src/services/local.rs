use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_database::{DocumentStore, StoreError};
use shared_models::auth::{JwtClaims, Role, Session};
use shared_utils::jwt::issue_token;

use crate::models::{AuthError, SignUpResult};
use crate::services::identity::IdentityProvider;

const CREDENTIALS_COLLECTION: &str = "credentials";
const TOKEN_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
struct Credential {
    user_id: String,
    name: String,
    role: Role,
    password_hash: String,
}

/// Identity provider for the in-memory backend: argon2 password hashes kept in
/// the document store, HS256 session tokens signed with the app JWT secret.
pub struct LocalIdentityProvider {
    store: Arc<dyn DocumentStore>,
    jwt_secret: String,
}

impl LocalIdentityProvider {
    pub fn new(store: Arc<dyn DocumentStore>, jwt_secret: &str) -> Self {
        Self {
            store,
            jwt_secret: jwt_secret.to_string(),
        }
    }

    fn hash_password(password: &str) -> Result<String, AuthError> {
        let mut salt_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Provider(e.to_string()))
    }

    fn verify_password(password: &str, stored_hash: &str) -> bool {
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                error!("Stored password hash is unreadable: {}", e);
                false
            }
        }
    }

    fn issue_session(
        &self,
        user_id: &str,
        email: &str,
        name: &str,
        role: Role,
    ) -> Result<Session, AuthError> {
        let now = Utc::now().timestamp();
        let exp = now + TOKEN_TTL_SECONDS;
        let claims = JwtClaims {
            sub: user_id.to_string(),
            exp: Some(exp as u64),
            email: Some(email.to_string()),
            role: Some(role.as_str().to_string()),
            app_metadata: None,
            user_metadata: Some(json!({"full_name": name, "role": role})),
            aud: Some("authenticated".to_string()),
            iat: Some(now as u64),
        };

        let access_token = issue_token(&claims, &self.jwt_secret).map_err(AuthError::Provider)?;

        Ok(Session {
            access_token,
            user_id: user_id.to_string(),
            email: email.to_string(),
            display_name: name.to_string(),
            role: Some(role),
            expires_at: Utc.timestamp_opt(exp, 0).single(),
        })
    }
}

fn credential_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<SignUpResult, AuthError> {
        let key = credential_key(email);
        let user_id = Uuid::new_v4().to_string();
        let credential = Credential {
            user_id: user_id.clone(),
            name: name.to_string(),
            role,
            password_hash: Self::hash_password(password)?,
        };
        let data = serde_json::to_value(&credential)
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        match self.store.create(CREDENTIALS_COLLECTION, Some(&key), data).await {
            Ok(_) => {}
            Err(StoreError::AlreadyExists(_)) => {
                warn!("Sign-up rejected, account already exists for {}", key);
                return Err(AuthError::SignUpFailed);
            }
            Err(e) => return Err(e.into()),
        }

        debug!("Created local account {} for {}", user_id, key);
        let session = self.issue_session(&user_id, &key, name, role)?;
        Ok(SignUpResult {
            user_id,
            display_name: name.to_string(),
            session: Some(session),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let key = credential_key(email);
        let Some(doc) = self.store.get(CREDENTIALS_COLLECTION, &key).await? else {
            debug!("No local account for {}", key);
            return Err(AuthError::SignInFailed);
        };

        let credential: Credential = serde_json::from_value(doc.data)
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if !Self::verify_password(password, &credential.password_hash) {
            debug!("Password mismatch for {}", key);
            return Err(AuthError::SignInFailed);
        }

        self.issue_session(&credential.user_id, &key, &credential.name, credential.role)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        // Local tokens are stateless and simply expire
        debug!("Signed out local session for {}", session.user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_database::InMemoryStore;
    use shared_utils::jwt::validate_token;

    const SECRET: &str = "local-provider-secret";

    fn provider() -> LocalIdentityProvider {
        LocalIdentityProvider::new(Arc::new(InMemoryStore::new()), SECRET)
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let provider = provider();
        let result = provider
            .sign_up("Meera Shah", "Meera@Example.com", "secret1", Role::Doctor)
            .await
            .unwrap();
        assert_eq!(result.display_name, "Meera Shah");

        let session = provider.sign_in("meera@example.com", "secret1").await.unwrap();
        assert_eq!(session.user_id, result.user_id);
        assert_eq!(session.role, Some(Role::Doctor));

        let user = validate_token(&session.access_token, SECRET).unwrap();
        assert!(user.is_doctor());
    }

    #[tokio::test]
    async fn duplicate_email_fails_sign_up() {
        let provider = provider();
        provider.sign_up("A", "a@example.com", "secret1", Role::Patient).await.unwrap();

        let again = provider.sign_up("B", "a@example.com", "secret2", Role::Patient).await;
        assert_matches!(again, Err(AuthError::SignUpFailed));
    }

    #[tokio::test]
    async fn wrong_password_or_unknown_email_fails_sign_in() {
        let provider = provider();
        provider.sign_up("A", "a@example.com", "secret1", Role::Patient).await.unwrap();

        let wrong_password = provider.sign_in("a@example.com", "nope").await;
        assert_matches!(wrong_password, Err(AuthError::SignInFailed));
        let unknown_email = provider.sign_in("b@example.com", "secret1").await;
        assert_matches!(unknown_email, Err(AuthError::SignInFailed));
    }
}
