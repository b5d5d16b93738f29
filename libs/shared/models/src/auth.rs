use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Role tag written to `users/{uid}` at registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Role from the token claim, or from `user_metadata.role` for hosted tokens
    /// whose claim is the generic `authenticated`.
    pub fn role(&self) -> Option<Role> {
        self.role
            .as_deref()
            .and_then(|r| r.parse().ok())
            .or_else(|| {
                self.metadata
                    .as_ref()
                    .and_then(|m| m.get("role"))
                    .and_then(|v| v.as_str())
                    .and_then(|r| r.parse().ok())
            })
    }

    pub fn is_doctor(&self) -> bool {
        self.role() == Some(Role::Doctor)
    }

    /// Display name carried in the token metadata, falling back to the email.
    pub fn display_name(&self) -> Option<String> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("full_name").or_else(|| m.get("name")))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| self.email.clone())
    }
}

/// An authenticated session as issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub role: Option<Role>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(role: Option<&str>, metadata: Option<serde_json::Value>) -> User {
        User {
            id: "u-1".to_string(),
            email: Some("jane@example.com".to_string()),
            role: role.map(str::to_string),
            metadata,
            created_at: None,
        }
    }

    #[test]
    fn role_is_parsed_from_token_claim() {
        assert_eq!(user(Some("doctor"), None).role(), Some(Role::Doctor));
        assert!(user(Some("doctor"), None).is_doctor());
        assert_eq!(user(Some("authenticated"), None).role(), None);
    }

    #[test]
    fn role_falls_back_to_metadata() {
        let hosted = user(Some("authenticated"), Some(json!({"role": "patient"})));
        assert_eq!(hosted.role(), Some(Role::Patient));
    }

    #[test]
    fn display_name_prefers_metadata() {
        let named = user(None, Some(json!({"full_name": "Jane Roe"})));
        assert_eq!(named.display_name().as_deref(), Some("Jane Roe"));

        let unnamed = user(None, None);
        assert_eq!(unnamed.display_name().as_deref(), Some("jane@example.com"));
    }
}
