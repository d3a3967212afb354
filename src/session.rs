use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which portal a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn login_path(self) -> &'static str {
        match self {
            Role::User => "/api/login",
            Role::Admin => "/api/admin/login",
        }
    }

    /// Only the admin portal notifies the backend on logout.
    pub fn logout_path(self) -> Option<&'static str> {
        match self {
            Role::User => None,
            Role::Admin => Some("/api/admin/logout"),
        }
    }

    /// Legacy browser storage keys: `(token_key, profile_key)`.
    pub fn storage_keys(self) -> (&'static str, &'static str) {
        match self {
            Role::User => ("user_token", "user_data"),
            Role::Admin => ("admin_token", "admin_user"),
        }
    }

    /// The two portals name their credential fields differently.
    pub fn login_body(self, email: &str, password: &str) -> Value {
        match self {
            Role::User => serde_json::json!({
                "email_utilisateur": email,
                "password_utilisateur": password,
            }),
            Role::Admin => serde_json::json!({
                "email": email,
                "password": password,
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

/// An authenticated session against the fleet backend.
///
/// `expires_at` and `refresh_token` are carried for backends that issue
/// them; the current backend only returns a token and a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub role: Role,
    pub token: String,
    pub profile: Value,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Body returned by both login endpoints.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user: Value,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl SessionContext {
    pub fn from_login(role: Role, response: LoginResponse, now: DateTime<Utc>) -> Self {
        Self {
            role,
            token: response.token,
            profile: response.user,
            issued_at: now,
            expires_at: response
                .expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| now + Duration::seconds(secs)),
            refresh_token: response.refresh_token,
        }
    }

    /// Session rebuilt from a bearer token presented on a request.
    pub fn from_token(role: Role, token: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            role,
            token: token.into(),
            profile: Value::Null,
            issued_at: now,
            expires_at: None,
            refresh_token: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn storage_keys(&self) -> (&'static str, &'static str) {
        self.role.storage_keys()
    }
}
