//! User and authentication payloads.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use shopfront_core::{Email, UserId};

/// A user profile as returned by `/auth/me` and `/auth/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Backend user ID.
    pub id: UserId,
    /// Email address.
    pub email: Email,
    /// Login name.
    pub username: String,
    /// Display name.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Whether the account is enabled.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

impl User {
    /// Full name when set, otherwise the username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

const fn default_true() -> bool {
    true
}

/// Registration payload.
///
/// The password is only exposed while the request body is serialized.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub email: Email,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(serialize_with = "serialize_secret")]
    pub password: SecretString,
}

impl NewUser {
    #[must_use]
    pub fn new(email: Email, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            email,
            username: username.into(),
            full_name: None,
            password,
        }
    }

    #[must_use]
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Response of `/auth/login`.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(deserialize_with = "deserialize_secret")]
    pub access_token: SecretString,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn deserialize_secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .finish()
    }
}
