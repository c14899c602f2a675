//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `SHOPFRONT_API_URL` - Backend base URL (default: `http://localhost:8000/api`)
//! - `SHOPFRONT_REQUEST_TIMEOUT_SECS` - Per-request timeout in seconds (default: none)
//! - `SHOPFRONT_TOKEN_FILE` - Session file used by file-backed storage
//!   (default: `.shopfront/session.json`)
//! - `SHOPFRONT_CLEAR_CART_POLICY` - `local` or `refetch` (default: `local`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::stores::ClearCartPolicy;

/// Default backend location (the API is mounted under `/api`).
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Default location of the session file.
pub const DEFAULT_TOKEN_FILE: &str = ".shopfront/session.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Shopfront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is appended to
    pub api_url: Url,
    /// Optional per-request timeout; `None` waits indefinitely
    pub request_timeout: Option<Duration>,
    /// Where file-backed token storage lives
    pub token_file: PathBuf,
    /// What `clear_cart` does after the server accepts the delete
    pub clear_cart_policy: ClearCartPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "production", "staging")
    pub sentry_environment: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout: None,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            clear_cart_policy: ClearCartPolicy::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = match get_optional_env("SHOPFRONT_API_URL") {
            Some(raw) => parse_api_url(&raw)
                .map_err(|e| ConfigError::InvalidEnvVar("SHOPFRONT_API_URL".to_string(), e))?,
            None => default_api_url(),
        };

        let request_timeout = get_optional_env("SHOPFRONT_REQUEST_TIMEOUT_SECS")
            .map(|raw| parse_timeout(&raw))
            .transpose()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SHOPFRONT_REQUEST_TIMEOUT_SECS".to_string(), e)
            })?;

        let clear_cart_policy = get_optional_env("SHOPFRONT_CLEAR_CART_POLICY")
            .map(|raw| raw.parse::<ClearCartPolicy>())
            .transpose()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPFRONT_CLEAR_CART_POLICY".to_string(), e))?
            .unwrap_or_default();

        Ok(Self {
            api_url,
            request_timeout,
            token_file: PathBuf::from(get_env_or_default("SHOPFRONT_TOKEN_FILE", DEFAULT_TOKEN_FILE)),
            clear_cart_policy,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration pointing at `api_url` with every other field defaulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `api_url` is not an absolute http(s) URL.
    pub fn for_api_url(api_url: &str) -> Result<Self, ConfigError> {
        let api_url = parse_api_url(api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("api_url".to_string(), e))?;
        Ok(Self {
            api_url,
            ..Self::default()
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

#[allow(clippy::expect_used)] // constant input
fn default_api_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("default API URL is valid")
}

/// Parse and normalize the base URL. Trailing slashes are dropped so that
/// request paths (which start with `/`) can be appended directly.
fn parse_api_url(raw: &str) -> Result<Url, String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.cannot_be_a_base() {
        return Err("URL cannot be used as a base".to_string());
    }
    Ok(url)
}

fn parse_timeout(raw: &str) -> Result<Duration, String> {
    let secs = raw.trim().parse::<u64>().map_err(|e| e.to_string())?;
    if secs == 0 {
        return Err("timeout must be at least 1 second".to_string());
    }
    Ok(Duration::from_secs(secs))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}
