//! Unified error handling with Sentry integration.
//!
//! Every store and client operation returns `Result<T, ClientError>`. The
//! helpers at the bottom keep the Sentry scope in sync with the session so
//! that errors captured by the application carry the current user.

use reqwest::StatusCode;
use thiserror::Error;

use crate::storage::StorageError;

/// Error type for all client operations.
///
/// Callers generally treat every variant as "the request failed". The split
/// exists for logging and for the few places that care about 401s.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: StatusCode, message: String },

    /// Response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Token storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Cart quantities must be positive.
    #[error("Invalid quantity: {0} (must be at least 1)")]
    InvalidQuantity(u32),

    /// A request path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ClientError {
    /// The HTTP status, when the backend answered at all.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }

    /// Whether the backend rejected the credentials (HTTP 401).
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Whether the backend reported a missing resource (HTTP 404).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context.
///
/// Called whenever the auth store learns who is logged in.
pub fn set_sentry_user(user_id: &impl ToString, username: &str, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Called on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a session or cart action.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "42")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ClientError::Api {
            status: StatusCode::NOT_FOUND,
            message: "Cart item not found".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 404 Not Found - Cart item not found");
        assert!(err.is_not_found());
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_unauthorized_detection() {
        let err = ClientError::Api {
            status: StatusCode::UNAUTHORIZED,
            message: "Could not validate credentials".to_string(),
        };
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_local_errors_have_no_status() {
        let err = ClientError::InvalidQuantity(0);
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "Invalid quantity: 0 (must be at least 1)");
    }
}
