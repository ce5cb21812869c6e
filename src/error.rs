//! Error handling for the recipe API client

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Coarse classification of an [`ApiError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport failure, no response received
    Network,
    /// Non-2xx response
    Http,
    /// Malformed or unexpected response body
    Decode,
    /// Token refresh cycle exhausted
    Auth,
    /// Invalid base URL or request path
    Url,
    /// Persisted token storage failure
    Storage,
}

/// Unified error type for the recipe API client
///
/// Errors are `Clone` so a single failure captured by the query cache can be handed
/// to every reader of the same key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Transport failure (connection refused, DNS, timeout)
    #[error("Network error: {message}")]
    Network { message: String },

    /// Non-2xx response from the API
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body did not have the expected shape
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Authentication could not be recovered by refreshing the token
    #[error("Authentication error: {message}")]
    Auth { status: Option<u16>, message: String },

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(String),

    /// Token storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Authentication failures share the API error taxonomy
pub type AuthError = ApiError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Create a new network error
    pub fn network<T: fmt::Display>(msg: T) -> Self {
        ApiError::Network {
            message: msg.to_string(),
        }
    }

    /// Create a new HTTP error
    pub fn http<T: fmt::Display>(status: u16, msg: T) -> Self {
        ApiError::Http {
            status,
            message: msg.to_string(),
        }
    }

    /// Create a new decode error
    pub fn decode<T: fmt::Display>(msg: T) -> Self {
        ApiError::Decode {
            message: msg.to_string(),
        }
    }

    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(status: Option<u16>, msg: T) -> Self {
        ApiError::Auth {
            status,
            message: msg.to_string(),
        }
    }

    /// Create a new storage error
    pub fn storage<T: fmt::Display>(msg: T) -> Self {
        ApiError::Storage(msg.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::Http { .. } => ErrorKind::Http,
            ApiError::Decode { .. } => ErrorKind::Decode,
            ApiError::Auth { .. } => ErrorKind::Auth,
            ApiError::Url(_) => ErrorKind::Url,
            ApiError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// The HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Auth { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether a read may be retried after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network { .. } => true,
            ApiError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Http { status: 401, .. })
    }

    /// Build an HTTP error from a status and raw response body
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        ApiError::http(status, server_message(body))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::decode(err)
        } else if let Some(status) = err.status() {
            ApiError::http(status.as_u16(), err)
        } else {
            ApiError::network(err)
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::decode(err)
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::Url(err.to_string())
    }
}

/// Extract a human readable message from an error envelope.
///
/// Handles `{"error": ..}`, `{"detail": ..}`, `{"message": ..}` and field error maps
/// such as `{"username": ["already exists"]}`.
fn server_message(body: &str) -> String {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return body.trim().to_string(),
    };

    for field in ["error", "detail", "message"] {
        if let Some(msg) = value.get(field).and_then(Value::as_str) {
            return msg.to_string();
        }
    }

    if let Value::Object(map) = &value {
        let mut parts = Vec::new();
        for (field, errors) in map {
            match errors {
                Value::Array(items) => {
                    let joined = items
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(" ");
                    parts.push(format!("{}: {}", field, joined));
                }
                Value::String(msg) => parts.push(format!("{}: {}", field, msg)),
                _ => {}
            }
        }
        if !parts.is_empty() {
            return parts.join("; ");
        }
    }

    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_messages() {
        assert_eq!(server_message(r#"{"error": "Recipe not found"}"#), "Recipe not found");
        assert_eq!(
            server_message(r#"{"detail": "Given token not valid"}"#),
            "Given token not valid"
        );
        assert_eq!(
            server_message(r#"{"username": ["Username already exists"]}"#),
            "username: Username already exists"
        );
        assert_eq!(server_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_kind_and_status() {
        let err = ApiError::from_response(404, r#"{"error": "Recipe not found"}"#);
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_retryable());

        assert!(ApiError::http(503, "unavailable").is_retryable());
        assert!(ApiError::network("connection refused").is_retryable());
        assert!(!ApiError::decode("missing field").is_retryable());
        assert_eq!(ApiError::auth(Some(401), "expired").status(), Some(401));
    }
}
