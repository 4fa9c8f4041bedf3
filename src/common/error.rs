//! Error types for fedplane

use crate::director::overrides::DisabledReason;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Request Errors ===
    #[error("{0}")]
    Validation(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    // === Override Errors ===
    #[error("{message}")]
    Conflict {
        reason: DisabledReason,
        message: String,
    },

    // === Lookup Errors ===
    #[error("No namespace prefix matches path: {0}")]
    NoPrefixMatch(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Absence that callers may cache as a hard negative.
    pub fn is_cacheable_negative(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::NoPrefixMatch(_))
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::Validation(_) | Error::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) | Error::NoPrefixMatch(_) => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

/// JSON error body: `{"status":"error","msg":..}`, plus `reason` for conflicts
impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.to_http_status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let mut body = serde_json::json!({
            "status": "error",
            "msg": self.to_string(),
        });
        if let Error::Conflict { reason, .. } = &self {
            body["reason"] = serde_json::json!(reason);
        }
        (status, axum::Json(body)).into_response()
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            Error::Validation("bad".into()).to_http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::InvalidParameter("min".into()).to_http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::NoPrefixMatch("/a".into()).to_http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Conflict {
                reason: DisabledReason::TempDisabled,
                message: "already disabled".into(),
            }
            .to_http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Auth("missing".into()).to_http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::Internal("boom".into()).to_http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_cacheable_negative() {
        assert!(Error::NotFound("x".into()).is_cacheable_negative());
        assert!(Error::NoPrefixMatch("x".into()).is_cacheable_negative());
        assert!(!Error::Timeout("x".into()).is_cacheable_negative());
        assert!(!Error::Http("x".into()).is_cacheable_negative());
    }
}
