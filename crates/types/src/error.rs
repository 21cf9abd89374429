//! Structured service errors.
//!
//! Every failure that crosses a method-block boundary is expressed as a
//! [`ServiceError`]. A transport maps `status` to its own status codes; an error
//! without a status is treated as a 500.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Status reported for errors that carry no explicit status.
pub const DEFAULT_STATUS: u16 = 500;

/// Optional machine-readable code attached to an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Number(i64),
    Text(String),
}

impl From<i64> for ErrorCode {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ErrorCode {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ErrorCode {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Rich error raised by steps and by the chain executor itself.
///
/// Business errors are built with the canonical constructors
/// ([`ServiceError::forbidden`], [`ServiceError::not_found`], ...) which fill in
/// the status and type. The message defaults to the type name.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ServiceError {
    /// Status associated with the error (HTTP semantics). `None` means 500.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Unique error type, e.g. `Forbidden`, `Validation`, `MiddlewareError`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    /// Diagnostic detail intended for developers.
    #[serde(default)]
    pub debug: Option<Value>,
    /// Field-level errors, typically produced by validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

impl ServiceError {
    /// Create an error with an explicit status and type; the message defaults to the type.
    pub fn new(status: u16, kind: impl Into<String>) -> Self {
        let kind = kind.into();
        Self {
            status: Some(status),
            message: kind.clone(),
            kind,
            code: None,
            debug: None,
            errors: None,
        }
    }

    /// Create an error that carries no status. Transports report it as a 500.
    pub fn unclassified(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: None,
            kind: kind.into(),
            message: message.into(),
            code: None,
            debug: None,
            errors: None,
        }
    }

    pub fn bad_request() -> Self {
        Self::new(400, "BadRequest")
    }

    pub fn unauthorized() -> Self {
        Self::new(401, "Unauthorized")
    }

    pub fn not_logged_in() -> Self {
        Self::new(401, "NotLoggedIn")
    }

    pub fn forbidden() -> Self {
        Self::new(403, "Forbidden")
    }

    pub fn not_found() -> Self {
        Self::new(404, "NotFound")
    }

    /// 404 raised when a lookup produced no usable record.
    pub fn no_results() -> Self {
        Self::new(404, "NoResults")
    }

    pub fn validation() -> Self {
        Self::new(400, "Validation")
    }

    pub fn conflict() -> Self {
        Self::new(409, "Conflict")
    }

    pub fn rate_limited() -> Self {
        Self::new(429, "RateLimited")
    }

    pub fn server() -> Self {
        Self::new(500, "ServerError")
    }

    pub fn unavailable() -> Self {
        Self::new(503, "Unavailable")
    }

    /// Raised by the chain executor when a step produced an uninvoked step.
    pub fn middleware() -> Self {
        Self::new(500, "MiddlewareError")
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<ErrorCode>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_debug(mut self, debug: Value) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Status a transport should report for this error.
    pub fn effective_status(&self) -> u16 {
        self.status.unwrap_or(DEFAULT_STATUS)
    }

    /// Returns `true` when the error is the chain executor's misuse signal.
    pub fn is_middleware_error(&self) -> bool {
        self.kind == "MiddlewareError"
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(error: anyhow::Error) -> Self {
        Self::unclassified("Error", format!("{error:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_constructors_carry_status_and_type() {
        let cases = [
            (ServiceError::bad_request(), 400, "BadRequest"),
            (ServiceError::unauthorized(), 401, "Unauthorized"),
            (ServiceError::forbidden(), 403, "Forbidden"),
            (ServiceError::not_found(), 404, "NotFound"),
            (ServiceError::conflict(), 409, "Conflict"),
            (ServiceError::rate_limited(), 429, "RateLimited"),
            (ServiceError::server(), 500, "ServerError"),
            (ServiceError::unavailable(), 503, "Unavailable"),
        ];
        for (error, status, kind) in cases {
            assert_eq!(error.status, Some(status));
            assert_eq!(error.kind, kind);
            assert_eq!(error.message, kind, "message should default to the type");
        }
    }

    #[test]
    fn missing_status_reports_as_server_error() {
        let error = ServiceError::from(anyhow::anyhow!("boom"));
        assert_eq!(error.status, None);
        assert_eq!(error.effective_status(), 500);
        assert_eq!(error.to_string(), "boom");
    }

    #[test]
    fn serializes_type_field_and_skips_empty_optionals() {
        let error = ServiceError::forbidden()
            .with_message("Insufficient permissions")
            .with_code("E_SCOPE");
        let value = serde_json::to_value(&error).expect("serialize error");
        assert_eq!(
            value,
            json!({
                "status": 403,
                "type": "Forbidden",
                "message": "Insufficient permissions",
                "code": "E_SCOPE",
                "debug": null
            })
        );
    }

    #[test]
    fn deserializes_numeric_codes() {
        let error: ServiceError =
            serde_yaml::from_str("type: Conflict\nmessage: taken\ncode: 11000\n").expect("parse error document");
        assert_eq!(error.code, Some(ErrorCode::Number(11000)));
        assert_eq!(error.effective_status(), 500);
    }
}
