//! # Error Handling
//!
//! This module defines the error types of the gateway and how HTTP-facing
//! errors are converted to responses.
//!
//! ## Two families of errors:
//! - **AppError**: failures of an HTTP request (a missing static file, a
//!   method the front door does not serve). These become JSON responses via
//!   actix's `ResponseError`.
//! - **InboundError**: a WebSocket message that could not be decoded. These
//!   are logged and counted where they happen and never reach the peer.
//!
//! ## Key Rust Concepts for Error Handling:
//! - **thiserror**: derives `Display` and `std::error::Error` from the
//!   `#[error(...)]` attributes, so each variant documents its own message
//! - **#[from]**: generates `From` impls so `?` converts library errors into our types

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Errors returned from HTTP handlers.
///
/// ## HTTP Status Code Mapping:
/// - NotFound → 404 (Not Found)
/// - MethodNotAllowed → 405 (Method Not Allowed)
#[derive(Debug, Error)]
pub enum AppError {
    /// Requested resource (usually a static file) was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Only GET and HEAD are served outside the API routes
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::MethodNotAllowed(_) => "method_not_allowed",
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::NotFound(msg) | AppError::MethodNotAllowed(msg) => msg,
        }
    }
}

/// Renders every error with the same JSON shape:
/// ```json
/// {
///   "error": {
///     "type": "not_found",
///     "message": "File not found: /missing.js",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": self.kind(),
                "message": self.message(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// A WebSocket message that could not be decoded.
///
/// This is the only error the ingress recognises. It is recovered where it
/// occurs: logged, counted, and the connection carries on.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary frame is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_not_found_renders_json_body() {
        let err = AppError::NotFound("File not found: /nope.css".to_string());
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["type"], "not_found");
        assert_eq!(value["error"]["message"], "File not found: /nope.css");
        assert!(value["error"]["timestamp"].is_string());
    }

    #[test]
    fn test_method_not_allowed_status() {
        let err = AppError::MethodNotAllowed("POST /index.html".into());
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.to_string(), "Method not allowed: POST /index.html");
    }

    #[test]
    fn test_inbound_error_display() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = InboundError::from(parse_err);
        assert!(err.to_string().starts_with("invalid JSON"));
    }
}
