//! API error handling
//!
//! Every failure renders as `{ request_id, error: { code, message, details } }`.

use crate::errors::GameError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable classification code (VALIDATION_ERROR, NOT_FOUND, RATE_LIMITED, ...)
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    Game(GameError),
    /// Malformed request that never reached the game core
    BadRequest(String),
    Unauthorized(String),
    RateLimited { retry_after_secs: u64 },
}

impl ApiError {
    pub fn game(request_id: impl Into<String>, error: GameError) -> Self {
        Self {
            kind: ApiErrorKind::Game(error),
            request_id: request_id.into(),
        }
    }

    pub fn bad_request(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message.into()),
            request_id: request_id.into(),
        }
    }

    pub fn unauthorized(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized(message.into()),
            request_id: request_id.into(),
        }
    }

    pub fn rate_limited(request_id: impl Into<String>, retry_after_secs: u64) -> Self {
        Self {
            kind: ApiErrorKind::RateLimited { retry_after_secs },
            request_id: request_id.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.kind {
            ApiErrorKind::Game(error) => match error {
                GameError::Validation(_) | GameError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
                GameError::NotFound(_) => StatusCode::NOT_FOUND,
                GameError::Forbidden(_) => StatusCode::FORBIDDEN,
                GameError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiErrorKind::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiErrorKind::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiErrorKind::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn body(&self) -> ErrorBody {
        let (code, message, details) = match &self.kind {
            // Storage internals stay in the logs
            ApiErrorKind::Game(GameError::Persistence(_)) => (
                "PERSISTENCE_FAILURE",
                "The operation could not be stored; nothing was applied".to_string(),
                None,
            ),
            ApiErrorKind::Game(GameError::InsufficientBalance { required, available }) => (
                "INSUFFICIENT_BALANCE",
                "Insufficient balance".to_string(),
                Some(serde_json::json!({
                    "required": *required as f64 / 100.0,
                    "available": *available as f64 / 100.0,
                })),
            ),
            ApiErrorKind::Game(error) => (error.code(), error.to_string(), None),
            ApiErrorKind::BadRequest(msg) => ("BAD_REQUEST", msg.clone(), None),
            ApiErrorKind::Unauthorized(msg) => ("UNAUTHORIZED", msg.clone(), None),
            ApiErrorKind::RateLimited { retry_after_secs } => (
                "RATE_LIMITED",
                "Too many requests".to_string(),
                Some(serde_json::json!({ "retry_after": retry_after_secs })),
            ),
        };
        ErrorBody {
            code: code.to_string(),
            message,
            details,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::Game(error) => write!(f, "[{}] {}", self.request_id, error),
            ApiErrorKind::BadRequest(msg) => write!(f, "[{}] Bad Request: {}", self.request_id, msg),
            ApiErrorKind::Unauthorized(msg) => write!(f, "[{}] Unauthorized: {}", self.request_id, msg),
            ApiErrorKind::RateLimited { retry_after_secs } => {
                write!(f, "[{}] Rate limited, retry after {}s", self.request_id, retry_after_secs)
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(request_id = %self.request_id, "{}", self);
        }

        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: self.body(),
        });
        let mut response = (status, body).into_response();

        if let ApiErrorKind::RateLimited { retry_after_secs } = self.kind {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (GameError::validation("x"), StatusCode::BAD_REQUEST),
            (
                GameError::InsufficientBalance { required: 2, available: 1 },
                StatusCode::BAD_REQUEST,
            ),
            (GameError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (GameError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (GameError::Persistence("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::game("req", error).status(), status);
        }
        assert_eq!(ApiError::unauthorized("req", "x").status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_persistence_details_are_hidden() {
        let body = ApiError::game("req", GameError::Persistence("rocksdb: disk full".into())).body();
        assert_eq!(body.code, "PERSISTENCE_FAILURE");
        assert!(!body.message.contains("rocksdb"));
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited("req", 42).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }
}
