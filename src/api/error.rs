//! API error types with structured JSON responses.

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core_state::CoreError;
use crate::error::ServiceError;

/// Structured error response body: `{code, message}` plus lockout details on 429.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_attempts: Option<u32>,
    #[serde(flatten)]
    pub lockout: Option<LockoutDetail>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockoutDetail {
    pub time_remaining: u64,
    pub attempts: u32,
    pub max_attempts: u32,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Too many failed attempts")]
    RateLimited {
        retry_after: u64,
        attempts: u32,
        max_attempts: u32,
    },
    #[error("Invalid credentials")]
    InvalidCredentials { remaining_attempts: u32 },
    #[error("Email already registered")]
    EmailTaken,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Sesión inválida o expirada".to_string(),
            ),
            ApiError::RateLimited { retry_after, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Demasiados intentos fallidos. Intente de nuevo en {retry_after}s"),
            ),
            ApiError::InvalidCredentials { remaining_attempts } => (
                StatusCode::BAD_REQUEST,
                "INVALID_CREDENTIALS",
                format!("Credenciales inválidas. Intentos restantes: {remaining_attempts}"),
            ),
            ApiError::EmailTaken => (
                StatusCode::BAD_REQUEST,
                "EMAIL_TAKEN",
                ServiceError::EmailTaken.to_string(),
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail.clone()),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Ocurrió un error interno".to_string(),
                )
            }
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone()),
        };

        let body = ErrorBody {
            code,
            message,
            remaining_attempts: match &self {
                ApiError::InvalidCredentials { remaining_attempts } => Some(*remaining_attempts),
                _ => None,
            },
            lockout: match &self {
                ApiError::RateLimited {
                    retry_after,
                    attempts,
                    max_attempts,
                } => Some(LockoutDetail {
                    time_remaining: *retry_after,
                    attempts: *attempts,
                    max_attempts: *max_attempts,
                }),
                _ => None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after, .. } = &self {
            if let Ok(val) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::BadRequest(msg),
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::EmailTaken => ApiError::EmailTaken,
            ServiceError::InvalidCredentials { remaining_attempts } => {
                ApiError::InvalidCredentials { remaining_attempts }
            }
            ServiceError::RateLimited(locked) => ApiError::RateLimited {
                retry_after: locked.seconds_remaining,
                attempts: locked.attempts,
                max_attempts: locked.max_attempts,
            },
            ServiceError::Unauthorized => ApiError::Unauthorized,
            ServiceError::Database(e) => ApiError::Internal(e.to_string()),
            ServiceError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Cuerpo JSON inválido: {}", rejection.body_text()))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {err}"))
    }
}
