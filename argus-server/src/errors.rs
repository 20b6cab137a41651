use argus_core::{EngineError, FieldError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Vec<FieldError>>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        });
        if let Some(details) = &self.details {
            body["error"]["fields"] = json!(details);
        }

        (self.status, Json(body)).into_response()
    }
}

// Convert from various error types
impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ValidationFailed(fields) => Self {
                status: StatusCode::BAD_REQUEST,
                message: "validation failed".to_string(),
                details: Some(fields),
            },
            EngineError::Unauthenticated(msg) => Self::unauthorized(msg),
            EngineError::Forbidden(msg) => Self::forbidden(msg),
            EngineError::NotFound(msg) => Self::not_found(msg),
            EngineError::RateLimited(msg) => Self::rate_limited(msg),
            EngineError::RemoteTimeout(msg) => Self::new(StatusCode::GATEWAY_TIMEOUT, msg),
            // RemoteUnavailable has no externally-visible status of its
            // own; callers that surface it report a server error.
            EngineError::RemoteUnavailable(msg)
            | EngineError::StoreUnavailable(msg)
            | EngineError::Internal(msg) => Self::internal(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}
