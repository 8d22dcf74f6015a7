use crate::{
    access::AccessDenied,
    services::{DataError, identity_service::AuthError, storage_service::StorageError},
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error. The detail is logged, not returned.
    pub fn internal(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!("internal error: {}", msg);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 401 Unauthorized
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
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
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<AccessDenied> for AppError {
    fn from(err: AccessDenied) -> Self {
        tracing::debug!("{}", err);
        AppError::new(StatusCode::FORBIDDEN, "access denied")
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::new(StatusCode::BAD_REQUEST, err.to_string()),
            AuthError::EmailTaken => AppError::new(StatusCode::CONFLICT, err.to_string()),
            AuthError::InvalidEmail | AuthError::WeakPassword => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::TokenExpired => {
                AppError::unauthorized(err.to_string())
            }
            AuthError::Provisioning(_)
            | AuthError::Hash(_)
            | AuthError::Token(_)
            | AuthError::Sqlx(_) => AppError::internal(err.to_string()),
        }
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Denied(denied) => denied.into(),
            DataError::NotFound(_) => AppError::not_found(err.to_string()),
            DataError::Invalid { .. } => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            DataError::Sqlx(_) => AppError::internal(err.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Denied(denied) => denied.into(),
            StorageError::BucketNotFound(_) | StorageError::ObjectNotFound { .. } => {
                AppError::not_found(err.to_string())
            }
            StorageError::InvalidBucketName { .. } | StorageError::InvalidObjectKey => {
                AppError::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            StorageError::Duplicate { .. } => AppError::new(StatusCode::CONFLICT, err.to_string()),
            StorageError::Sqlx(_) | StorageError::Io(_) => AppError::internal(err.to_string()),
        }
    }
}
