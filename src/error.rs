//! The error taxonomy for the API and its JSON rendering.
//!
//! Every failure surfaces immediately as one of the variants below; there is
//! no retry logic anywhere in the request path. Database errors for unique
//! constraint violations are normalized into conflicts so duplicate emails
//! and duplicate applications render the same way.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::util;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid token")]
    Unauthorized,
    #[error("token expired, please log in again")]
    TokenExpired,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("database error")]
    Database(sqlx::Error),
    #[error("server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::TokenExpired => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The underlying detail, only rendered outside production.
    fn stack(&self) -> Option<String> {
        match self {
            ApiError::Database(error) => Some(format!("{:?}", error)),
            ApiError::Internal(error) => Some(format!("{:?}", error)),
            _ => None,
        }
    }
}

/// Whether the error is Postgres' unique_violation (code 23505).
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error.code().as_deref() == Some("23505"),
        _ => false,
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> Self {
        if is_unique_violation(&error) {
            ApiError::Conflict("duplicate value for a unique field".to_owned())
        } else {
            ApiError::Database(error)
        }
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(error: bcrypt::BcryptError) -> Self {
        ApiError::Internal(anyhow::anyhow!("Failed to process password: {}", error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, detail = ?self.stack(), "request failed");
        }

        let mut body = json!({
            "success": false,
            "message": self.to_string(),
        });
        if !util::in_production() {
            if let Some(stack) = self.stack() {
                body["stack"] = json!(stack);
            }
        }

        (status, Json(body)).into_response()
    }
}
