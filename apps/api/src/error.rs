//! # API Error Type
//!
//! Every failure a handler can hit ends up here and leaves as an envelope.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Flashmart                              │
//! │                                                                         │
//! │  Handler                                                                │
//! │  Result<ApiResponse<T>, ApiError>                                       │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  CoreError ──────► NotFound / BadRequest (message shown verbatim)      │
//! │  DbError::Domain ─┘                                                     │
//! │  DbError (other) ─► Internal (details logged, generic message sent)    │
//! │  JsonRejection ───► BadRequest                                          │
//! │  AuthUser ────────► Unauthorized / Forbidden                            │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  HTTP status + { "success": false, "message": "..." }                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::response::ApiResponse;
use flashmart_core::{CoreError, ValidationError};
use flashmart_db::DbError;

/// Message sent for every 500.
const INTERNAL_MESSAGE: &str = "Internal server error";

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// Detail for the log; the client only sees a generic message.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else {
            ApiError::BadRequest(err.to_string())
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => core.into(),
            DbError::NotFound { entity, .. } => ApiError::NotFound(format!("{} not found", entity)),
            DbError::UniqueViolation { field, .. } => {
                ApiError::BadRequest(format!("{} already exists", field))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// `Json<T>` whose rejection is an [`ApiError`], so malformed bodies also
/// get the envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(detail) => {
                error!(error = %detail, "Request failed");
                INTERNAL_MESSAGE.to_string()
            }
            ApiError::NotFound(m)
            | ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m) => m,
        };

        (status, ApiResponse::error(message)).into_response()
    }
}
