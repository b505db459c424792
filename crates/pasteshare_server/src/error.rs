//! HTTP mapping for core errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pasteshare_core::AppError;
use serde_json::json;

/// Handler error: wraps [`AppError`] and renders `{code, message}` JSON.
#[derive(Debug)]
pub struct HttpError(pub AppError);

impl From<AppError> for HttpError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl HttpError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(AppError::BadRequest(message.into()))
    }

    /// Status and stable machine-readable code for the wrapped error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self.0 {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            AppError::WrongPassword => (StatusCode::UNAUTHORIZED, "wrong_password"),
            AppError::ContentExpired => (StatusCode::LOCKED, "content_expired"),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Upload(_) => (StatusCode::INTERNAL_SERVER_ERROR, "upload_failure"),
            AppError::Database(_)
            | AppError::StorageMessage(_)
            | AppError::Serialization(_)
            | AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure"),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self.0 {
            AppError::BadRequest(detail) => format!("invalid request parameter: {}", detail),
            AppError::NotFound => "the requested content does not exist".to_string(),
            AppError::WrongPassword | AppError::ContentExpired => self.0.to_string(),
            AppError::Upload(detail) => {
                tracing::error!("Upload failure: {}", detail);
                "failed to store attachments".to_string()
            }
            other => {
                tracing::error!("Storage failure: {}", other);
                "internal storage error".to_string()
            }
        };

        (status, Json(json!({ "code": code, "message": message }))).into_response()
    }
}
