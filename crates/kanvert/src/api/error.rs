//! API error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::KanvertError;

use super::types::ErrorResponse;

/// Error returned by API handlers, rendered as an [`ErrorResponse`] body.
#[derive(Debug)]
pub enum ApiError {
    /// 400: the request was malformed or no converter could serve it.
    Validation(KanvertError),
    /// 401: the API key header is missing or wrong.
    Unauthorized,
    /// 413: `content` exceeds the configured limit.
    PayloadTooLarge { limit: usize },
    /// 429: the client used up its requests for the current window.
    RateLimited { limit: u32 },
    /// 500: the converter ran and reported failure.
    ConversionFailed { job_id: String, message: String },
    /// 500: anything else.
    Internal(KanvertError),
}

impl ApiError {
    pub fn validation(error: KanvertError) -> Self {
        Self::Validation(error)
    }

    pub fn internal(error: KanvertError) -> Self {
        Self::Internal(error)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ConversionFailed { .. } | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorResponse {
        let (error_type, message, job_id) = match self {
            ApiError::Validation(e) | ApiError::Internal(e) => (e.kind().to_string(), e.message(), None),
            ApiError::Unauthorized => ("Unauthorized".to_string(), "Invalid or missing API key".to_string(), None),
            ApiError::RateLimited { limit } => (
                "RateLimitExceeded".to_string(),
                format!("Rate limit of {} requests per minute exceeded", limit),
                None,
            ),
            ApiError::PayloadTooLarge { limit } => (
                "PayloadTooLarge".to_string(),
                format!("Content size exceeds maximum limit of {} bytes", limit),
                None,
            ),
            ApiError::ConversionFailed { job_id, message } => {
                ("ConversionFailed".to_string(), message.clone(), Some(job_id.clone()))
            }
        };

        ErrorResponse {
            error_type,
            message,
            job_id,
            status_code: self.status_code().as_u16(),
        }
    }
}

impl From<KanvertError> for ApiError {
    fn from(error: KanvertError) -> Self {
        match error {
            KanvertError::Validation { .. } => ApiError::Validation(error),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.body();
        if status.is_server_error() {
            tracing::error!(error_type = %body.error_type, message = %body.message, "Request failed");
        } else {
            tracing::warn!(error_type = %body.error_type, message = %body.message, "Request rejected");
        }
        (status, Json(body)).into_response()
    }
}
