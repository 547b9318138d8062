use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Every failure that can cross the proxy boundary.
///
/// Provider failures are mapped into one of these kinds before they reach a
/// handler, so the HTTP layer only ever emits the uniform error envelope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("size limit exceeded: {0}")]
    SizeLimit(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("unknown error: {0}")]
    Unknown(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    /// Stable machine-readable kind used in the `error` field of the envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::SizeLimit(_) => "size_limit",
            ApiError::UnsupportedFormat(_) => "unsupported_format",
            ApiError::Provider(_) => "provider_error",
            ApiError::Timeout(_) => "timeout",
            ApiError::Unknown(_) => "unknown_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ApiError::Validation(msg)
            | ApiError::NotFound(msg)
            | ApiError::SizeLimit(msg)
            | ApiError::UnsupportedFormat(msg)
            | ApiError::Provider(msg)
            | ApiError::Timeout(msg)
            | ApiError::Unknown(msg)
            | ApiError::Internal(msg) => msg,
        }
    }

    /// Rebuilds an error from an envelope received over HTTP.
    pub fn from_kind(kind: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match kind {
            "validation_error" => ApiError::Validation(detail),
            "not_found" => ApiError::NotFound(detail),
            "size_limit" => ApiError::SizeLimit(detail),
            "unsupported_format" => ApiError::UnsupportedFormat(detail),
            "provider_error" => ApiError::Provider(detail),
            "timeout" => ApiError::Timeout(detail),
            "internal_error" => ApiError::Internal(detail),
            _ => ApiError::Unknown(detail),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::SizeLimit(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Provider(_) | ApiError::Unknown(_) => StatusCode::BAD_GATEWAY,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(json!({
            "success": false,
            "error": self.kind(),
            "detail": self.detail(),
        }));
        (self.status(), body).into_response()
    }
}
