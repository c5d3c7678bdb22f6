//! Mapping of service outcomes to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use devauth_core::DevAuthError;
use serde_json::json;
use tracing::error;

/// An error response: status, optional `{"error": ...}` body, and the caller's
/// request id when one was supplied.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: Option<String>,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: Some(message.into()), request_id: None }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Status only, no body.
    pub fn bare(status: StatusCode) -> Self {
        Self { status, message: None, request_id: None }
    }

    pub fn with_request_id(mut self, request_id: Option<&str>) -> Self {
        self.request_id = request_id.map(str::to_string);
        self
    }
}

impl From<DevAuthError> for ApiError {
    fn from(err: DevAuthError) -> Self {
        let status = match &err {
            DevAuthError::MalformedInput(_)
            | DevAuthError::Validation(_)
            | DevAuthError::MissingSignature => StatusCode::BAD_REQUEST,
            DevAuthError::SignatureInvalid | DevAuthError::NotEntitled => StatusCode::UNAUTHORIZED,
            DevAuthError::DeviceNotFound | DevAuthError::TokenNotFound => StatusCode::NOT_FOUND,
            DevAuthError::TokenExpired => return Self::bare(StatusCode::FORBIDDEN),
            DevAuthError::TokenInvalid => return Self::bare(StatusCode::UNAUTHORIZED),
            DevAuthError::Internal(cause) => {
                error!(error = ?cause, "Internal failure");
                return Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
            }
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let Some(message) = self.message else {
            return self.status.into_response();
        };
        let body = match self.request_id {
            Some(id) => json!({ "error": message, "request_id": id }),
            None => json!({ "error": message }),
        };
        (self.status, Json(body)).into_response()
    }
}
