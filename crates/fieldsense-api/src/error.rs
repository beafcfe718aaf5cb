use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fieldsense_core::error::{ErrorCategory, FieldsenseError};
use serde::Serialize;

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub category: ErrorCategory,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            category: ErrorCategory::InvalidInput,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    category: ErrorCategory,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: "error",
            category: self.category,
            error: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<FieldsenseError> for ApiError {
    fn from(err: FieldsenseError) -> Self {
        let category = err.category();
        let (status, message) = match category {
            ErrorCategory::NoData => (StatusCode::UNPROCESSABLE_ENTITY, "No usable imagery"),
            ErrorCategory::Computation => (StatusCode::INTERNAL_SERVER_ERROR, "Analysis failed"),
            ErrorCategory::Storage => (StatusCode::SERVICE_UNAVAILABLE, "Metadata store unavailable"),
            ErrorCategory::InvalidInput => (StatusCode::BAD_REQUEST, "Invalid request"),
        };

        Self {
            status,
            category,
            message: message.to_string(),
            details: Some(err.to_string()),
        }
    }
}
