use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use taskdeck_shared::{Envelope, ErrorBody, FieldDetail, ValidationErrors};
use taskdeck_store::StoreError;

/// Every failure a handler can report. Rendered as the error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[allow(dead_code)]
    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{label} with this {field} already exists")]
    Conflict { label: &'static str, field: String },

    #[error("Too many requests, please try again later")]
    RateLimited,

    #[error("Service temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// The underlying cause of an error response, attached as a response
/// extension. Only surfaced to clients outside production.
#[derive(Debug, Clone)]
pub struct ErrorDiagnostics(pub String);

impl ApiError {
    /// Map a storage failure, naming the entity involved.
    pub fn from_store(err: StoreError, label: &'static str) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound(label),
            StoreError::UniqueViolation { field, .. } => ApiError::Conflict { label, field },
            StoreError::ForeignKeyViolation { table } => {
                ApiError::BadRequest(format!("Referenced record does not exist ({table})"))
            }
            StoreError::Connection(msg) => ApiError::Unavailable(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ApiError::Conflict { .. } => "CONFLICT",
            ApiError::RateLimited => "RATE_LIMITED",
            ApiError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn body(&self) -> ErrorBody {
        let (message, details) = match self {
            ApiError::Validation(errors) => (
                self.to_string(),
                errors.0.iter().cloned().map(FieldDetail::from).collect(),
            ),
            ApiError::Conflict { field, .. } => (
                self.to_string(),
                vec![FieldDetail {
                    field: field.clone(),
                    message: "already exists".to_string(),
                }],
            ),
            // Causes stay in the diagnostics extension.
            ApiError::Unavailable(_) => ("Service temporarily unavailable".to_string(), Vec::new()),
            ApiError::Internal(_) => ("Internal server error".to_string(), Vec::new()),
            _ => (self.to_string(), Vec::new()),
        };
        ErrorBody {
            code: self.code().to_string(),
            message,
            details,
            stack: None,
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(cause) => tracing::error!(error = %cause, "request failed"),
            ApiError::Unavailable(cause) => tracing::warn!(error = %cause, "storage unavailable"),
            _ => tracing::debug!(code = self.code(), error = %self, "request rejected"),
        }

        let mut response = (status, Json(Envelope::failure(self.body()))).into_response();
        response
            .extensions_mut()
            .insert(ErrorDiagnostics(format!("{self:?}")));
        response
    }
}
