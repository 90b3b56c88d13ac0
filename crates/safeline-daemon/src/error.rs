//! Error types for safeline-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use safeline_core::{AssigneeRejection, LifecycleError, StorageError, ValidationErrors};
use safeline_types::{EmployeeId, IncidentStatus};
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Site missing or inactive; never says which
    #[error("Site not found or inactive")]
    SiteUnavailable,

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Field validation failed
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    /// Status change not permitted
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: IncidentStatus,
        to: IncidentStatus,
    },

    /// Employee refused by the assignment policy
    #[error("Invalid assignee {employee}: {reason}")]
    InvalidAssignee {
        employee: EmployeeId,
        reason: AssigneeRejection,
    },

    /// Concurrent modification
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend deadline exceeded
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Validation(errors) => ApiError::Validation(errors),
            LifecycleError::NotFound(what) => ApiError::NotFound(what),
            LifecycleError::Inactive(_) | LifecycleError::SiteUnavailable => {
                ApiError::SiteUnavailable
            }
            LifecycleError::InvalidTransition { from, to } => {
                ApiError::InvalidTransition { from, to }
            }
            LifecycleError::InvalidAssignee { employee, reason } => {
                ApiError::InvalidAssignee { employee, reason }
            }
            LifecycleError::Conflict(what) => ApiError::Conflict(what),
            err @ LifecycleError::Timeout { .. } => ApiError::Timeout(err.to_string()),
            LifecycleError::Storage(e) => ApiError::Storage(e),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::SiteUnavailable => (StatusCode::NOT_FOUND, "SITE_UNAVAILABLE"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            ApiError::InvalidAssignee { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_ASSIGNEE")
            }
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Validation(errors) => serde_json::to_value(errors).ok(),
            ApiError::InvalidTransition { from, to } => {
                Some(serde_json::json!({ "from": from, "to": to }))
            }
            ApiError::InvalidAssignee { employee, reason } => {
                Some(serde_json::json!({ "employee": employee, "reason": reason }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status_codes() {
        let cases = [
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::SiteUnavailable, StatusCode::NOT_FOUND),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                ApiError::Validation(ValidationErrors::single("location", "must not be empty")),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::InvalidTransition {
                    from: IncidentStatus::Reported,
                    to: IncidentStatus::InProgress,
                },
                StatusCode::CONFLICT,
            ),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::Timeout("x".into()), StatusCode::GATEWAY_TIMEOUT),
            (
                ApiError::Storage(StorageError::Query("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_inactive_and_missing_sites_look_identical() {
        let inactive: ApiError =
            LifecycleError::Inactive(safeline_types::SiteRef::new("A", "B")).into();
        let missing: ApiError = LifecycleError::SiteUnavailable.into();
        assert_eq!(inactive.to_string(), missing.to_string());
        assert_eq!(inactive.status_and_code(), missing.status_and_code());
    }

    #[test]
    fn test_invalid_assignee_details() {
        let err: ApiError = LifecycleError::InvalidAssignee {
            employee: EmployeeId::new("W1"),
            reason: AssigneeRejection::CrossCompany,
        }
        .into();
        let details = err.details().unwrap();
        assert_eq!(details["employee"], "W1");
        assert_eq!(details["reason"], "CROSS_COMPANY");
        assert_eq!(err.status_and_code().1, "INVALID_ASSIGNEE");
    }
}
