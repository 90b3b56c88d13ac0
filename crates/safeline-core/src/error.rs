//! Error types for safeline-core.
//!
//! `LifecycleError` is the taxonomy every engine, resolver and aggregation
//! operation reports. Backend faults arrive as `StorageError` and are folded
//! in at the crate boundary.

use crate::policy::AssigneeRejection;
use safeline_types::{EmployeeId, IncidentStatus, SiteRef};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A single rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Per-field validation failures, collected before any side effect
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

/// Errors raised by Directory and IncidentStore backends
#[derive(Debug, Error)]
pub enum StorageError {
    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (already exists, or revision moved underneath us)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stored data could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error
    #[error("Query error: {0}")]
    Query(String),
}

/// Errors surfaced by lifecycle, resolver and aggregation operations
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// One or more input fields were rejected
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Incident, site or employee does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Site exists but is administratively inactive
    #[error("site {0} is inactive")]
    Inactive(SiteRef),

    /// Public view of `NotFound` and `Inactive` for a site
    #[error("site not found or inactive")]
    SiteUnavailable,

    /// No permitted edge for the requested change
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: IncidentStatus,
        to: IncidentStatus,
    },

    /// Employee failed the assignment policy
    #[error("employee {employee} cannot be assigned: {reason}")]
    InvalidAssignee {
        employee: EmployeeId,
        reason: AssigneeRejection,
    },

    /// An external call exceeded its deadline
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    /// Concurrent modification detected on commit
    #[error("conflict: {0}")]
    Conflict(String),

    /// Backend fault
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl LifecycleError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LifecycleError::Timeout { .. })
    }
}

impl From<StorageError> for LifecycleError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => LifecycleError::NotFound(what),
            StorageError::Conflict(what) => LifecycleError::Conflict(what),
            other => LifecycleError::Storage(other),
        }
    }
}

impl From<ValidationErrors> for LifecycleError {
    fn from(errors: ValidationErrors) -> Self {
        LifecycleError::Validation(errors)
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_collect() {
        let mut errors = ValidationErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.push("description", "must not be empty");
        errors.push("location", "must not be empty");
        assert!(errors.has("location"));
        assert_eq!(
            errors.to_string(),
            "description: must not be empty; location: must not be empty"
        );
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_storage_conflict_maps_to_conflict() {
        let err: LifecycleError = StorageError::Conflict("revision".into()).into();
        assert!(matches!(err, LifecycleError::Conflict(_)));

        let err: LifecycleError = StorageError::Query("boom".into()).into();
        assert!(matches!(err, LifecycleError::Storage(_)));
    }

    #[test]
    fn test_site_unavailable_message_is_opaque() {
        assert_eq!(
            LifecycleError::SiteUnavailable.to_string(),
            "site not found or inactive"
        );
    }
}
