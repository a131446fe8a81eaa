//! Error types for the scheduling engine.

use thiserror::Error;

pub use crate::schedule::ScheduleError;

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage could not be read or written.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A job document could not be encoded or decoded.
    #[error("Invalid job document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by the jobs service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bad schedule expression or timezone.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Job fields failed validation.
    #[error("Invalid job: {0}")]
    Validation(String),

    /// `start_jobs` was already called.
    #[error("Jobs have already been started")]
    AlreadyStarted,

    /// A job operation arrived before `start_jobs`.
    #[error("Jobs service is not started yet")]
    NotStarted,
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StoreError::from(io_err);
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_service_error_is_transparent_for_schedule() {
        let err = ServiceError::from(ScheduleError::InvalidTimezone("Nowhere/City".to_string()));
        assert_eq!(err.to_string(), "Unknown timezone: Nowhere/City");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ServiceError::Validation("name must not be empty".to_string());
        assert_eq!(err.to_string(), "Invalid job: name must not be empty");
    }
}
