//! Types for the job manager.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{JobStatus, JobStoreError, RequestError};

/// Errors returned by the job manager's API.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Request rejected before anything was stored.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    /// Job not found.
    #[error("job not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the job's current status.
    #[error("cannot {operation} job {id} while {status}")]
    InvalidState {
        id: String,
        status: JobStatus,
        operation: &'static str,
    },

    /// Job already used all its attempts.
    #[error("job {id} reached the retry limit ({attempts}/{max_attempts} attempts)")]
    RetryLimitExceeded {
        id: String,
        attempts: u32,
        max_attempts: u32,
    },

    /// Job store error.
    #[error("job store error: {0}")]
    Store(#[from] JobStoreError),
}

/// Current status of the job manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerStatus {
    /// Whether workers are running.
    pub running: bool,
    /// Configured worker count.
    pub workers: usize,
    /// Jobs currently being rendered by this process.
    pub active_jobs: usize,
    pub queued_count: usize,
    pub processing_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ManagerError::InvalidState {
            id: "j1".to_string(),
            status: JobStatus::Completed,
            operation: "cancel",
        };
        assert_eq!(err.to_string(), "cannot cancel job j1 while completed");

        let err = ManagerError::RetryLimitExceeded {
            id: "j1".to_string(),
            attempts: 3,
            max_attempts: 3,
        };
        assert!(err.to_string().contains("3/3"));
    }

    #[test]
    fn test_status_serialization() {
        let status = ManagerStatus {
            running: true,
            workers: 2,
            ..Default::default()
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"workers\":2"));
    }
}
