//! Job storage trait and types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{ErrorRecord, JobStatus, RenderJob};

/// Error type for job storage operations.
#[derive(Debug, Error)]
pub enum JobStoreError {
    /// Job not found.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Job changed status since it was read.
    #[error("Job {id} is {actual}, expected {expected}")]
    StatusConflict {
        id: String,
        expected: JobStatus,
        actual: JobStatus,
    },

    /// Transition not allowed by the job lifecycle.
    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },

    /// Stored data could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Filter for querying jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    /// Filter by status.
    pub status: Option<JobStatus>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by status.
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for job storage backends.
///
/// Error records are append-only: `update` never touches them.
pub trait JobStore: Send + Sync {
    /// Persist a new job.
    fn create(&self, job: &RenderJob) -> Result<(), JobStoreError>;

    /// Get a job by ID, including its error records.
    fn get(&self, id: &str) -> Result<Option<RenderJob>, JobStoreError>;

    /// List jobs matching the filter, most recent first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<RenderJob>, JobStoreError>;

    /// Count jobs matching the filter.
    fn count(&self, filter: &JobFilter) -> Result<i64, JobStoreError>;

    /// Atomically move the most urgent queued job to processing.
    ///
    /// Increments `attempts` and sets `started_at`. Each queued job is
    /// returned to at most one caller.
    fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<RenderJob>, JobStoreError>;

    /// Write `job`'s mutable fields if the stored status still equals `expected`.
    fn update(&self, job: &RenderJob, expected: JobStatus) -> Result<RenderJob, JobStoreError>;

    /// Raise progress of a processing job. Lower values are ignored.
    ///
    /// Returns the stored progress.
    fn update_progress(
        &self,
        id: &str,
        progress: u8,
        estimated_completion: Option<DateTime<Utc>>,
    ) -> Result<u8, JobStoreError>;

    /// Append an error record.
    fn append_error(&self, id: &str, record: &ErrorRecord) -> Result<(), JobStoreError>;

    /// Failed or partial jobs whose scheduled retry is due.
    fn due_retries(&self, now: DateTime<Utc>) -> Result<Vec<RenderJob>, JobStoreError>;

    /// Permanently delete a job and its records.
    fn delete(&self, id: &str) -> Result<RenderJob, JobStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_builder() {
        let filter = JobFilter::new()
            .with_status(JobStatus::Failed)
            .with_limit(10)
            .with_offset(20);
        assert_eq!(filter.status, Some(JobStatus::Failed));
        assert_eq!(filter.limit, 10);
        assert_eq!(filter.offset, 20);
    }

    #[test]
    fn test_error_display() {
        let err = JobStoreError::StatusConflict {
            id: "j1".to_string(),
            expected: JobStatus::Queued,
            actual: JobStatus::Cancelled,
        };
        assert_eq!(err.to_string(), "Job j1 is cancelled, expected queued");
    }
}
