//! Render job model and persistence.

mod priority;
mod sqlite_store;
mod store;
mod types;

pub use priority::{compute_priority, estimate_completion, expected_video_secs, retry_priority};
pub use sqlite_store::SqliteJobStore;
pub use store::{JobFilter, JobStore, JobStoreError};
pub use types::{
    ErrorCode, ErrorRecord, JobRequest, JobStatus, JobStatusView, RenderJob, RequestError,
};
