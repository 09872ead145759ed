//! Job manager: queueing, worker pool, cancellation and retries.
//!
//! The manager owns the lifecycle of render jobs. Jobs are persisted in a
//! [`JobStore`](crate::job::JobStore), claimed by workers in priority order,
//! rendered through the [`FanoutRenderer`](crate::render::FanoutRenderer) and
//! finished as completed, partial, failed or cancelled.

mod builder;
mod config;
mod runner;
mod types;

pub use builder::{build_job_manager, build_job_manager_with, BuildError};
pub use config::{ManagerConfig, RetryConfig};
pub use runner::JobManager;
pub use types::{ManagerError, ManagerStatus};
