//! Render configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where outputs are staged and published, and how many render at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Root for job-scoped scratch directories.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Root for published outputs (`<output_dir>/<job_id>/<label>.<ext>`).
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Output specs rendered concurrently across all jobs.
    #[serde(default = "default_max_parallel_outputs")]
    pub max_parallel_outputs: usize,

    /// Timeout for encoding one output (milliseconds).
    #[serde(default = "default_encode_timeout")]
    pub encode_timeout_ms: u64,

    /// Wall-clock seconds per second of video, used for completion estimates.
    #[serde(default = "default_render_speed_factor")]
    pub render_speed_factor: f64,
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("reelforge")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./renders")
}

fn default_max_parallel_outputs() -> usize {
    4
}

fn default_encode_timeout() -> u64 {
    1_800_000 // 30 minutes
}

fn default_render_speed_factor() -> f64 {
    0.25
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            output_dir: default_output_dir(),
            max_parallel_outputs: default_max_parallel_outputs(),
            encode_timeout_ms: default_encode_timeout(),
            render_speed_factor: default_render_speed_factor(),
        }
    }
}

impl RenderConfig {
    /// Set both directories.
    pub fn with_dirs(mut self, work_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_max_parallel_outputs(mut self, max: usize) -> Self {
        self.max_parallel_outputs = max;
        self
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_millis(self.encode_timeout_ms)
    }
}
