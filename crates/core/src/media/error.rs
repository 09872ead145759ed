//! Error types for external media tools.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from running ffmpeg.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Binary missing or detection failed.
    #[error("FFmpeg not available at path: {path}")]
    NotAvailable { path: PathBuf },

    /// Process exited unsuccessfully.
    #[error("FFmpeg failed: {reason}")]
    Failed {
        reason: String,
        stderr: Option<String>,
    },

    /// Process exceeded its time budget and was killed.
    #[error("FFmpeg timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    pub fn failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            stderr,
        }
    }
}

/// Errors from measuring a media file.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Media file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("FFprobe not available at path: {path}")]
    ProbeUnavailable { path: PathBuf },

    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
