//! Error types for timeline assembly and encoding.

use std::path::PathBuf;
use thiserror::Error;

use crate::composer::ComposerError;
use crate::media::{ProbeError, ToolError};

/// Errors from a timeline encoder.
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("Encoder {encoder} is unavailable")]
    Unavailable { encoder: String },

    #[error("Cannot encode an empty timeline")]
    EmptyTimeline,

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Failed to measure encoded output: {0}")]
    Probe(#[from] ProbeError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncoderError {
    /// Whether trying again later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Tool(ToolError::Timeout { .. }) | Self::Tool(ToolError::Io(_)) | Self::Io(_)
        )
    }
}

/// Errors that fail one output's assembly.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Assembly cancelled")]
    Cancelled,

    #[error("Scene {scene_index} could not be composed: {source}")]
    SceneFailed {
        scene_index: usize,
        #[source]
        source: ComposerError,
    },

    #[error("No timeline encoder available")]
    NoEncoder,

    #[error("Encoding failed: {0}")]
    Encode(#[from] EncoderError),

    #[error("Assembled duration {actual_secs:.2}s differs from expected {expected_secs:.2}s")]
    SyncMismatch { expected_secs: f64, actual_secs: f64 },

    #[error("Encoded output is empty: {path}")]
    EmptyOutput { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssemblyError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SceneFailed { source, .. } => source.is_retryable(),
            Self::Encode(e) => e.is_retryable(),
            Self::EmptyOutput { .. } | Self::Io(_) | Self::SyncMismatch { .. } => true,
            Self::Cancelled | Self::NoEncoder => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(EncoderError::Tool(ToolError::Timeout { timeout_ms: 1 }).is_retryable());
        assert!(!EncoderError::EmptyTimeline.is_retryable());
        assert!(!AssemblyError::Cancelled.is_retryable());
        assert!(AssemblyError::SceneFailed {
            scene_index: 0,
            source: ComposerError::AllMethodsExhausted {
                attempts: 3,
                last_error: "x".to_string()
            }
        }
        .is_retryable());
    }
}
