//! Error types for the composer module.

use std::path::PathBuf;
use thiserror::Error;

use crate::media::ToolError;

/// Errors that can occur while composing a scene segment.
#[derive(Debug, Error)]
pub enum ComposerError {
    /// Method cannot run in this environment.
    #[error("Composition method {method} is unavailable")]
    Unavailable { method: String },

    /// A required asset is absent or unreadable.
    #[error("Asset missing: {path}")]
    AssetMissing { path: PathBuf },

    /// Method exceeded its time budget.
    #[error("Composition method {method} timed out after {timeout_ms} ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// Method ran and failed.
    #[error("Composition method {method} failed: {reason}")]
    Failed { method: String, reason: String },

    /// Every method in the chain was unavailable or failed.
    #[error("All composition methods exhausted after {attempts} attempts: {last_error}")]
    AllMethodsExhausted { attempts: usize, last_error: String },

    /// Chain configuration is unusable.
    #[error("Invalid composition chain: {reason}")]
    InvalidChain { reason: String },

    /// External tool error.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// I/O error while writing a segment.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComposerError {
    /// Creates a new method failure.
    pub fn failed(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new invalid chain error.
    pub fn invalid_chain(reason: impl Into<String>) -> Self {
        Self::InvalidChain {
            reason: reason.into(),
        }
    }

    /// Whether trying the job again later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::AllMethodsExhausted { .. } | Self::Io(_) => true,
            Self::Tool(tool) => matches!(tool, ToolError::Timeout { .. } | ToolError::Io(_)),
            _ => false,
        }
    }

    /// Whether this error counts as a timeout for reporting.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Tool(ToolError::Timeout { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ComposerError::Timeout {
            method: "m".to_string(),
            timeout_ms: 10
        }
        .is_retryable());
        assert!(ComposerError::Tool(ToolError::Timeout { timeout_ms: 5 }).is_retryable());
        assert!(!ComposerError::failed("m", "bad input").is_retryable());
        assert!(!ComposerError::invalid_chain("empty").is_retryable());
    }

    #[test]
    fn test_is_timeout() {
        assert!(ComposerError::Tool(ToolError::Timeout { timeout_ms: 5 }).is_timeout());
        assert!(!ComposerError::AssetMissing {
            path: PathBuf::from("/a.png")
        }
        .is_timeout());
    }
}
