//! Core job data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::render::{OutputResult, OutputSpec};
use crate::script::{ContentSet, Template};

// ============================================================================
// Status
// ============================================================================

/// Lifecycle state of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    /// Some, but not all, outputs rendered.
    PartiallyCompleted,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::PartiallyCompleted => "partially_completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true once a worker is done with the job.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::PartiallyCompleted | Self::Failed | Self::Cancelled
        )
    }

    /// Returns true if `cancel` applies directly to this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }

    /// Returns true if the job can be re-queued by a retry.
    pub fn can_retry(&self) -> bool {
        matches!(self, Self::Failed | Self::PartiallyCompleted)
    }

    /// Whether a stored job may move from `self` to `next`.
    ///
    /// Completed and cancelled jobs never change again. Failed and partial
    /// jobs only leave through a retry, or a cancel of a pending retry.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Queued)
                | (Queued, Processing)
                | (Queued, Cancelled)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, PartiallyCompleted)
                | (Processing, Failed)
                | (Processing, Cancelled)
                | (Processing, Queued)
                | (Failed, Queued)
                | (Failed, Cancelled)
                | (PartiallyCompleted, Queued)
                | (PartiallyCompleted, Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "partially_completed" => Ok(Self::PartiallyCompleted),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

// ============================================================================
// Error records
// ============================================================================

/// Classification of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    AssetMissing,
    ComposerTimeout,
    ComposerFailed,
    AllMethodsExhausted,
    SyncMismatch,
    EncodeFailed,
    PublishFailed,
    OutputFailed,
    AllOutputsFailed,
    Cancelled,
    RetryCapExceeded,
    InteractiveDegraded,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssetMissing => "AssetMissing",
            Self::ComposerTimeout => "ComposerTimeout",
            Self::ComposerFailed => "ComposerFailed",
            Self::AllMethodsExhausted => "AllMethodsExhausted",
            Self::SyncMismatch => "SyncMismatch",
            Self::EncodeFailed => "EncodeFailed",
            Self::PublishFailed => "PublishFailed",
            Self::OutputFailed => "OutputFailed",
            Self::AllOutputsFailed => "AllOutputsFailed",
            Self::Cancelled => "Cancelled",
            Self::RetryCapExceeded => "RetryCapExceeded",
            Self::InteractiveDegraded => "InteractiveDegraded",
            Self::Internal => "Internal",
        }
    }
}

/// Immutable record of something that went wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub code: ErrorCode,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub retryable: bool,
    /// Attempt during which it occurred (1-based, 0 before any attempt).
    #[serde(default)]
    pub attempt: u32,
    /// Where it happened, e.g. `output_index`, `scene_index`, `method`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl ErrorRecord {
    pub fn new(code: ErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            timestamp: Utc::now(),
            retryable,
            attempt: 0,
            context: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

// ============================================================================
// Request
// ============================================================================

/// Everything a caller submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub template: Template,
    pub content: ContentSet,
    pub outputs: Vec<OutputSpec>,
}

/// Reasons a request is rejected before anything is stored.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestError {
    #[error("content set has no scenes")]
    NoScenes,

    #[error("scene {scene_id} has empty narration")]
    EmptyNarration { scene_id: String },

    #[error("duplicate scene id {scene_id}")]
    DuplicateScene { scene_id: String },

    #[error("no output specs requested")]
    NoOutputs,

    #[error("output {index} has invalid resolution {width}x{height}")]
    InvalidResolution { index: usize, width: u32, height: u32 },

    #[error("output {index} has invalid label {label:?}")]
    InvalidLabel { index: usize, label: String },

    #[error("duplicate output label {label}")]
    DuplicateLabel { label: String },
}

impl JobRequest {
    pub fn new(template: Template, content: ContentSet, outputs: Vec<OutputSpec>) -> Self {
        Self {
            template,
            content,
            outputs,
        }
    }

    /// Checks the request can be rendered.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.content.scenes.is_empty() {
            return Err(RequestError::NoScenes);
        }

        let mut scene_ids = HashSet::new();
        for scene in &self.content.scenes {
            if scene.narration_text.trim().is_empty() {
                return Err(RequestError::EmptyNarration {
                    scene_id: scene.id.clone(),
                });
            }
            if !scene_ids.insert(scene.id.as_str()) {
                return Err(RequestError::DuplicateScene {
                    scene_id: scene.id.clone(),
                });
            }
        }

        if self.outputs.is_empty() {
            return Err(RequestError::NoOutputs);
        }

        let mut labels = HashSet::new();
        for (index, spec) in self.outputs.iter().enumerate() {
            if !spec.resolution.is_valid() {
                return Err(RequestError::InvalidResolution {
                    index,
                    width: spec.resolution.width,
                    height: spec.resolution.height,
                });
            }

            let label = spec.effective_label(index);
            let safe = !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                && !label.starts_with('.');
            if !safe {
                return Err(RequestError::InvalidLabel { index, label });
            }
            if !labels.insert(label.clone()) {
                return Err(RequestError::DuplicateLabel { label });
            }
        }

        Ok(())
    }
}

// ============================================================================
// Job
// ============================================================================

/// A render job as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    pub id: String,
    pub status: JobStatus,
    /// Percentage in `[0, 100]`, non-decreasing while processing.
    pub progress: u8,
    /// Lower is more urgent.
    pub priority: i64,
    /// Number of executions started.
    pub attempts: u32,
    pub cancel_requested: bool,
    pub request: JobRequest,
    /// Rendered outputs in requested-spec order.
    pub outputs: Vec<OutputResult>,
    /// Append-only history.
    pub errors: Vec<ErrorRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub estimated_completion: Option<DateTime<Utc>>,
    /// When a scheduled automatic retry becomes due.
    pub retry_after: Option<DateTime<Utc>>,
}

impl RenderJob {
    /// New queued job.
    pub fn new(request: JobRequest, priority: i64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Queued,
            progress: 0,
            priority,
            attempts: 0,
            cancel_requested: false,
            request,
            outputs: Vec::new(),
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
            estimated_completion: None,
            retry_after: None,
        }
    }

    pub fn requested_outputs(&self) -> usize {
        self.request.outputs.len()
    }

    /// Indices of requested outputs without a result yet.
    pub fn missing_outputs(&self) -> Vec<usize> {
        let done: HashSet<usize> = self.outputs.iter().map(|o| o.spec_index).collect();
        (0..self.request.outputs.len())
            .filter(|i| !done.contains(i))
            .collect()
    }
}

/// What callers see from `get_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub priority: i64,
    pub attempts: u32,
    pub outputs: Vec<OutputResult>,
    pub errors: Vec<ErrorRecord>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<DateTime<Utc>>,
}

impl From<RenderJob> for JobStatusView {
    fn from(job: RenderJob) -> Self {
        Self {
            id: job.id,
            status: job.status,
            progress: job.progress,
            priority: job.priority,
            attempts: job.attempts,
            outputs: job.outputs,
            errors: job.errors,
            created_at: job.created_at,
            estimated_completion: job.estimated_completion,
            retry_after: job.retry_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Resolution, VideoFormat};
    use crate::script::Scene;

    fn request() -> JobRequest {
        JobRequest::new(
            Template::new("t1", "Basic"),
            ContentSet::new(
                "Demo",
                vec![Scene::new("s1", "Hello world."), Scene::new("s2", "Bye.")],
            ),
            vec![OutputSpec::new(VideoFormat::Mp4, Resolution::full_hd())],
        )
    }

    #[test]
    fn test_transitions() {
        use JobStatus::*;
        assert!(Queued.can_transition_to(Processing));
        assert!(Processing.can_transition_to(PartiallyCompleted));
        assert!(Failed.can_transition_to(Queued));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Queued));
        assert!(!Cancelled.can_transition_to(Queued));
        assert!(!Completed.can_transition_to(Completed));
        assert!(!Queued.can_transition_to(Completed));
    }

    #[test]
    fn test_status_flags() {
        assert!(JobStatus::Queued.can_cancel());
        assert!(!JobStatus::Failed.can_cancel());
        assert!(JobStatus::PartiallyCompleted.can_retry());
        assert!(!JobStatus::Completed.can_retry());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_status_round_trip_str() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::PartiallyCompleted,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_error_record_context() {
        let record = ErrorRecord::new(ErrorCode::ComposerTimeout, "slow", true)
            .with_context("scene_index", 2)
            .with_attempt(1);
        assert_eq!(record.context.get("scene_index").unwrap(), "2");
        assert_eq!(record.attempt, 1);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""code":"ComposerTimeout""#));
    }

    #[test]
    fn test_validate_ok() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_validate_rejections() {
        let mut no_scenes = request();
        no_scenes.content.scenes.clear();
        assert_eq!(no_scenes.validate(), Err(RequestError::NoScenes));

        let mut empty = request();
        empty.content.scenes[1].narration_text = "   ".to_string();
        assert!(matches!(
            empty.validate(),
            Err(RequestError::EmptyNarration { .. })
        ));

        let mut no_outputs = request();
        no_outputs.outputs.clear();
        assert_eq!(no_outputs.validate(), Err(RequestError::NoOutputs));

        let mut bad_res = request();
        bad_res.outputs[0].resolution = Resolution::new(0, 1080);
        assert!(matches!(
            bad_res.validate(),
            Err(RequestError::InvalidResolution { index: 0, .. })
        ));

        let mut bad_label = request();
        bad_label.outputs[0].label = Some("../escape".to_string());
        assert!(matches!(
            bad_label.validate(),
            Err(RequestError::InvalidLabel { .. })
        ));

        let mut dup = request();
        dup.outputs.push(dup.outputs[0].clone());
        dup.outputs[0].label = Some("same".to_string());
        dup.outputs[1].label = Some("same".to_string());
        assert!(matches!(
            dup.validate(),
            Err(RequestError::DuplicateLabel { .. })
        ));
    }

    #[test]
    fn test_missing_outputs() {
        let mut req = request();
        req.outputs.push(OutputSpec::new(VideoFormat::Webm, Resolution::mobile()));
        let job = RenderJob::new(req, 0);
        assert_eq!(job.missing_outputs(), vec![0, 1]);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.requested_outputs(), 2);
    }
}
