//! Types for the composer module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::render::Resolution;

/// Everything a method needs besides the scene itself.
#[derive(Debug, Clone)]
pub struct ComposeRequest {
    pub scene_index: usize,
    /// Text for methods that draw a title.
    pub title: String,
    pub target_duration_secs: f64,
    pub resolution: Resolution,
    /// Directory owned by the calling output task.
    pub work_dir: PathBuf,
    pub timeout: Duration,
}

impl ComposeRequest {
    /// Path for a segment produced by `method`.
    pub fn segment_path(&self, method: &str, extension: &str) -> PathBuf {
        self.work_dir.join(format!(
            "scene-{:03}-{}.{}",
            self.scene_index, method, extension
        ))
    }
}

/// How a segment is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Rendered video file without audio.
    Video,
    /// JSON slide descriptor, rendered at encode time.
    Slide,
}

/// A composed visual segment for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub path: PathBuf,
    pub kind: SegmentKind,
    pub duration_secs: f64,
    pub method: String,
}

/// Slide written by the static slide method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideDescriptor {
    pub title: String,
    /// Background colour as `#rrggbb`.
    pub background: String,
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
}

/// Outcome of one method invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Unavailable,
    AssetMissing,
    Failed,
    Timeout,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Unavailable => "unavailable",
            Self::AssetMissing => "asset_missing",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }
}

/// Record of trying one method on one scene. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionAttempt {
    pub method_name: String,
    pub outcome: AttemptOutcome,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Segment plus the rank of the method that produced it (0 = best).
#[derive(Debug, Clone, PartialEq)]
pub struct Composed {
    pub segment: Segment,
    pub rank: usize,
}

/// Result of running a scene through the chain.
#[derive(Debug)]
pub struct ChainRun {
    pub attempts: Vec<CompositionAttempt>,
    pub result: Result<Composed, super::ComposerError>,
}
