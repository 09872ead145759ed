//! Error types for interactive metadata generation.

use thiserror::Error;

/// Errors raised while resolving interactive elements against a timeline.
///
/// These never fail a render; the caller drops the interactive package and
/// records a warning instead.
#[derive(Debug, Error, PartialEq)]
pub enum InteractiveError {
    /// Element refers to a scene that does not exist.
    #[error("{element} references scene {scene_index}, timeline has {scene_count} scenes")]
    SceneOutOfRange {
        element: String,
        scene_index: usize,
        scene_count: usize,
    },

    /// Offset falls outside the referenced scene.
    #[error("{element} offset {offset_secs}s is outside scene duration {scene_duration_secs}s")]
    OffsetOutOfRange {
        element: String,
        offset_secs: f64,
        scene_duration_secs: f64,
    },

    /// Zero or negative duration.
    #[error("{element} has invalid duration {duration_secs}s")]
    InvalidDuration { element: String, duration_secs: f64 },

    /// Hotspot region does not fit in the frame.
    #[error("hotspot {id} region is outside the frame")]
    InvalidRegion { id: String },

    /// Nothing to attach metadata to.
    #[error("timeline has no scenes")]
    EmptyTimeline,
}
