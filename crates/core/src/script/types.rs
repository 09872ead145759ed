//! Core script data types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::interactive::InteractiveElements;

/// One narrated segment of a script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scene {
    /// Stable scene identifier (unique within a content set).
    pub id: String,

    /// Narration text read over this scene. Must not be empty.
    pub narration_text: String,

    /// Synthesized narration audio, if the speech engine produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_asset_ref: Option<PathBuf>,

    /// Visual asset (still image or video clip), absent until composed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_asset_ref: Option<PathBuf>,

    /// Target duration in seconds. Calculated from the narration when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_duration: Option<f64>,
}

impl Scene {
    /// Create a scene with narration only.
    pub fn new(id: impl Into<String>, narration_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            narration_text: narration_text.into(),
            audio_asset_ref: None,
            visual_asset_ref: None,
            computed_duration: None,
        }
    }

    /// Attach a narration audio asset.
    pub fn with_audio(mut self, path: impl Into<PathBuf>) -> Self {
        self.audio_asset_ref = Some(path.into());
        self
    }

    /// Attach a visual asset.
    pub fn with_visual(mut self, path: impl Into<PathBuf>) -> Self {
        self.visual_asset_ref = Some(path.into());
        self
    }

    /// Set an explicit target duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.computed_duration = Some(secs);
        self
    }

    /// Short title used by slide-style composers: the first sentence,
    /// cut to at most `max_chars` characters.
    pub fn title(&self, max_chars: usize) -> String {
        let first = self
            .narration_text
            .split(['.', '!', '?', '\n'])
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or("");

        if first.chars().count() <= max_chars {
            return first.to_string();
        }

        let mut title: String = first.chars().take(max_chars.saturating_sub(1)).collect();
        title.push('…');
        title
    }
}

/// Ordered scenes plus a display title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentSet {
    pub title: String,
    pub scenes: Vec<Scene>,
}

impl ContentSet {
    pub fn new(title: impl Into<String>, scenes: Vec<Scene>) -> Self {
        Self {
            title: title.into(),
            scenes,
        }
    }
}

/// Template the content is rendered with.
///
/// Only the interactive elements matter to the engine; slot and animation
/// metadata belongs to the composition methods.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub interactive: InteractiveElements,
}

impl Template {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            interactive: InteractiveElements::default(),
        }
    }

    /// Attach interactive elements.
    pub fn with_interactive(mut self, interactive: InteractiveElements) -> Self {
        self.interactive = interactive;
        self
    }
}
