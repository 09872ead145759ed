//! Types for interactive metadata.

use serde::{Deserialize, Serialize};

/// Rectangle in normalized coordinates (0.0 to 1.0 on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the region has positive area and lies inside the unit square.
    pub fn is_within_unit_square(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.x + self.width <= 1.0
            && self.y + self.height <= 1.0
    }
}

/// What happens when a viewer activates a hotspot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HotspotAction {
    /// Open an external link.
    Link { url: String },
    /// Jump to the start of another scene.
    SeekScene { scene_index: usize },
    /// Show a text note.
    Note { text: String },
}

/// Chapter marker authored on a template. Starts at the scene's start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterMarker {
    pub title: String,
    pub scene_index: usize,
}

/// Hotspot authored relative to a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotDef {
    pub id: String,
    pub scene_index: usize,
    #[serde(default)]
    pub offset_secs: f64,
    pub duration_secs: f64,
    pub region: Region,
    pub action: HotspotAction,
}

/// Free-text annotation shown as an extra caption cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub scene_index: usize,
    #[serde(default)]
    pub offset_secs: f64,
    pub duration_secs: f64,
    pub text: String,
}

/// Interactive elements carried by a template.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InteractiveElements {
    #[serde(default)]
    pub chapters: Vec<ChapterMarker>,
    #[serde(default)]
    pub hotspots: Vec<HotspotDef>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl InteractiveElements {
    /// True when the template defines nothing interactive.
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty() && self.hotspots.is_empty() && self.annotations.is_empty()
    }
}

/// Where a scene sits on the assembled timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSpan {
    pub start_secs: f64,
    pub duration_secs: f64,
    /// Portion of the scene covered by narration, starting at `start_secs`.
    pub narration_secs: f64,
    pub narration_text: String,
}

impl SceneSpan {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

/// Source of a caption cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    Narration,
    Annotation,
}

/// One timed caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionCue {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
    pub kind: CueKind,
}

/// Chapter resolved to absolute timeline positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub start_secs: f64,
    pub end_secs: f64,
}

/// Hotspot resolved to absolute timeline positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub id: String,
    pub start_secs: f64,
    pub end_secs: f64,
    pub region: Region,
    pub action: HotspotAction,
}

/// Interactive metadata attached to a finished output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractivePackage {
    /// Complete WebVTT document.
    pub captions_vtt: String,
    pub cues: Vec<CaptionCue>,
    pub chapters: Vec<Chapter>,
    pub hotspots: Vec<Hotspot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_bounds() {
        assert!(Region::new(0.0, 0.0, 1.0, 1.0).is_within_unit_square());
        assert!(Region::new(0.25, 0.5, 0.5, 0.5).is_within_unit_square());
        assert!(!Region::new(0.75, 0.0, 0.5, 0.5).is_within_unit_square());
        assert!(!Region::new(-0.1, 0.0, 0.5, 0.5).is_within_unit_square());
        assert!(!Region::new(0.1, 0.1, 0.0, 0.5).is_within_unit_square());
    }

    #[test]
    fn test_hotspot_action_serialization() {
        let action = HotspotAction::SeekScene { scene_index: 2 };
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, r#"{"type":"seek_scene","scene_index":2}"#);

        let parsed: HotspotAction =
            serde_json::from_str(r#"{"type":"link","url":"https://example.com"}"#).unwrap();
        assert_eq!(
            parsed,
            HotspotAction::Link {
                url: "https://example.com".to_string()
            }
        );
    }

    #[test]
    fn test_elements_default_offsets() {
        let json = r#"{
            "annotations": [{"scene_index": 0, "duration_secs": 3.0, "text": "Note"}]
        }"#;
        let elements: InteractiveElements = serde_json::from_str(json).unwrap();
        assert_eq!(elements.annotations[0].offset_secs, 0.0);
        assert!(elements.chapters.is_empty());
        assert!(!elements.is_empty());
    }
}
