//! Ordered scene entries making up one output.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::composer::Segment;
use crate::interactive::SceneSpan;

/// One composed scene, synchronized and ready to concatenate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub scene_id: String,
    pub scene_index: usize,
    pub narration_text: String,
    pub segment: Segment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
    /// Measured narration length; 0 when the audio is missing.
    pub audio_secs: f64,
    /// Seconds the last visual frame is held past the segment's end.
    pub hold_secs: f64,
    /// Seconds of silence appended after the narration.
    pub pad_secs: f64,
    /// Length of the scene once synchronized.
    pub duration_secs: f64,
    /// Rank of the method used (0 = best).
    pub method_rank: usize,
    /// Whether this entry stands in for a scene that could not be composed.
    pub placeholder: bool,
}

/// Scenes of one output in script order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TimelineEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of synchronized scene durations.
    pub fn total_secs(&self) -> f64 {
        self.entries.iter().map(|e| e.duration_secs).sum()
    }

    /// Entry with the worst-ranked method, if any.
    pub fn lowest_fidelity(&self) -> Option<&TimelineEntry> {
        self.entries.iter().max_by_key(|e| e.method_rank)
    }

    /// Scene positions for interactive metadata.
    pub fn spans(&self) -> Vec<SceneSpan> {
        let mut start = 0.0;
        self.entries
            .iter()
            .map(|e| {
                let span = SceneSpan {
                    start_secs: start,
                    duration_secs: e.duration_secs,
                    narration_secs: e.audio_secs,
                    narration_text: e.narration_text.clone(),
                };
                start += e.duration_secs;
                span
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::SegmentKind;

    fn entry(index: usize, duration: f64, rank: usize) -> TimelineEntry {
        TimelineEntry {
            scene_id: format!("s{}", index),
            scene_index: index,
            narration_text: "Some words.".to_string(),
            segment: Segment {
                path: PathBuf::from(format!("/work/scene-{}.json", index)),
                kind: SegmentKind::Slide,
                duration_secs: duration,
                method: "static_slide".to_string(),
            },
            audio_path: None,
            audio_secs: duration / 2.0,
            hold_secs: 0.0,
            pad_secs: duration / 2.0,
            duration_secs: duration,
            method_rank: rank,
            placeholder: false,
        }
    }

    #[test]
    fn test_total_and_spans() {
        let mut timeline = Timeline::new();
        timeline.push(entry(0, 60.0, 0));
        timeline.push(entry(1, 100.0, 2));
        timeline.push(entry(2, 300.0, 1));

        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline.total_secs(), 460.0);

        let spans = timeline.spans();
        assert_eq!(spans[1].start_secs, 60.0);
        assert_eq!(spans[2].start_secs, 160.0);
        assert_eq!(spans[2].narration_secs, 150.0);
    }

    #[test]
    fn test_lowest_fidelity() {
        let mut timeline = Timeline::new();
        assert!(timeline.lowest_fidelity().is_none());
        timeline.push(entry(0, 60.0, 0));
        timeline.push(entry(1, 60.0, 2));
        assert_eq!(timeline.lowest_fidelity().unwrap().scene_index, 1);
    }
}
