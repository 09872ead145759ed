//! Resolves template interactive elements against an assembled timeline.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::error::InteractiveError;
use super::types::{
    CaptionCue, Chapter, CueKind, Hotspot, HotspotAction, InteractiveElements,
    InteractivePackage, SceneSpan,
};
use super::vtt;

static SENTENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?]+[.!?]*").expect("sentence pattern is valid"));

/// Builds the interactive package for one output.
///
/// Pure: the same elements and spans always give the same package.
pub fn generate(
    elements: &InteractiveElements,
    spans: &[SceneSpan],
) -> Result<InteractivePackage, InteractiveError> {
    if spans.is_empty() {
        return Err(InteractiveError::EmptyTimeline);
    }

    let timeline_end = spans.last().map(SceneSpan::end_secs).unwrap_or(0.0);

    let mut cues: Vec<CaptionCue> = spans.iter().flat_map(narration_cues).collect();
    for (i, annotation) in elements.annotations.iter().enumerate() {
        let element = format!("annotation {}", i);
        let span = resolve_scene(&element, annotation.scene_index, spans)?;
        check_window(&element, annotation.offset_secs, annotation.duration_secs, span)?;

        let start = span.start_secs + annotation.offset_secs;
        cues.push(CaptionCue {
            start_secs: start,
            end_secs: (start + annotation.duration_secs).min(span.end_secs()),
            text: annotation.text.clone(),
            kind: CueKind::Annotation,
        });
    }
    // Stable, so narration stays ahead of annotations starting at the same time.
    cues.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));

    let chapters = resolve_chapters(elements, spans, timeline_end)?;

    let mut hotspots = Vec::with_capacity(elements.hotspots.len());
    for def in &elements.hotspots {
        let element = format!("hotspot {}", def.id);
        let span = resolve_scene(&element, def.scene_index, spans)?;
        check_window(&element, def.offset_secs, def.duration_secs, span)?;
        if !def.region.is_within_unit_square() {
            return Err(InteractiveError::InvalidRegion { id: def.id.clone() });
        }
        if let HotspotAction::SeekScene { scene_index } = def.action {
            resolve_scene(&element, scene_index, spans)?;
        }

        let start = span.start_secs + def.offset_secs;
        hotspots.push(Hotspot {
            id: def.id.clone(),
            start_secs: start,
            end_secs: (start + def.duration_secs).min(timeline_end),
            region: def.region,
            action: def.action.clone(),
        });
    }

    Ok(InteractivePackage {
        captions_vtt: vtt::render(&cues),
        cues,
        chapters,
        hotspots,
    })
}

/// Splits a scene's narration into sentence cues, sharing the narration
/// window proportionally to each sentence's word count.
fn narration_cues(span: &SceneSpan) -> Vec<CaptionCue> {
    let sentences: Vec<(&str, usize)> = SENTENCE
        .find_iter(&span.narration_text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(|s| (s, s.split_whitespace().count()))
        .filter(|(_, words)| *words > 0)
        .collect();

    let total_words: usize = sentences.iter().map(|(_, w)| w).sum();
    if total_words == 0 {
        return Vec::new();
    }

    let window = if span.narration_secs > 0.0 {
        span.narration_secs.min(span.duration_secs)
    } else {
        span.duration_secs
    };

    let mut cursor = span.start_secs;
    let mut words_done = 0usize;
    sentences
        .into_iter()
        .map(|(text, words)| {
            words_done += words;
            // Derive the end from the running total so rounding never drifts.
            let end = span.start_secs + window * words_done as f64 / total_words as f64;
            let cue = CaptionCue {
                start_secs: cursor,
                end_secs: end,
                text: text.to_string(),
                kind: CueKind::Narration,
            };
            cursor = end;
            cue
        })
        .collect()
}

fn resolve_chapters(
    elements: &InteractiveElements,
    spans: &[SceneSpan],
    timeline_end: f64,
) -> Result<Vec<Chapter>, InteractiveError> {
    let mut markers = Vec::with_capacity(elements.chapters.len());
    for marker in &elements.chapters {
        let element = format!("chapter '{}'", marker.title);
        let span = resolve_scene(&element, marker.scene_index, spans)?;
        markers.push((element, marker.title.clone(), span.start_secs));
    }
    markers.sort_by(|a, b| a.2.total_cmp(&b.2));

    let mut chapters = Vec::with_capacity(markers.len());
    for i in 0..markers.len() {
        let (element, title, start) = &markers[i];
        let end = markers.get(i + 1).map(|m| m.2).unwrap_or(timeline_end);
        if end <= *start {
            return Err(InteractiveError::InvalidDuration {
                element: element.clone(),
                duration_secs: end - start,
            });
        }
        chapters.push(Chapter {
            title: title.clone(),
            start_secs: *start,
            end_secs: end,
        });
    }
    Ok(chapters)
}

fn resolve_scene<'a>(
    element: &str,
    scene_index: usize,
    spans: &'a [SceneSpan],
) -> Result<&'a SceneSpan, InteractiveError> {
    spans
        .get(scene_index)
        .ok_or_else(|| InteractiveError::SceneOutOfRange {
            element: element.to_string(),
            scene_index,
            scene_count: spans.len(),
        })
}

fn check_window(
    element: &str,
    offset_secs: f64,
    duration_secs: f64,
    span: &SceneSpan,
) -> Result<(), InteractiveError> {
    if duration_secs <= 0.0 || !duration_secs.is_finite() {
        return Err(InteractiveError::InvalidDuration {
            element: element.to_string(),
            duration_secs,
        });
    }
    if offset_secs < 0.0 || offset_secs >= span.duration_secs {
        return Err(InteractiveError::OffsetOutOfRange {
            element: element.to_string(),
            offset_secs,
            scene_duration_secs: span.duration_secs,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactive::types::{Annotation, ChapterMarker, HotspotDef, Region};

    fn spans() -> Vec<SceneSpan> {
        vec![
            SceneSpan {
                start_secs: 0.0,
                duration_secs: 60.0,
                narration_secs: 40.0,
                narration_text: "One two three. Four.".to_string(),
            },
            SceneSpan {
                start_secs: 60.0,
                duration_secs: 100.0,
                narration_secs: 100.0,
                narration_text: "Second scene here".to_string(),
            },
        ]
    }

    fn hotspot(scene_index: usize, offset: f64, region: Region) -> HotspotDef {
        HotspotDef {
            id: "h1".to_string(),
            scene_index,
            offset_secs: offset,
            duration_secs: 5.0,
            region,
            action: HotspotAction::Note {
                text: "look".to_string(),
            },
        }
    }

    #[test]
    fn test_captions_split_by_word_count() {
        let package = generate(&InteractiveElements::default(), &spans()).unwrap();

        assert_eq!(package.cues.len(), 3);
        // 3 of 4 words over a 40s window
        assert_eq!(package.cues[0].text, "One two three.");
        assert_eq!(package.cues[0].start_secs, 0.0);
        assert_eq!(package.cues[0].end_secs, 30.0);
        assert_eq!(package.cues[1].start_secs, 30.0);
        assert_eq!(package.cues[1].end_secs, 40.0);
        assert_eq!(package.cues[2].start_secs, 60.0);
        assert_eq!(package.cues[2].end_secs, 160.0);
        assert!(package
            .captions_vtt
            .contains("00:00:30.000 --> 00:00:40.000\nFour."));
    }

    #[test]
    fn test_chapters_run_to_next_chapter_or_end() {
        let elements = InteractiveElements {
            chapters: vec![
                ChapterMarker {
                    title: "Outro".to_string(),
                    scene_index: 1,
                },
                ChapterMarker {
                    title: "Intro".to_string(),
                    scene_index: 0,
                },
            ],
            ..Default::default()
        };

        let package = generate(&elements, &spans()).unwrap();
        assert_eq!(package.chapters.len(), 2);
        assert_eq!(package.chapters[0].title, "Intro");
        assert_eq!(package.chapters[0].end_secs, 60.0);
        assert_eq!(package.chapters[1].start_secs, 60.0);
        assert_eq!(package.chapters[1].end_secs, 160.0);
    }

    #[test]
    fn test_duplicate_chapter_scene_is_rejected() {
        let marker = ChapterMarker {
            title: "A".to_string(),
            scene_index: 0,
        };
        let elements = InteractiveElements {
            chapters: vec![marker.clone(), marker],
            ..Default::default()
        };

        let err = generate(&elements, &spans()).unwrap_err();
        assert!(matches!(err, InteractiveError::InvalidDuration { .. }));
    }

    #[test]
    fn test_hotspots_are_absolute() {
        let elements = InteractiveElements {
            hotspots: vec![hotspot(1, 10.0, Region::new(0.1, 0.1, 0.2, 0.2))],
            ..Default::default()
        };

        let package = generate(&elements, &spans()).unwrap();
        assert_eq!(package.hotspots[0].start_secs, 70.0);
        assert_eq!(package.hotspots[0].end_secs, 75.0);
    }

    #[test]
    fn test_invalid_references() {
        let out_of_range = InteractiveElements {
            hotspots: vec![hotspot(5, 0.0, Region::new(0.0, 0.0, 0.5, 0.5))],
            ..Default::default()
        };
        assert!(matches!(
            generate(&out_of_range, &spans()),
            Err(InteractiveError::SceneOutOfRange { scene_index: 5, .. })
        ));

        let bad_offset = InteractiveElements {
            hotspots: vec![hotspot(0, 60.0, Region::new(0.0, 0.0, 0.5, 0.5))],
            ..Default::default()
        };
        assert!(matches!(
            generate(&bad_offset, &spans()),
            Err(InteractiveError::OffsetOutOfRange { .. })
        ));

        let bad_region = InteractiveElements {
            hotspots: vec![hotspot(0, 0.0, Region::new(0.8, 0.0, 0.5, 0.5))],
            ..Default::default()
        };
        assert!(matches!(
            generate(&bad_region, &spans()),
            Err(InteractiveError::InvalidRegion { .. })
        ));

        let bad_seek = InteractiveElements {
            hotspots: vec![HotspotDef {
                action: HotspotAction::SeekScene { scene_index: 9 },
                ..hotspot(0, 0.0, Region::new(0.0, 0.0, 0.5, 0.5))
            }],
            ..Default::default()
        };
        assert!(generate(&bad_seek, &spans()).is_err());
    }

    #[test]
    fn test_annotations_become_cues() {
        let elements = InteractiveElements {
            annotations: vec![Annotation {
                scene_index: 0,
                offset_secs: 55.0,
                duration_secs: 10.0,
                text: "Fun fact".to_string(),
            }],
            ..Default::default()
        };

        let package = generate(&elements, &spans()).unwrap();
        let note = package
            .cues
            .iter()
            .find(|c| c.kind == CueKind::Annotation)
            .unwrap();
        assert_eq!(note.start_secs, 55.0);
        // Clipped to the end of its scene
        assert_eq!(note.end_secs, 60.0);
    }

    #[test]
    fn test_zero_duration_annotation_rejected() {
        let elements = InteractiveElements {
            annotations: vec![Annotation {
                scene_index: 0,
                offset_secs: 0.0,
                duration_secs: 0.0,
                text: "x".to_string(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            generate(&elements, &spans()),
            Err(InteractiveError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_empty_timeline() {
        assert_eq!(
            generate(&InteractiveElements::default(), &[]),
            Err(InteractiveError::EmptyTimeline)
        );
    }
}
