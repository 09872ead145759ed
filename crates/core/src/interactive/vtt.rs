//! WebVTT rendering.

use std::fmt::Write;

use super::types::CaptionCue;

/// Formats seconds as a WebVTT timestamp (`HH:MM:SS.mmm`).
pub fn format_timestamp(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60,
        ms
    )
}

/// Renders cues into a WebVTT document. Cues are written in the given order.
pub fn render(cues: &[CaptionCue]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for (i, cue) in cues.iter().enumerate() {
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timestamp(cue.start_secs),
            format_timestamp(cue.end_secs),
            cue.text.replace("-->", "->")
        );
    }
    out
}
