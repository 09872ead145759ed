//! Audio/visual duration comparison.

use serde::{Deserialize, Serialize};

/// Result of comparing two track durations.
///
/// The validator never trims anything. `hold_secs` and `pad_secs` tell the
/// caller how to extend the shorter track so neither is truncated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub in_sync: bool,
    /// `audio - visual`; positive when the narration is longer.
    pub delta_secs: f64,
    /// Seconds to hold the last visual frame.
    pub hold_secs: f64,
    /// Seconds of silence to append to the audio.
    pub pad_secs: f64,
}

impl SyncReport {
    /// Length of both tracks after the mismatch is resolved.
    pub fn resolved_secs(&self, audio_secs: f64, visual_secs: f64) -> f64 {
        audio_secs.max(visual_secs)
    }
}

/// Compares durations against a tolerance.
#[derive(Debug, Clone, Copy)]
pub struct SyncValidator {
    scene_tolerance_secs: f64,
    global_tolerance_secs: f64,
}

impl SyncValidator {
    pub fn new(scene_tolerance_secs: f64, global_tolerance_secs: f64) -> Self {
        Self {
            scene_tolerance_secs,
            global_tolerance_secs,
        }
    }

    /// Compares a scene's audio track with its visual segment.
    pub fn validate_scene(&self, audio_secs: f64, visual_secs: f64) -> SyncReport {
        validate(audio_secs, visual_secs, self.scene_tolerance_secs)
    }

    /// Compares the sum of scene durations with the assembled total.
    pub fn validate_total(&self, expected_secs: f64, assembled_secs: f64) -> SyncReport {
        validate(expected_secs, assembled_secs, self.global_tolerance_secs)
    }

    pub fn global_tolerance_secs(&self) -> f64 {
        self.global_tolerance_secs
    }
}

/// Compares two durations.
///
/// Hold/pad amounts are reported whenever the tracks differ, even within
/// tolerance, so the resolved tracks come out exactly equal.
pub fn validate(audio_secs: f64, visual_secs: f64, tolerance_secs: f64) -> SyncReport {
    let delta = audio_secs - visual_secs;
    SyncReport {
        in_sync: delta.abs() <= tolerance_secs,
        delta_secs: delta,
        hold_secs: delta.max(0.0),
        pad_secs: (-delta).max(0.0),
    }
}
