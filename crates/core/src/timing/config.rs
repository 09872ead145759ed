//! Configuration for scene timing.

use serde::{Deserialize, Serialize};

/// Reading pace, scene bounds and sync tolerances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Narration reading speed.
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: f64,

    /// Multiplier applied for pauses and breathing room.
    #[serde(default = "default_pause_multiplier")]
    pub pause_multiplier: f64,

    /// Shortest allowed scene.
    #[serde(default = "default_min_scene_secs")]
    pub min_scene_secs: f64,

    /// Longest allowed scene.
    #[serde(default = "default_max_scene_secs")]
    pub max_scene_secs: f64,

    /// Allowed audio/visual drift within one scene.
    #[serde(default = "default_scene_tolerance")]
    pub scene_tolerance_secs: f64,

    /// Allowed drift between scene sum and the assembled total.
    #[serde(default = "default_global_tolerance")]
    pub global_tolerance_secs: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            words_per_minute: default_words_per_minute(),
            pause_multiplier: default_pause_multiplier(),
            min_scene_secs: default_min_scene_secs(),
            max_scene_secs: default_max_scene_secs(),
            scene_tolerance_secs: default_scene_tolerance(),
            global_tolerance_secs: default_global_tolerance(),
        }
    }
}

impl TimingConfig {
    /// Set the pause multiplier.
    pub fn with_pause_multiplier(mut self, multiplier: f64) -> Self {
        self.pause_multiplier = multiplier;
        self
    }

    /// Set the scene bounds.
    pub fn with_scene_bounds(mut self, min_secs: f64, max_secs: f64) -> Self {
        self.min_scene_secs = min_secs;
        self.max_scene_secs = max_secs;
        self
    }
}

fn default_words_per_minute() -> f64 {
    120.0
}

fn default_pause_multiplier() -> f64 {
    1.5
}

fn default_min_scene_secs() -> f64 {
    60.0
}

fn default_max_scene_secs() -> f64 {
    300.0
}

fn default_scene_tolerance() -> f64 {
    0.5
}

fn default_global_tolerance() -> f64 {
    2.0
}
