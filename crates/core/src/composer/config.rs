//! Configuration for the composer module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for composition methods and the ffmpeg toolchain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Per-method timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Whether the high-fidelity method is part of the chain.
    #[serde(default = "default_true")]
    pub high_fidelity: bool,

    /// Whether the frame-buffer method is part of the chain.
    #[serde(default = "default_true")]
    pub frame_buffer: bool,

    /// Frame rate for ffmpeg-rendered segments.
    #[serde(default = "default_fps")]
    pub fps: u32,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_ms: default_timeout_ms(),
            high_fidelity: true,
            frame_buffer: true,
            fps: default_fps(),
        }
    }
}

impl ComposerConfig {
    /// Set the ffmpeg path.
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Set the ffprobe path.
    pub fn with_ffprobe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffprobe_path = path.into();
        self
    }

    /// Set the per-method timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_timeout_ms() -> u64 {
    120_000 // 2 minutes
}

fn default_true() -> bool {
    true
}

fn default_fps() -> u32 {
    30
}
