//! Output specification and result types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::interactive::InteractivePackage;

/// Container format of a rendered video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoFormat {
    Mp4,
    Webm,
    Mov,
    Mkv,
}

impl VideoFormat {
    /// Returns the file extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Mov => "mov",
            Self::Mkv => "mkv",
        }
    }

    /// Returns the ffmpeg video codec used for this container.
    pub fn video_codec(&self) -> &'static str {
        match self {
            Self::Webm => "libvpx-vp9",
            Self::Mp4 | Self::Mov | Self::Mkv => "libx264",
        }
    }

    /// Returns the ffmpeg audio codec used for this container.
    pub fn audio_codec(&self) -> &'static str {
        match self {
            Self::Webm => "libopus",
            Self::Mp4 | Self::Mov | Self::Mkv => "aac",
        }
    }
}

/// Frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 1920x1080 landscape.
    pub const fn full_hd() -> Self {
        Self::new(1920, 1080)
    }

    /// 1280x720 landscape.
    pub const fn hd() -> Self {
        Self::new(1280, 720)
    }

    /// 720x1280 portrait, for phones.
    pub const fn mobile() -> Self {
        Self::new(720, 1280)
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Quality preset of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    Draft,
    #[default]
    Standard,
    High,
    Ultra,
}

impl QualityPreset {
    /// Default CRF for this preset (lower = better).
    pub fn crf(&self) -> u8 {
        match self {
            Self::Draft => 32,
            Self::Standard => 23,
            Self::High => 20,
            Self::Ultra => 17,
        }
    }

    /// Default x264 speed preset.
    pub fn encoder_preset(&self) -> &'static str {
        match self {
            Self::Draft => "ultrafast",
            Self::Standard => "medium",
            Self::High => "slow",
            Self::Ultra => "veryslow",
        }
    }

    /// Contribution to job priority. Heavier presets go to a slower lane.
    pub fn priority_weight(&self) -> i64 {
        match self {
            Self::Draft => 0,
            Self::Standard => 5,
            Self::High => 15,
            Self::Ultra => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Standard => "standard",
            Self::High => "high",
            Self::Ultra => "ultra",
        }
    }
}

/// Optional overrides for the preset's encoder settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Compression {
    /// Constant Rate Factor; overrides the preset's CRF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crf: Option<u8>,
    /// Target video bitrate in kbps (used instead of CRF when set).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    /// Audio bitrate in kbps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_bitrate_kbps: Option<u32>,
    /// Encoder speed preset; overrides the preset's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoder_preset: Option<String>,
}

/// One requested output. Immutable once a job starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Published file stem. Defaults to `<index>-<width>x<height>-<quality>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub format: VideoFormat,
    pub resolution: Resolution,
    #[serde(default)]
    pub quality_preset: QualityPreset,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub interactive: bool,
}

impl OutputSpec {
    pub fn new(format: VideoFormat, resolution: Resolution) -> Self {
        Self {
            label: None,
            format,
            resolution,
            quality_preset: QualityPreset::default(),
            compression: Compression::default(),
            interactive: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_quality(mut self, preset: QualityPreset) -> Self {
        self.quality_preset = preset;
        self
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Label used for the published file name.
    pub fn effective_label(&self, index: usize) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!(
                "{}-{}-{}",
                index,
                self.resolution,
                self.quality_preset.as_str()
            ),
        }
    }

    /// CRF after applying overrides.
    pub fn effective_crf(&self) -> u8 {
        self.compression
            .crf
            .unwrap_or_else(|| self.quality_preset.crf())
    }

    /// Encoder preset after applying overrides.
    pub fn effective_encoder_preset(&self) -> &str {
        self.compression
            .encoder_preset
            .as_deref()
            .unwrap_or_else(|| self.quality_preset.encoder_preset())
    }
}

/// A successfully rendered output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputResult {
    pub id: String,
    /// Position of the spec in the job request.
    pub spec_index: usize,
    pub label: String,
    pub format: VideoFormat,
    pub resolution: Resolution,
    pub file_size_bytes: u64,
    pub duration_secs: f64,
    /// Lowest-ranked composition method any scene needed.
    pub method_used: String,
    /// Timeline encoder that produced the file.
    pub encoder: String,
    pub scene_count: usize,
    /// Published location.
    pub path: PathBuf,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive_package: Option<InteractivePackage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_codecs() {
        assert_eq!(VideoFormat::Mp4.extension(), "mp4");
        assert_eq!(VideoFormat::Webm.video_codec(), "libvpx-vp9");
        assert_eq!(VideoFormat::Webm.audio_codec(), "libopus");
        assert_eq!(VideoFormat::Mov.video_codec(), "libx264");
    }

    #[test]
    fn test_resolution_presets() {
        assert_eq!(Resolution::full_hd().to_string(), "1920x1080");
        assert_eq!(Resolution::mobile(), Resolution::new(720, 1280));
        assert!(!Resolution::new(0, 720).is_valid());
    }

    #[test]
    fn test_effective_label() {
        let spec = OutputSpec::new(VideoFormat::Mp4, Resolution::hd());
        assert_eq!(spec.effective_label(1), "1-1280x720-standard");

        let spec = spec.with_label("web");
        assert_eq!(spec.effective_label(1), "web");
    }

    #[test]
    fn test_compression_overrides() {
        let mut spec =
            OutputSpec::new(VideoFormat::Mp4, Resolution::hd()).with_quality(QualityPreset::High);
        assert_eq!(spec.effective_crf(), 20);
        assert_eq!(spec.effective_encoder_preset(), "slow");

        spec.compression.crf = Some(28);
        spec.compression.encoder_preset = Some("fast".to_string());
        assert_eq!(spec.effective_crf(), 28);
        assert_eq!(spec.effective_encoder_preset(), "fast");
    }

    #[test]
    fn test_spec_deserialize_defaults() {
        let spec: OutputSpec = serde_json::from_str(
            r#"{"format":"webm","resolution":{"width":720,"height":1280}}"#,
        )
        .unwrap();
        assert_eq!(spec.quality_preset, QualityPreset::Standard);
        assert!(!spec.interactive);
        assert_eq!(spec.compression, Compression::default());
    }
}
