//! Timeline encoders: ffmpeg concat and a pure JSON manifest.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::error::EncoderError;
use super::timeline::{Timeline, TimelineEntry};
use crate::composer::{drawtext_filter, SegmentKind, SlideDescriptor};
use crate::media::{FfmpegToolchain, MediaProbe};
use crate::render::{OutputSpec, Resolution};

/// Encoded file plus its measured properties.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedOutput {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_secs: f64,
}

/// Turns a timeline into a single output file.
#[async_trait]
pub trait TimelineEncoder: Send + Sync {
    /// Returns the name of this encoder.
    fn name(&self) -> &str;

    /// Cheap readiness check.
    fn is_available(&self) -> bool;

    /// File extension of outputs for `spec`.
    fn extension(&self, spec: &OutputSpec) -> String;

    /// Encodes `timeline` to `output`. Scratch files go next to `output`.
    async fn encode(
        &self,
        timeline: &Timeline,
        spec: &OutputSpec,
        output: &Path,
        timeout: Duration,
    ) -> Result<EncodedOutput, EncoderError>;
}

// ============================================================================
// FFmpeg concat
// ============================================================================

/// Normalizes every entry to a clip with audio, then concatenates them.
pub struct FfmpegConcatEncoder {
    toolchain: Arc<FfmpegToolchain>,
    probe: Arc<dyn MediaProbe>,
    fps: u32,
}

impl FfmpegConcatEncoder {
    pub const NAME: &'static str = "ffmpeg_concat";

    pub fn new(toolchain: Arc<FfmpegToolchain>, probe: Arc<dyn MediaProbe>, fps: u32) -> Self {
        Self {
            toolchain,
            probe,
            fps,
        }
    }

    /// Arguments producing one normalized clip for `entry`.
    fn build_entry_args(
        &self,
        entry: &TimelineEntry,
        slide: Option<&SlideDescriptor>,
        resolution: Resolution,
        output: &Path,
    ) -> Vec<String> {
        let (w, h) = (resolution.width, resolution.height);
        let mut args = vec!["-y".to_string(), "-hide_banner".to_string()];

        let mut video_filter = format!(
            "[0:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={}",
            self.fps
        );

        match slide {
            Some(slide) => {
                args.extend([
                    "-f".to_string(),
                    "lavfi".to_string(),
                    "-i".to_string(),
                    format!(
                        "color=c={}:s={}x{}:r={}:d={:.3}",
                        slide.background.replace('#', "0x"),
                        slide.width,
                        slide.height,
                        self.fps,
                        slide.duration_secs
                    ),
                ]);
                video_filter.push(',');
                video_filter.push_str(&drawtext_filter(&slide.title, h));
            }
            None => {
                args.extend([
                    "-i".to_string(),
                    entry.segment.path.to_string_lossy().to_string(),
                ]);
            }
        }

        match &entry.audio_path {
            Some(audio) => args.extend(["-i".to_string(), audio.to_string_lossy().to_string()]),
            None => args.extend([
                "-f".to_string(),
                "lavfi".to_string(),
                "-i".to_string(),
                "anullsrc=r=48000:cl=stereo".to_string(),
            ]),
        }

        // Hold the last frame and pad the narration so neither track is cut.
        if entry.hold_secs > 0.0 {
            video_filter.push_str(&format!(
                ",tpad=stop_mode=clone:stop_duration={:.3}",
                entry.hold_secs
            ));
        }
        let audio_filter = format!(
            "[1:a]aresample=48000,apad=pad_dur={:.3}",
            entry.pad_secs
        );

        args.extend([
            "-filter_complex".to_string(),
            format!("{}[v];{}[a]", video_filter, audio_filter),
            "-map".to_string(),
            "[v]".to_string(),
            "-map".to_string(),
            "[a]".to_string(),
            "-t".to_string(),
            format!("{:.3}", entry.duration_secs),
        ]);
        args.extend(
            [
                "-c:v", "libx264", "-preset", "veryfast", "-crf", "16", "-pix_fmt", "yuv420p",
                "-c:a", "aac", "-b:a", "192k",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(output.to_string_lossy().to_string());
        args
    }

    /// Arguments for the final concat and encode.
    fn build_concat_args(&self, list: &Path, spec: &OutputSpec, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            list.to_string_lossy().to_string(),
            "-c:v".to_string(),
            spec.format.video_codec().to_string(),
        ];

        match spec.compression.bitrate_kbps {
            Some(kbps) => args.extend(["-b:v".to_string(), format!("{}k", kbps)]),
            None => {
                args.extend(["-crf".to_string(), spec.effective_crf().to_string()]);
                // VP9 needs an explicit zero bitrate for constant quality.
                if spec.format.video_codec() == "libvpx-vp9" {
                    args.extend(["-b:v".to_string(), "0".to_string()]);
                }
            }
        }
        if spec.format.video_codec() == "libx264" {
            args.extend([
                "-preset".to_string(),
                spec.effective_encoder_preset().to_string(),
            ]);
        }

        args.extend([
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            spec.format.audio_codec().to_string(),
            "-b:a".to_string(),
            format!("{}k", spec.compression.audio_bitrate_kbps.unwrap_or(160)),
        ]);
        args.push(output.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl TimelineEncoder for FfmpegConcatEncoder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_available(&self) -> bool {
        self.toolchain.is_available()
    }

    fn extension(&self, spec: &OutputSpec) -> String {
        spec.format.extension().to_string()
    }

    async fn encode(
        &self,
        timeline: &Timeline,
        spec: &OutputSpec,
        output: &Path,
        timeout: Duration,
    ) -> Result<EncodedOutput, EncoderError> {
        if !self.toolchain.is_available() {
            return Err(EncoderError::Unavailable {
                encoder: Self::NAME.to_string(),
            });
        }
        if timeline.is_empty() {
            return Err(EncoderError::EmptyTimeline);
        }

        let scratch = scratch_dir(output);
        tokio::fs::create_dir_all(&scratch).await?;

        let mut list = String::new();
        for (i, entry) in timeline.entries.iter().enumerate() {
            let slide = match entry.segment.kind {
                SegmentKind::Slide => Some(read_slide(&entry.segment.path).await?),
                SegmentKind::Video => None,
            };
            let clip = scratch.join(format!("clip-{:03}.mp4", i));
            let args = self.build_entry_args(entry, slide.as_ref(), spec.resolution, &clip);
            self.toolchain.run(&args, timeout).await?;

            list.push_str(&format!(
                "file '{}'\n",
                clip.to_string_lossy().replace('\'', "'\\''")
            ));
        }

        let list_path = scratch.join("concat.txt");
        tokio::fs::write(&list_path, list).await?;

        let args = self.build_concat_args(&list_path, spec, output);
        self.toolchain.run(&args, timeout).await?;

        let size_bytes = tokio::fs::metadata(output).await?.len();
        let duration_secs = match self.probe.duration_secs(output).await {
            Ok(secs) => secs,
            Err(e) => {
                debug!("Probe of {} failed ({}), using timeline length", output.display(), e);
                timeline.total_secs()
            }
        };

        let _ = tokio::fs::remove_dir_all(&scratch).await;

        Ok(EncodedOutput {
            path: output.to_path_buf(),
            size_bytes,
            duration_secs,
        })
    }
}

// ============================================================================
// Manifest
// ============================================================================

/// Render manifest written when no video encoder is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderManifest {
    pub format: String,
    pub resolution: Resolution,
    pub crf: u8,
    pub duration_secs: f64,
    pub scenes: Vec<ManifestScene>,
}

/// One scene in a render manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestScene {
    pub scene_id: String,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub method: String,
    pub placeholder: bool,
    pub hold_secs: f64,
    pub pad_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide: Option<SlideDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<PathBuf>,
}

/// Pure Rust encoder writing a JSON render manifest. Always available.
#[derive(Debug, Default)]
pub struct ManifestEncoder;

impl ManifestEncoder {
    pub const NAME: &'static str = "manifest";

    pub fn new() -> Self {
        Self
    }

    async fn build(
        timeline: &Timeline,
        spec: &OutputSpec,
    ) -> Result<RenderManifest, EncoderError> {
        let mut scenes = Vec::with_capacity(timeline.len());
        let mut start = 0.0;
        for entry in &timeline.entries {
            let (slide, video) = match entry.segment.kind {
                SegmentKind::Slide => (Some(read_slide(&entry.segment.path).await?), None),
                SegmentKind::Video => (None, Some(entry.segment.path.clone())),
            };
            scenes.push(ManifestScene {
                scene_id: entry.scene_id.clone(),
                start_secs: start,
                duration_secs: entry.duration_secs,
                method: entry.segment.method.clone(),
                placeholder: entry.placeholder,
                hold_secs: entry.hold_secs,
                pad_secs: entry.pad_secs,
                audio: entry.audio_path.clone(),
                slide,
                video,
            });
            start += entry.duration_secs;
        }

        Ok(RenderManifest {
            format: spec.format.extension().to_string(),
            resolution: spec.resolution,
            crf: spec.effective_crf(),
            duration_secs: timeline.total_secs(),
            scenes,
        })
    }
}

#[async_trait]
impl TimelineEncoder for ManifestEncoder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    fn extension(&self, _spec: &OutputSpec) -> String {
        "json".to_string()
    }

    async fn encode(
        &self,
        timeline: &Timeline,
        spec: &OutputSpec,
        output: &Path,
        _timeout: Duration,
    ) -> Result<EncodedOutput, EncoderError> {
        if timeline.is_empty() {
            return Err(EncoderError::EmptyTimeline);
        }

        let manifest = Self::build(timeline, spec).await?;
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| EncoderError::Serialization(e.to_string()))?;

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, &json).await?;

        Ok(EncodedOutput {
            path: output.to_path_buf(),
            size_bytes: json.len() as u64,
            duration_secs: manifest.duration_secs,
        })
    }
}

async fn read_slide(path: &Path) -> Result<SlideDescriptor, EncoderError> {
    let raw = tokio::fs::read(path).await?;
    serde_json::from_slice(&raw).map_err(|e| {
        EncoderError::Serialization(format!("invalid slide {}: {}", path.display(), e))
    })
}

fn scratch_dir(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    output
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{}-clips", stem))
}
