//! FFmpeg-backed composition methods.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::error::ComposerError;
use super::slide::background_for;
use super::traits::CompositionMethod;
use super::types::{ComposeRequest, Segment, SegmentKind};
use crate::media::FfmpegToolchain;
use crate::script::Scene;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "gif"];

/// Renders the scene's visual asset, scaled and padded to the output frame.
pub struct HighFidelityMethod {
    toolchain: Arc<FfmpegToolchain>,
    fps: u32,
}

impl HighFidelityMethod {
    pub const NAME: &'static str = "high_fidelity";

    pub fn new(toolchain: Arc<FfmpegToolchain>, fps: u32) -> Self {
        Self { toolchain, fps }
    }

    fn build_args(&self, input: &Path, output: &Path, request: &ComposeRequest) -> Vec<String> {
        let is_image = input
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);

        let mut args = vec!["-y".to_string(), "-hide_banner".to_string()];

        // Stills loop as a single frame; clips loop until the target length.
        if is_image {
            args.extend(["-loop".to_string(), "1".to_string()]);
        } else {
            args.extend(["-stream_loop".to_string(), "-1".to_string()]);
        }
        args.extend(["-i".to_string(), input.to_string_lossy().to_string()]);

        let (w, h) = (request.resolution.width, request.resolution.height);
        args.extend([
            "-t".to_string(),
            format!("{:.3}", request.target_duration_secs),
            "-vf".to_string(),
            format!(
                "scale={w}:{h}:force_original_aspect_ratio=decrease,\
                 pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={}",
                self.fps
            ),
        ]);
        args.extend(segment_codec_args());
        args.push(output.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl CompositionMethod for HighFidelityMethod {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_available(&self) -> bool {
        self.toolchain.is_available()
    }

    async fn compose(
        &self,
        scene: &Scene,
        request: &ComposeRequest,
    ) -> Result<Segment, ComposerError> {
        let input = match &scene.visual_asset_ref {
            Some(path) if path.exists() => path,
            Some(path) => {
                return Err(ComposerError::AssetMissing { path: path.clone() });
            }
            None => {
                return Err(ComposerError::Unavailable {
                    method: Self::NAME.to_string(),
                });
            }
        };

        tokio::fs::create_dir_all(&request.work_dir).await?;
        let output = request.segment_path(Self::NAME, "mp4");
        let args = self.build_args(input, &output, request);
        self.toolchain.run(&args, request.timeout).await?;

        Ok(Segment {
            path: output,
            kind: SegmentKind::Video,
            duration_secs: request.target_duration_secs,
            method: Self::NAME.to_string(),
        })
    }
}

/// Synthesizes a solid background with the scene title drawn on it.
pub struct FrameBufferMethod {
    toolchain: Arc<FfmpegToolchain>,
    fps: u32,
}

impl FrameBufferMethod {
    pub const NAME: &'static str = "frame_buffer";

    pub fn new(toolchain: Arc<FfmpegToolchain>, fps: u32) -> Self {
        Self { toolchain, fps }
    }

    fn build_args(&self, output: &Path, request: &ComposeRequest) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!(
                "color=c={}:s={}:r={}:d={:.3}",
                background_for(&request.title).replace('#', "0x"),
                request.resolution,
                self.fps,
                request.target_duration_secs
            ),
            "-vf".to_string(),
            drawtext_filter(&request.title, request.resolution.height),
        ];
        args.extend(segment_codec_args());
        args.push(output.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl CompositionMethod for FrameBufferMethod {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_available(&self) -> bool {
        self.toolchain.is_available()
    }

    async fn compose(
        &self,
        _scene: &Scene,
        request: &ComposeRequest,
    ) -> Result<Segment, ComposerError> {
        tokio::fs::create_dir_all(&request.work_dir).await?;
        let output = request.segment_path(Self::NAME, "mp4");
        let args = self.build_args(&output, request);
        self.toolchain.run(&args, request.timeout).await?;

        Ok(Segment {
            path: output,
            kind: SegmentKind::Video,
            duration_secs: request.target_duration_secs,
            method: Self::NAME.to_string(),
        })
    }
}

/// Intermediate segments use a fast lossless-ish encode; the final
/// quality settings are applied once at timeline encode.
fn segment_codec_args() -> Vec<String> {
    ["-an", "-c:v", "libx264", "-preset", "veryfast", "-crf", "16", "-pix_fmt", "yuv420p"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// `drawtext` filter centring `text` on the frame, escaped for use inside a
/// filtergraph (`-vf` or `-filter_complex`). Expansion is off so `%` is literal.
pub(crate) fn drawtext_filter(text: &str, frame_height: u32) -> String {
    format!(
        "drawtext=expansion=none:text={}:fontcolor=white:fontsize={}:x=(w-text_w)/2:y=(h-text_h)/2",
        escape_filtergraph(&escape_option_value(text)),
        (frame_height / 18).max(12)
    )
}

/// First level: the value of one `key=value` filter option.
fn escape_option_value(text: &str) -> String {
    escape_chars(text, &['\\', '\'', ':'])
}

/// Second level: a filter's argument string inside the graph description.
fn escape_filtergraph(text: &str) -> String {
    escape_chars(text, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(text: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use std::path::PathBuf;

    fn toolchain() -> Arc<FfmpegToolchain> {
        Arc::new(FfmpegToolchain::unavailable())
    }

    #[test]
    fn test_high_fidelity_image_args() {
        let method = HighFidelityMethod::new(toolchain(), 30);
        let request = fixtures::compose_request(Path::new("/work"), 0);
        let args = method.build_args(
            Path::new("/assets/still.PNG"),
            Path::new("/work/out.mp4"),
            &request,
        );

        assert_eq!(&args[2..4], &["-loop", "1"]);
        assert!(args.contains(&"/assets/still.PNG".to_string()));
        let vf = &args[args.iter().position(|a| a == "-vf").unwrap() + 1];
        assert!(vf.starts_with("scale=1280:720:force_original_aspect_ratio=decrease,"));
        assert!(vf.ends_with("fps=30"));
        assert_eq!(args.last().unwrap(), "/work/out.mp4");
    }

    #[test]
    fn test_high_fidelity_video_loops_stream() {
        let method = HighFidelityMethod::new(toolchain(), 25);
        let request = fixtures::compose_request(Path::new("/work"), 0);
        let args = method.build_args(
            Path::new("/assets/clip.mov"),
            Path::new("/work/out.mp4"),
            &request,
        );
        assert_eq!(&args[2..4], &["-stream_loop", "-1"]);
    }

    #[test]
    fn test_frame_buffer_args() {
        let method = FrameBufferMethod::new(toolchain(), 30);
        let request = fixtures::compose_request(Path::new("/work"), 0);
        let args = method.build_args(Path::new("/work/out.mp4"), &request);

        let source = &args[5];
        assert!(source.starts_with("color=c=0x"));
        assert!(source.contains(":s=1280x720:r=30:d="));
        assert!(args[7].starts_with("drawtext=expansion=none:text=Scene 0:"));
    }

    #[test]
    fn test_drawtext_escapes_quotes_colons_and_commas() {
        assert_eq!(
            drawtext_filter("It's 50%: a, b", 720),
            "drawtext=expansion=none:text=It\\\\\\'s 50%\\\\: a\\, b:fontcolor=white:\
             fontsize=40:x=(w-text_w)/2:y=(h-text_h)/2"
        );
        assert_eq!(
            drawtext_filter(r"[a\b];", 720),
            r"drawtext=expansion=none:text=\[a\\\\b\]\;:fontcolor=white:fontsize=40:x=(w-text_w)/2:y=(h-text_h)/2"
        );
    }

    #[tokio::test]
    async fn test_missing_visual_asset() {
        let method = HighFidelityMethod::new(toolchain(), 30);
        let temp = tempfile::tempdir().unwrap();
        let scene =
            fixtures::scene(0, 10).with_visual(PathBuf::from("/nonexistent/reelforge.png"));

        let err = method
            .compose(&scene, &fixtures::compose_request(temp.path(), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ComposerError::AssetMissing { .. }));
    }

    #[tokio::test]
    async fn test_scene_without_visual_declines() {
        let method = HighFidelityMethod::new(toolchain(), 30);
        let temp = tempfile::tempdir().unwrap();

        let err = method
            .compose(&fixtures::scene(0, 10), &fixtures::compose_request(temp.path(), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ComposerError::Unavailable { ref method } if method == "high_fidelity"));
    }

    #[test]
    fn test_unavailable_without_ffmpeg() {
        assert!(!HighFidelityMethod::new(toolchain(), 30).is_available());
        assert!(!FrameBufferMethod::new(toolchain(), 30).is_available());
    }
}
