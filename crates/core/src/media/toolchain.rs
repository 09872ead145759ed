//! FFmpeg detection and invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::error::ToolError;

/// Paths to ffmpeg/ffprobe plus whether each was found at startup.
///
/// Detection runs once, so availability checks are plain field reads.
#[derive(Debug, Clone)]
pub struct FfmpegToolchain {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    ffmpeg_available: bool,
    ffprobe_available: bool,
}

impl FfmpegToolchain {
    /// Probes both binaries with `-version`.
    pub async fn detect(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        let ffmpeg_path = ffmpeg_path.into();
        let ffprobe_path = ffprobe_path.into();

        let ffmpeg_available = responds_to_version(&ffmpeg_path).await;
        let ffprobe_available = responds_to_version(&ffprobe_path).await;

        if ffmpeg_available {
            info!("FFmpeg found at {}", ffmpeg_path.display());
        } else {
            warn!(
                "FFmpeg not found at {}, ffmpeg-based methods disabled",
                ffmpeg_path.display()
            );
        }
        if !ffprobe_available {
            warn!("FFprobe not found at {}", ffprobe_path.display());
        }

        Self {
            ffmpeg_path,
            ffprobe_path,
            ffmpeg_available,
            ffprobe_available,
        }
    }

    /// Toolchain that reports both binaries missing.
    pub fn unavailable() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            ffmpeg_available: false,
            ffprobe_available: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.ffmpeg_available
    }

    pub fn probe_available(&self) -> bool {
        self.ffprobe_available
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe_path
    }

    /// Runs ffmpeg with the given arguments, killing it if it overruns.
    pub async fn run(&self, args: &[String], limit: Duration) -> Result<(), ToolError> {
        if !self.ffmpeg_available {
            return Err(ToolError::NotAvailable {
                path: self.ffmpeg_path.clone(),
            });
        }

        debug!("Running ffmpeg {}", args.join(" "));

        let child = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the wait future on timeout drops the child, which kills it.
        match timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let tail = tail_lines(&stderr, 20);
                Err(ToolError::failed(
                    format!("FFmpeg exited with code: {:?}", output.status.code()),
                    if tail.is_empty() { None } else { Some(tail) },
                ))
            }
            Ok(Err(e)) => Err(ToolError::Io(e)),
            Err(_) => Err(ToolError::Timeout {
                timeout_ms: limit.as_millis() as u64,
            }),
        }
    }
}

async fn responds_to_version(path: &Path) -> bool {
    Command::new(path)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Last `n` lines of a process's stderr.
fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detect_missing_binary() {
        let toolchain = FfmpegToolchain::detect(
            "/nonexistent/reelforge/ffmpeg",
            "/nonexistent/reelforge/ffprobe",
        )
        .await;
        assert!(!toolchain.is_available());
        assert!(!toolchain.probe_available());
    }

    #[tokio::test]
    async fn test_run_when_unavailable() {
        let toolchain = FfmpegToolchain::unavailable();
        let err = toolchain
            .run(&["-version".to_string()], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotAvailable { .. }));
    }

    #[test]
    fn test_tail_lines() {
        assert_eq!(tail_lines("a\nb\nc", 2), "b\nc");
        assert_eq!(tail_lines("a", 5), "a");
        assert_eq!(tail_lines("", 5), "");
    }
}
