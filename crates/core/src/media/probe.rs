//! Media duration measurement.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;

use super::error::ProbeError;
use super::toolchain::FfmpegToolchain;

/// Measures media durations.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Duration of the media file in seconds.
    async fn duration_secs(&self, path: &Path) -> Result<f64, ProbeError>;
}

/// Probe backed by ffprobe.
pub struct FfprobeProbe {
    toolchain: Arc<FfmpegToolchain>,
}

impl FfprobeProbe {
    pub fn new(toolchain: Arc<FfmpegToolchain>) -> Self {
        Self { toolchain }
    }

    fn parse_duration(output: &str) -> Result<f64, ProbeError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| ProbeError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| ProbeError::ParseError {
                reason: "ffprobe reported no duration".to_string(),
            })
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn duration_secs(&self, path: &Path) -> Result<f64, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::NotFound {
                path: path.to_path_buf(),
            });
        }
        if !self.toolchain.probe_available() {
            return Err(ProbeError::ProbeUnavailable {
                path: self.toolchain.ffprobe_path().to_path_buf(),
            });
        }

        let output = Command::new(self.toolchain.ffprobe_path())
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProbeError::ProbeFailed {
                reason: format!(
                    "ffprobe failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        Self::parse_duration(&String::from_utf8_lossy(&output.stdout))
    }
}
