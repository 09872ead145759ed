//! Static slide composition. Pure Rust, always available.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::error::ComposerError;
use super::traits::CompositionMethod;
use super::types::{ComposeRequest, Segment, SegmentKind, SlideDescriptor};
use crate::script::Scene;

/// Writes a slide descriptor that encoders turn into frames.
#[derive(Debug, Default)]
pub struct StaticSlideMethod;

impl StaticSlideMethod {
    pub const NAME: &'static str = "static_slide";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompositionMethod for StaticSlideMethod {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    fn requires_external_tools(&self) -> bool {
        false
    }

    async fn compose(
        &self,
        _scene: &Scene,
        request: &ComposeRequest,
    ) -> Result<Segment, ComposerError> {
        tokio::fs::create_dir_all(&request.work_dir).await?;

        let descriptor = SlideDescriptor {
            title: request.title.clone(),
            background: background_for(&request.title),
            width: request.resolution.width,
            height: request.resolution.height,
            duration_secs: request.target_duration_secs,
        };
        let json = serde_json::to_vec_pretty(&descriptor)
            .map_err(|e| ComposerError::failed(Self::NAME, e.to_string()))?;

        let path = request.segment_path(Self::NAME, "json");
        tokio::fs::write(&path, json).await?;

        Ok(Segment {
            path,
            kind: SegmentKind::Slide,
            duration_secs: request.target_duration_secs,
            method: Self::NAME.to_string(),
        })
    }
}

/// Stable dark background colour derived from the title.
pub(crate) fn background_for(title: &str) -> String {
    let digest = Sha256::digest(title.as_bytes());
    // Halved channels keep white text readable.
    format!(
        "#{:02x}{:02x}{:02x}",
        digest[0] / 2,
        digest[1] / 2,
        digest[2] / 2
    )
}
