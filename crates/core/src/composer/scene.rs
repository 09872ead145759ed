//! Single-scene composition: timing, fallback and sync resolution.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::chain::CompositionChain;
use super::error::ComposerError;
use super::types::{AttemptOutcome, ComposeRequest};
use crate::assembler::TimelineEntry;
use crate::job::{ErrorCode, ErrorRecord};
use crate::media::MediaProbe;
use crate::render::Resolution;
use crate::script::Scene;
use crate::timing::{DurationCalculator, SyncValidator};

/// Longest title drawn on slides.
const TITLE_CHARS: usize = 80;

/// Scene composed and synchronized, plus what went wrong along the way.
#[derive(Debug)]
pub struct SceneOutcome {
    pub entry: TimelineEntry,
    /// Non-fatal records (missing audio, failed methods, placeholders).
    pub records: Vec<ErrorRecord>,
    pub warnings: Vec<String>,
}

/// Composes one scene through the chain and aligns it with its narration.
pub struct SceneComposer {
    chain: Arc<CompositionChain>,
    probe: Arc<dyn MediaProbe>,
    calculator: DurationCalculator,
    validator: SyncValidator,
    timeout: Duration,
}

impl SceneComposer {
    pub fn new(
        chain: Arc<CompositionChain>,
        probe: Arc<dyn MediaProbe>,
        calculator: DurationCalculator,
        validator: SyncValidator,
        timeout: Duration,
    ) -> Self {
        Self {
            chain,
            probe,
            calculator,
            validator,
            timeout,
        }
    }

    pub fn chain(&self) -> &CompositionChain {
        &self.chain
    }

    /// Target duration: the scene's own value clamped, or computed from narration.
    pub fn target_duration(&self, scene: &Scene) -> f64 {
        match scene.computed_duration {
            Some(secs) => self.calculator.clamp(secs),
            None => self.calculator.calculate(&scene.narration_text),
        }
    }

    /// Composes `scene`. Only fails when not even a placeholder can be made.
    pub async fn compose(
        &self,
        scene: &Scene,
        scene_index: usize,
        resolution: Resolution,
        work_dir: &Path,
    ) -> Result<SceneOutcome, ComposerError> {
        let mut records = Vec::new();
        let mut warnings = Vec::new();

        let target = self.target_duration(scene);
        let (audio_path, audio_secs) = self.measure_audio(scene, scene_index, &mut records).await;

        let request = ComposeRequest {
            scene_index,
            title: scene.title(TITLE_CHARS),
            target_duration_secs: target,
            resolution,
            work_dir: work_dir.to_path_buf(),
            timeout: self.timeout,
        };

        let run = self.chain.compose(scene, &request).await;
        for attempt in &run.attempts {
            let code = match attempt.outcome {
                AttemptOutcome::Timeout => ErrorCode::ComposerTimeout,
                AttemptOutcome::AssetMissing => ErrorCode::AssetMissing,
                AttemptOutcome::Failed => ErrorCode::ComposerFailed,
                AttemptOutcome::Success | AttemptOutcome::Unavailable => continue,
            };
            records.push(
                ErrorRecord::new(
                    code,
                    attempt.error.clone().unwrap_or_default(),
                    attempt.outcome == AttemptOutcome::Timeout,
                )
                .with_context("scene_index", scene_index)
                .with_context("method", &attempt.method_name),
            );
        }

        let (composed, placeholder) = match run.result {
            Ok(composed) => (composed, false),
            Err(err) => {
                warn!(
                    "Scene {} ({}) exhausted all methods, using placeholder",
                    scene_index, scene.id
                );
                records.push(
                    ErrorRecord::new(ErrorCode::AllMethodsExhausted, err.to_string(), true)
                        .with_context("scene_index", scene_index),
                );
                let composed = self.chain.compose_placeholder(scene, &request).await?;
                (composed, true)
            }
        };

        if composed.rank > 0 && !placeholder {
            let preferred = self.chain.method_name(0).unwrap_or("unknown");
            warnings.push(format!(
                "scene {} rendered with {} (preferred {})",
                scene.id, composed.segment.method, preferred
            ));
        } else if placeholder {
            warnings.push(format!(
                "scene {} replaced by a {} placeholder",
                scene.id, composed.segment.method
            ));
        }

        // Never truncate narration: hold the last frame or pad with silence.
        let segment_secs = composed.segment.duration_secs;
        let report = self.validator.validate_scene(audio_secs, segment_secs);
        if !report.in_sync {
            debug!(
                "Scene {} out of sync by {:.2}s, hold {:.2}s pad {:.2}s",
                scene_index, report.delta_secs, report.hold_secs, report.pad_secs
            );
        }

        Ok(SceneOutcome {
            entry: TimelineEntry {
                scene_id: scene.id.clone(),
                scene_index,
                narration_text: scene.narration_text.clone(),
                audio_path,
                audio_secs,
                hold_secs: report.hold_secs,
                pad_secs: report.pad_secs,
                duration_secs: report.resolved_secs(audio_secs, segment_secs),
                method_rank: composed.rank,
                placeholder,
                segment: composed.segment,
            },
            records,
            warnings,
        })
    }

    /// Narration audio and its length. Missing or unreadable audio becomes
    /// silence plus an `AssetMissing` record.
    async fn measure_audio(
        &self,
        scene: &Scene,
        scene_index: usize,
        records: &mut Vec<ErrorRecord>,
    ) -> (Option<std::path::PathBuf>, f64) {
        let Some(path) = &scene.audio_asset_ref else {
            records.push(
                ErrorRecord::new(
                    ErrorCode::AssetMissing,
                    format!("scene {} has no narration audio, using silence", scene.id),
                    false,
                )
                .with_context("scene_index", scene_index),
            );
            return (None, 0.0);
        };

        match self.probe.duration_secs(path).await {
            Ok(secs) => (Some(path.clone()), secs),
            Err(e) => {
                warn!("Scene {} audio unusable: {}", scene_index, e);
                records.push(
                    ErrorRecord::new(
                        ErrorCode::AssetMissing,
                        format!("narration audio {} unusable: {}", path.display(), e),
                        false,
                    )
                    .with_context("scene_index", scene_index),
                );
                (None, 0.0)
            }
        }
    }
}
