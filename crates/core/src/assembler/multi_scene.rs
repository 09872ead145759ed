//! Builds one output's timeline scene by scene and encodes it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::encoder::{EncodedOutput, TimelineEncoder};
use super::error::AssemblyError;
use super::timeline::Timeline;
use crate::composer::SceneComposer;
use crate::interactive::InteractivePackage;
use crate::job::ErrorRecord;
use crate::render::OutputSpec;
use crate::script::Scene;
use crate::timing::SyncValidator;

/// Progress signal sent while outputs are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// One scene of one output was composed.
    SceneComposed { output_index: usize, scene_index: usize },
    /// One output finished (successfully or not).
    OutputFinished { output_index: usize },
}

/// Everything the assembler needs for one output.
pub struct AssemblyInput<'a> {
    pub scenes: &'a [Scene],
    pub spec: &'a OutputSpec,
    pub spec_index: usize,
    pub label: &'a str,
    /// Staging directory owned by this output.
    pub stage_dir: &'a Path,
    pub cancel: &'a CancellationToken,
    pub progress: Option<&'a UnboundedSender<ProgressEvent>>,
}

/// An encoded, validated output still in its staging directory.
#[derive(Debug)]
pub struct Assembly {
    pub timeline: Timeline,
    pub encoded: EncodedOutput,
    pub encoder: String,
    pub extension: String,
    pub records: Vec<ErrorRecord>,
    pub warnings: Vec<String>,
    /// Filled in by the caller for interactive outputs.
    pub interactive_package: Option<InteractivePackage>,
}

/// Composes scenes in script order, then encodes the resulting timeline.
pub struct MultiSceneAssembler {
    composer: Arc<SceneComposer>,
    encoders: Vec<Arc<dyn TimelineEncoder>>,
    validator: SyncValidator,
    encode_timeout: Duration,
}

impl MultiSceneAssembler {
    pub fn new(
        composer: Arc<SceneComposer>,
        encoders: Vec<Arc<dyn TimelineEncoder>>,
        validator: SyncValidator,
        encode_timeout: Duration,
    ) -> Self {
        Self {
            composer,
            encoders,
            validator,
            encode_timeout,
        }
    }

    pub fn composer(&self) -> &SceneComposer {
        &self.composer
    }

    /// Names of the configured encoders in preference order.
    pub fn encoder_names(&self) -> Vec<String> {
        self.encoders.iter().map(|e| e.name().to_string()).collect()
    }

    /// Assembles one output. The timeline always holds one entry per scene.
    pub async fn assemble(&self, input: AssemblyInput<'_>) -> Result<Assembly, AssemblyError> {
        let mut timeline = Timeline::new();
        let mut records = Vec::new();
        let mut warnings = Vec::new();

        let segments_dir = input.stage_dir.join("segments");
        tokio::fs::create_dir_all(&segments_dir).await?;

        for (scene_index, scene) in input.scenes.iter().enumerate() {
            // Checked between scenes only; an in-flight composition is never interrupted.
            if input.cancel.is_cancelled() {
                info!(
                    "Output {} cancelled after {} of {} scenes",
                    input.spec_index,
                    scene_index,
                    input.scenes.len()
                );
                return Err(AssemblyError::Cancelled);
            }

            let outcome = self
                .composer
                .compose(scene, scene_index, input.spec.resolution, &segments_dir)
                .await
                .map_err(|source| AssemblyError::SceneFailed {
                    scene_index,
                    source,
                })?;

            records.extend(
                outcome
                    .records
                    .into_iter()
                    .map(|r| r.with_context("output_index", input.spec_index)),
            );
            warnings.extend(outcome.warnings);
            timeline.push(outcome.entry);

            if let Some(tx) = input.progress {
                let _ = tx.send(ProgressEvent::SceneComposed {
                    output_index: input.spec_index,
                    scene_index,
                });
            }
        }

        if input.cancel.is_cancelled() {
            return Err(AssemblyError::Cancelled);
        }

        let (rank, encoder) = self
            .encoders
            .iter()
            .enumerate()
            .find(|(_, e)| e.is_available())
            .ok_or(AssemblyError::NoEncoder)?;
        if rank > 0 {
            let preferred = self.encoders[0].name();
            warn!(
                "Output {} encoded with {} ({} unavailable)",
                input.spec_index,
                encoder.name(),
                preferred
            );
            warnings.push(format!(
                "output encoded with {} ({} unavailable)",
                encoder.name(),
                preferred
            ));
        }

        let extension = encoder.extension(input.spec);
        let staged = input.stage_dir.join(format!("{}.{}", input.label, extension));
        let encoded = encoder
            .encode(&timeline, input.spec, &staged, self.encode_timeout)
            .await?;

        if encoded.size_bytes == 0 {
            return Err(AssemblyError::EmptyOutput { path: staged });
        }

        let expected = timeline.total_secs();
        let report = self.validator.validate_total(expected, encoded.duration_secs);
        if !report.in_sync {
            return Err(AssemblyError::SyncMismatch {
                expected_secs: expected,
                actual_secs: encoded.duration_secs,
            });
        }

        debug!(
            "Output {} assembled: {} scenes, {:.2}s, {} bytes via {}",
            input.spec_index,
            timeline.len(),
            encoded.duration_secs,
            encoded.size_bytes,
            encoder.name()
        );

        Ok(Assembly {
            timeline,
            encoded,
            encoder: encoder.name().to_string(),
            extension,
            records,
            warnings,
            interactive_package: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::ManifestEncoder;
    use crate::composer::{CompositionChain, CompositionMethod};
    use crate::media::MediaProbe;
    use crate::render::{Resolution, VideoFormat};
    use crate::testing::{fixtures, MockCompositionMethod, MockEncoder, MockProbe};
    use crate::timing::{DurationCalculator, TimingConfig};

    fn composer(method: Arc<MockCompositionMethod>) -> Arc<SceneComposer> {
        let timing = TimingConfig::default();
        let chain =
            CompositionChain::new(vec![method as Arc<dyn CompositionMethod>]).unwrap();
        Arc::new(SceneComposer::new(
            Arc::new(chain),
            Arc::new(MockProbe::new(0.0)) as Arc<dyn MediaProbe>,
            DurationCalculator::new(&timing),
            SyncValidator::new(timing.scene_tolerance_secs, timing.global_tolerance_secs),
            Duration::from_secs(5),
        ))
    }

    fn assembler(encoders: Vec<Arc<dyn TimelineEncoder>>) -> MultiSceneAssembler {
        MultiSceneAssembler::new(
            composer(Arc::new(MockCompositionMethod::new("slide"))),
            encoders,
            SyncValidator::new(0.5, 2.0),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_assembles_scenes_in_order() {
        let temp = tempfile::tempdir().unwrap();
        let asm = assembler(vec![Arc::new(ManifestEncoder::new())]);
        let scenes = vec![
            fixtures::scene(0, 10),
            fixtures::scene(1, 200),
            fixtures::scene(2, 600),
        ];
        let spec = OutputSpec::new(VideoFormat::Mp4, Resolution::full_hd());
        let cancel = CancellationToken::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let assembly = asm
            .assemble(AssemblyInput {
                scenes: &scenes,
                spec: &spec,
                spec_index: 0,
                label: "web",
                stage_dir: temp.path(),
                cancel: &cancel,
                progress: Some(&tx),
            })
            .await
            .unwrap();

        let ids: Vec<_> = assembly.timeline.entries.iter().map(|e| e.scene_id.as_str()).collect();
        assert_eq!(ids, vec!["scene-0", "scene-1", "scene-2"]);
        // 60 + 150 + 300 with the default pause multiplier
        assert_eq!(assembly.encoded.duration_secs, 510.0);
        assert_eq!(assembly.encoder, "manifest");
        assert!(assembly.encoded.path.ends_with("web.json"));

        drop(tx);
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_before_first_scene() {
        let temp = tempfile::tempdir().unwrap();
        let asm = assembler(vec![Arc::new(ManifestEncoder::new())]);
        let scenes = vec![fixtures::scene(0, 10)];
        let spec = OutputSpec::new(VideoFormat::Mp4, Resolution::hd());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = asm
            .assemble(AssemblyInput {
                scenes: &scenes,
                spec: &spec,
                spec_index: 0,
                label: "web",
                stage_dir: temp.path(),
                cancel: &cancel,
                progress: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyError::Cancelled));
    }

    #[tokio::test]
    async fn test_encoder_fallback_warns() {
        let temp = tempfile::tempdir().unwrap();
        let unavailable = Arc::new(MockEncoder::new("video"));
        unavailable.set_available(false);
        let asm = assembler(vec![
            unavailable as Arc<dyn TimelineEncoder>,
            Arc::new(ManifestEncoder::new()),
        ]);
        let scenes = vec![fixtures::scene(0, 10)];
        let spec = OutputSpec::new(VideoFormat::Mp4, Resolution::hd());
        let cancel = CancellationToken::new();

        let assembly = asm
            .assemble(AssemblyInput {
                scenes: &scenes,
                spec: &spec,
                spec_index: 0,
                label: "web",
                stage_dir: temp.path(),
                cancel: &cancel,
                progress: None,
            })
            .await
            .unwrap();
        assert_eq!(assembly.encoder, "manifest");
        assert!(assembly.warnings.iter().any(|w| w.contains("video unavailable")));
    }

    #[tokio::test]
    async fn test_duration_mismatch_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let encoder = Arc::new(MockEncoder::new("video"));
        encoder.set_duration_offset(5.0);
        let asm = assembler(vec![encoder as Arc<dyn TimelineEncoder>]);
        let scenes = vec![fixtures::scene(0, 10)];
        let spec = OutputSpec::new(VideoFormat::Mp4, Resolution::hd());
        let cancel = CancellationToken::new();

        let err = asm
            .assemble(AssemblyInput {
                scenes: &scenes,
                spec: &spec,
                spec_index: 0,
                label: "web",
                stage_dir: temp.path(),
                cancel: &cancel,
                progress: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyError::SyncMismatch { .. }));
    }

    #[tokio::test]
    async fn test_empty_output_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let encoder = Arc::new(MockEncoder::new("video"));
        encoder.set_empty_output(true);
        let asm = assembler(vec![encoder as Arc<dyn TimelineEncoder>]);
        let scenes = vec![fixtures::scene(0, 10)];
        let spec = OutputSpec::new(VideoFormat::Mp4, Resolution::hd());
        let cancel = CancellationToken::new();

        let err = asm
            .assemble(AssemblyInput {
                scenes: &scenes,
                spec: &spec,
                spec_index: 0,
                label: "web",
                stage_dir: temp.path(),
                cancel: &cancel,
                progress: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyError::EmptyOutput { .. }));
    }

    #[tokio::test]
    async fn test_no_encoder() {
        let temp = tempfile::tempdir().unwrap();
        let asm = assembler(vec![]);
        let scenes = vec![fixtures::scene(0, 10)];
        let spec = OutputSpec::new(VideoFormat::Mp4, Resolution::hd());
        let cancel = CancellationToken::new();

        let err = asm
            .assemble(AssemblyInput {
                scenes: &scenes,
                spec: &spec,
                spec_index: 0,
                label: "web",
                stage_dir: temp.path(),
                cancel: &cancel,
                progress: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyError::NoEncoder));
    }
}
