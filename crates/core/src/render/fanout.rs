//! Renders every requested output of a job concurrently and in isolation.

use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::RenderConfig;
use super::types::{OutputResult, OutputSpec};
use crate::assembler::{
    publish_file, Assembly, AssemblyError, AssemblyInput, ManifestEncoder, MultiSceneAssembler,
    ProgressEvent,
};
use crate::interactive;
use crate::job::{ErrorCode, ErrorRecord, JobRequest};
use crate::metrics;

/// One job attempt to render.
pub struct FanoutRequest<'a> {
    pub job_id: &'a str,
    pub attempt: u32,
    pub request: &'a JobRequest,
    /// Spec indices to render this attempt, ascending.
    pub indices: &'a [usize],
    pub cancel: &'a CancellationToken,
    pub progress: Option<&'a UnboundedSender<ProgressEvent>>,
}

/// Outcome of one fan-out run.
#[derive(Debug, Default)]
pub struct FanoutReport {
    /// Published outputs in requested order.
    pub results: Vec<OutputResult>,
    /// Spec indices that did not produce an output.
    pub failed: Vec<usize>,
    /// Records in output order, then occurrence order.
    pub records: Vec<ErrorRecord>,
    /// Cancellation was observed; nothing was published.
    pub cancelled: bool,
}

impl FanoutReport {
    /// Whether any failure in this run may succeed on a later attempt.
    pub fn has_retryable_failure(&self) -> bool {
        self.records.iter().any(|r| r.retryable)
    }
}

enum TaskOutcome {
    Assembled(Box<Assembly>),
    Failed,
    Cancelled,
}

struct TaskResult {
    spec_index: usize,
    outcome: TaskOutcome,
    records: Vec<ErrorRecord>,
}

/// Format fan-out renderer.
pub struct FanoutRenderer {
    assembler: Arc<MultiSceneAssembler>,
    config: RenderConfig,
    slots: Arc<Semaphore>,
}

impl FanoutRenderer {
    pub fn new(assembler: Arc<MultiSceneAssembler>, config: RenderConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_parallel_outputs.max(1)));
        Self {
            assembler,
            config,
            slots,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn assembler(&self) -> &MultiSceneAssembler {
        &self.assembler
    }

    /// Scratch directory owned by `job_id`.
    pub fn job_work_dir(&self, job_id: &str) -> PathBuf {
        self.config.work_dir.join(job_id)
    }

    /// Directory outputs of `job_id` are published into.
    pub fn job_output_dir(&self, job_id: &str) -> PathBuf {
        self.config.output_dir.join(job_id)
    }

    /// Removes the job's scratch directory.
    pub async fn cleanup(&self, job_id: &str) {
        let dir = self.job_work_dir(job_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!("Removed work dir {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove work dir {}: {}", dir.display(), e),
        }
    }

    /// Renders the requested outputs. Failures become records, never errors.
    pub async fn render(&self, req: FanoutRequest<'_>) -> FanoutReport {
        let attempt_dir = self
            .job_work_dir(req.job_id)
            .join(format!("attempt-{}", req.attempt));

        let tasks = req.indices.iter().filter_map(|&index| {
            req.request
                .outputs
                .get(index)
                .map(|spec| self.render_one(&req, index, spec, &attempt_dir))
        });
        let task_results = join_all(tasks).await;

        let mut report = FanoutReport::default();
        report.cancelled = req.cancel.is_cancelled()
            || task_results
                .iter()
                .any(|t| matches!(t.outcome, TaskOutcome::Cancelled));

        let output_dir = self.job_output_dir(req.job_id);
        for task in task_results {
            report.records.extend(task.records);

            match task.outcome {
                TaskOutcome::Assembled(assembly) if !report.cancelled => {
                    let spec = &req.request.outputs[task.spec_index];
                    match self
                        .publish(req.job_id, task.spec_index, spec, *assembly, &output_dir)
                        .await
                    {
                        Ok(result) => {
                            metrics::OUTPUTS_RENDERED.with_label_values(&["success"]).inc();
                            report.results.push(result);
                        }
                        Err(record) => {
                            metrics::OUTPUTS_RENDERED.with_label_values(&["failed"]).inc();
                            report.records.push(record.with_attempt(req.attempt));
                            report.failed.push(task.spec_index);
                        }
                    }
                }
                TaskOutcome::Assembled(_) | TaskOutcome::Cancelled => {
                    metrics::OUTPUTS_RENDERED.with_label_values(&["cancelled"]).inc();
                    report.failed.push(task.spec_index);
                }
                TaskOutcome::Failed => {
                    metrics::OUTPUTS_RENDERED.with_label_values(&["failed"]).inc();
                    report.failed.push(task.spec_index);
                }
            }
        }

        for record in &mut report.records {
            if record.attempt == 0 {
                record.attempt = req.attempt;
            }
        }

        info!(
            "Job {} attempt {}: {} of {} outputs published{}",
            req.job_id,
            req.attempt,
            report.results.len(),
            req.indices.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }

    async fn render_one(
        &self,
        req: &FanoutRequest<'_>,
        spec_index: usize,
        spec: &OutputSpec,
        attempt_dir: &Path,
    ) -> TaskResult {
        let result = self.render_one_inner(req, spec_index, spec, attempt_dir).await;
        if let Some(tx) = req.progress {
            let _ = tx.send(ProgressEvent::OutputFinished {
                output_index: spec_index,
            });
        }
        result
    }

    async fn render_one_inner(
        &self,
        req: &FanoutRequest<'_>,
        spec_index: usize,
        spec: &OutputSpec,
        attempt_dir: &Path,
    ) -> TaskResult {
        let label = spec.effective_label(spec_index);
        let cancelled = || TaskResult {
            spec_index,
            outcome: TaskOutcome::Cancelled,
            records: Vec::new(),
        };

        if req.cancel.is_cancelled() {
            return cancelled();
        }
        let _permit = match self.slots.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("Output slot semaphore closed: {}", e);
                return TaskResult {
                    spec_index,
                    outcome: TaskOutcome::Failed,
                    records: vec![ErrorRecord::new(ErrorCode::Internal, e.to_string(), true)
                        .with_context("output_index", spec_index)],
                };
            }
        };
        if req.cancel.is_cancelled() {
            return cancelled();
        }

        let stage_dir = attempt_dir.join(format!("output-{}", spec_index));
        debug!(
            "Job {} rendering output {} ({}) in {}",
            req.job_id,
            spec_index,
            label,
            stage_dir.display()
        );

        let assembled = self
            .assembler
            .assemble(AssemblyInput {
                scenes: &req.request.content.scenes,
                spec,
                spec_index,
                label: &label,
                stage_dir: &stage_dir,
                cancel: req.cancel,
                progress: req.progress,
            })
            .await;

        match assembled {
            Ok(mut assembly) => {
                let mut records = std::mem::take(&mut assembly.records);
                if spec.interactive {
                    self.attach_interactive(req, spec_index, &mut assembly, &mut records);
                }
                TaskResult {
                    spec_index,
                    outcome: TaskOutcome::Assembled(Box::new(assembly)),
                    records,
                }
            }
            Err(AssemblyError::Cancelled) => cancelled(),
            Err(e) => {
                warn!("Job {} output {} ({}) failed: {}", req.job_id, spec_index, label, e);
                let code = match &e {
                    AssemblyError::SyncMismatch { .. } => ErrorCode::SyncMismatch,
                    AssemblyError::Encode(_)
                    | AssemblyError::NoEncoder
                    | AssemblyError::EmptyOutput { .. } => ErrorCode::EncodeFailed,
                    _ => ErrorCode::OutputFailed,
                };
                TaskResult {
                    spec_index,
                    outcome: TaskOutcome::Failed,
                    records: vec![ErrorRecord::new(code, e.to_string(), e.is_retryable())
                        .with_context("output_index", spec_index)
                        .with_context("label", &label)],
                }
            }
        }
    }

    /// Interactive metadata is additive: failures degrade to a plain output.
    fn attach_interactive(
        &self,
        req: &FanoutRequest<'_>,
        spec_index: usize,
        assembly: &mut Assembly,
        records: &mut Vec<ErrorRecord>,
    ) {
        let elements = &req.request.template.interactive;
        match interactive::generate(elements, &assembly.timeline.spans()) {
            Ok(package) => assembly.interactive_package = Some(package),
            Err(e) => {
                warn!(
                    "Job {} output {} interactive metadata dropped: {}",
                    req.job_id, spec_index, e
                );
                assembly
                    .warnings
                    .push(format!("interactive metadata unavailable: {}", e));
                records.push(
                    ErrorRecord::new(ErrorCode::InteractiveDegraded, e.to_string(), false)
                        .with_context("output_index", spec_index),
                );
            }
        }
    }

    async fn publish(
        &self,
        job_id: &str,
        spec_index: usize,
        spec: &OutputSpec,
        assembly: Assembly,
        output_dir: &Path,
    ) -> Result<OutputResult, ErrorRecord> {
        let label = spec.effective_label(spec_index);
        let destination = output_dir.join(format!("{}.{}", label, assembly.extension));

        publish_file(&assembly.encoded.path, &destination)
            .await
            .map_err(|e| {
                error!(
                    "Job {} failed to publish {}: {}",
                    job_id,
                    destination.display(),
                    e
                );
                ErrorRecord::new(ErrorCode::PublishFailed, e.to_string(), true)
                    .with_context("output_index", spec_index)
                    .with_context("path", destination.display())
            })?;

        metrics::ENCODER_USED
            .with_label_values(&[assembly.encoder.as_str()])
            .inc();

        let method_used = assembly
            .timeline
            .lowest_fidelity()
            .map(|e| e.segment.method.clone())
            .unwrap_or_default();

        let mut warnings = assembly.warnings;
        if assembly.encoder == ManifestEncoder::NAME {
            warnings.push(format!(
                "output {} is a JSON render manifest, not a playable {}",
                label,
                spec.format.extension()
            ));
        }

        Ok(OutputResult {
            id: Uuid::new_v4().to_string(),
            spec_index,
            label,
            format: spec.format,
            resolution: spec.resolution,
            file_size_bytes: assembly.encoded.size_bytes,
            duration_secs: assembly.encoded.duration_secs,
            method_used,
            encoder: assembly.encoder,
            scene_count: assembly.timeline.len(),
            path: destination,
            warnings,
            interactive_package: assembly.interactive_package,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::TimelineEncoder;
    use crate::composer::{CompositionChain, CompositionMethod, SceneComposer};
    use crate::interactive::{ChapterMarker, InteractiveElements};
    use crate::media::MediaProbe;
    use crate::render::{Resolution, VideoFormat};
    use crate::testing::{fixtures, MockCompositionMethod, MockEncoder, MockProbe};
    use crate::timing::{DurationCalculator, SyncValidator, TimingConfig};
    use std::time::Duration;

    fn renderer(encoder: Arc<dyn TimelineEncoder>, root: &Path) -> FanoutRenderer {
        let timing = TimingConfig::default();
        let validator =
            SyncValidator::new(timing.scene_tolerance_secs, timing.global_tolerance_secs);
        let chain = CompositionChain::new(vec![
            Arc::new(MockCompositionMethod::new("slide")) as Arc<dyn CompositionMethod>
        ])
        .unwrap();
        let composer = SceneComposer::new(
            Arc::new(chain),
            Arc::new(MockProbe::new(0.0)) as Arc<dyn MediaProbe>,
            DurationCalculator::new(&timing),
            validator.clone(),
            Duration::from_secs(5),
        );
        let assembler = MultiSceneAssembler::new(
            Arc::new(composer),
            vec![encoder],
            validator,
            Duration::from_secs(5),
        );
        FanoutRenderer::new(
            Arc::new(assembler),
            RenderConfig::default().with_dirs(root.join("work"), root.join("out")),
        )
    }

    #[tokio::test]
    async fn test_renders_all_outputs_in_order() {
        let temp = tempfile::tempdir().unwrap();
        let fanout = renderer(Arc::new(ManifestEncoder::new()), temp.path());
        let request = fixtures::job_request(2, 3);
        let cancel = CancellationToken::new();

        let report = fanout
            .render(FanoutRequest {
                job_id: "job-1",
                attempt: 1,
                request: &request,
                indices: &[0, 1, 2],
                cancel: &cancel,
                progress: None,
            })
            .await;

        assert!(!report.cancelled);
        assert!(report.failed.is_empty());
        let indices: Vec<_> = report.results.iter().map(|r| r.spec_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        for result in &report.results {
            assert!(result.path.starts_with(temp.path().join("out/job-1")));
            assert!(result.path.exists());
            assert_eq!(result.scene_count, 2);
        }
    }

    #[tokio::test]
    async fn test_failed_output_is_isolated() {
        let temp = tempfile::tempdir().unwrap();
        let encoder = Arc::new(MockEncoder::new("video"));
        encoder.fail_for_label("1-1280x720-standard");
        let fanout = renderer(encoder, temp.path());
        let mut request = fixtures::job_request(1, 2);
        request.outputs[0].label = None;
        request.outputs[1].label = None;
        let cancel = CancellationToken::new();

        let report = fanout
            .render(FanoutRequest {
                job_id: "job-2",
                attempt: 1,
                request: &request,
                indices: &[0, 1],
                cancel: &cancel,
                progress: None,
            })
            .await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].spec_index, 0);
        assert_eq!(report.failed, vec![1]);
        let record = report
            .records
            .iter()
            .find(|r| r.code == ErrorCode::EncodeFailed)
            .unwrap();
        assert_eq!(record.attempt, 1);
        assert_eq!(record.context.get("output_index").unwrap(), "1");
    }

    #[tokio::test]
    async fn test_manifest_fallback_is_flagged() {
        let temp = tempfile::tempdir().unwrap();
        let video = Arc::new(MockEncoder::new("video"));
        video.set_available(false);
        let timing = TimingConfig::default();
        let validator =
            SyncValidator::new(timing.scene_tolerance_secs, timing.global_tolerance_secs);
        let chain = CompositionChain::new(vec![
            Arc::new(MockCompositionMethod::new("slide")) as Arc<dyn CompositionMethod>
        ])
        .unwrap();
        let composer = SceneComposer::new(
            Arc::new(chain),
            Arc::new(MockProbe::new(0.0)) as Arc<dyn MediaProbe>,
            DurationCalculator::new(&timing),
            validator.clone(),
            Duration::from_secs(5),
        );
        let assembler = MultiSceneAssembler::new(
            Arc::new(composer),
            vec![
                video as Arc<dyn TimelineEncoder>,
                Arc::new(ManifestEncoder::new()),
            ],
            validator,
            Duration::from_secs(5),
        );
        let fanout = FanoutRenderer::new(
            Arc::new(assembler),
            RenderConfig::default().with_dirs(temp.path().join("work"), temp.path().join("out")),
        );
        let request = fixtures::job_request(1, 1);
        let cancel = CancellationToken::new();

        let report = fanout
            .render(FanoutRequest {
                job_id: "job-m",
                attempt: 1,
                request: &request,
                indices: &[0],
                cancel: &cancel,
                progress: None,
            })
            .await;

        let result = &report.results[0];
        assert_eq!(result.encoder, "manifest");
        assert_eq!(result.path.extension().unwrap(), "json");
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("is a JSON render manifest, not a playable mp4")));
    }

    #[tokio::test]
    async fn test_video_encoder_output_is_not_flagged() {
        let temp = tempfile::tempdir().unwrap();
        let fanout = renderer(Arc::new(MockEncoder::new("video")), temp.path());
        let request = fixtures::job_request(1, 1);
        let cancel = CancellationToken::new();

        let report = fanout
            .render(FanoutRequest {
                job_id: "job-v",
                attempt: 1,
                request: &request,
                indices: &[0],
                cancel: &cancel,
                progress: None,
            })
            .await;

        assert!(!report.results[0]
            .warnings
            .iter()
            .any(|w| w.contains("render manifest")));
    }

    #[tokio::test]
    async fn test_cancelled_publishes_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let fanout = renderer(Arc::new(ManifestEncoder::new()), temp.path());
        let request = fixtures::job_request(1, 2);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = fanout
            .render(FanoutRequest {
                job_id: "job-3",
                attempt: 1,
                request: &request,
                indices: &[0, 1],
                cancel: &cancel,
                progress: None,
            })
            .await;

        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert!(!temp.path().join("out/job-3").exists());
    }

    #[tokio::test]
    async fn test_interactive_degrades_on_bad_reference() {
        let temp = tempfile::tempdir().unwrap();
        let fanout = renderer(Arc::new(ManifestEncoder::new()), temp.path());
        let mut request = fixtures::job_request(1, 1);
        request.outputs[0].interactive = true;
        request.template.interactive = InteractiveElements {
            chapters: vec![ChapterMarker {
                title: "Nowhere".to_string(),
                scene_index: 9,
            }],
            ..Default::default()
        };
        let cancel = CancellationToken::new();

        let report = fanout
            .render(FanoutRequest {
                job_id: "job-4",
                attempt: 1,
                request: &request,
                indices: &[0],
                cancel: &cancel,
                progress: None,
            })
            .await;

        assert_eq!(report.results.len(), 1);
        assert!(report.results[0].interactive_package.is_none());
        assert!(report.results[0]
            .warnings
            .iter()
            .any(|w| w.contains("interactive")));
        assert!(report
            .records
            .iter()
            .any(|r| r.code == ErrorCode::InteractiveDegraded));
    }

    #[tokio::test]
    async fn test_interactive_package_attached() {
        let temp = tempfile::tempdir().unwrap();
        let fanout = renderer(Arc::new(ManifestEncoder::new()), temp.path());
        let mut request = fixtures::job_request(2, 1);
        request.outputs[0] = OutputSpec::new(VideoFormat::Mp4, Resolution::hd())
            .with_label("web")
            .with_interactive(true);
        request.template.interactive.chapters = vec![ChapterMarker {
            title: "Second".to_string(),
            scene_index: 1,
        }];
        let cancel = CancellationToken::new();

        let report = fanout
            .render(FanoutRequest {
                job_id: "job-5",
                attempt: 1,
                request: &request,
                indices: &[0],
                cancel: &cancel,
                progress: None,
            })
            .await;

        let package = report.results[0].interactive_package.as_ref().unwrap();
        assert_eq!(package.chapters.len(), 1);
        assert_eq!(package.chapters[0].start_secs, 60.0);
        assert!(package.captions_vtt.starts_with("WEBVTT"));
    }

    #[tokio::test]
    async fn test_cleanup_removes_work_dir() {
        let temp = tempfile::tempdir().unwrap();
        let fanout = renderer(Arc::new(ManifestEncoder::new()), temp.path());
        let request = fixtures::job_request(1, 1);
        let cancel = CancellationToken::new();
        fanout
            .render(FanoutRequest {
                job_id: "job-6",
                attempt: 1,
                request: &request,
                indices: &[0],
                cancel: &cancel,
                progress: None,
            })
            .await;

        assert!(fanout.job_work_dir("job-6").exists());
        fanout.cleanup("job-6").await;
        assert!(!fanout.job_work_dir("job-6").exists());
        fanout.cleanup("job-6").await;
    }
}
