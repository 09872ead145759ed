//! Job manager implementation.
//!
//! Drives render jobs through their lifecycle:
//! - Workers: `workers` long-running tasks claiming queued jobs by priority
//! - Retry scheduler: re-queues failed jobs whose backoff elapsed
//! - API: submit, get_status, list, cancel, retry

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::assembler::ProgressEvent;
use crate::job::{
    compute_priority, estimate_completion, expected_video_secs, retry_priority, ErrorCode,
    ErrorRecord, JobFilter, JobRequest, JobStatus, JobStatusView, JobStore, JobStoreError,
    RenderJob,
};
use crate::metrics;
use crate::render::{FanoutReport, FanoutRenderer, FanoutRequest};
use crate::timing::DurationCalculator;

use super::config::ManagerConfig;
use super::types::{ManagerError, ManagerStatus};

/// Progress ceiling until a job reaches a terminal state.
const MAX_RUNNING_PROGRESS: u8 = 99;

/// State shared between the API and the background tasks.
struct Shared {
    config: ManagerConfig,
    store: Arc<dyn JobStore>,
    fanout: Arc<FanoutRenderer>,
    calculator: DurationCalculator,
    /// Cancellation tokens of jobs processed by this instance.
    active: RwLock<HashMap<String, CancellationToken>>,
    running: AtomicBool,
    wake: Notify,
}

/// The job manager: owns the queue, the worker pool and the retry policy.
pub struct JobManager {
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobManager {
    /// Create a new manager. Nothing runs until `start`.
    pub fn new(
        config: ManagerConfig,
        store: Arc<dyn JobStore>,
        fanout: Arc<FanoutRenderer>,
        calculator: DurationCalculator,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shared: Arc::new(Shared {
                config,
                store,
                fanout,
                calculator,
                active: RwLock::new(HashMap::new()),
                running: AtomicBool::new(false),
                wake: Notify::new(),
            }),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.shared.store
    }

    // ========================================================================
    // API
    // ========================================================================

    /// Validate and enqueue a request. Returns the new job's ID.
    pub async fn submit(&self, request: JobRequest) -> Result<String, ManagerError> {
        request.validate()?;

        let priority = compute_priority(self.shared.config.base_priority, &request.outputs);
        let video_secs = expected_video_secs(&request.content, &self.shared.calculator);
        let output_count = request.outputs.len();

        let mut job = RenderJob::new(request, priority);
        job.estimated_completion = Some(estimate_completion(
            job.created_at,
            video_secs,
            output_count,
            self.shared.fanout.config().render_speed_factor,
            1.0,
        ));

        self.shared.store.create(&job)?;
        metrics::JOBS_SUBMITTED.inc();
        info!(
            "Submitted job {} ({} outputs, priority {})",
            job.id, output_count, priority
        );

        self.shared.wake.notify_one();
        Ok(job.id)
    }

    /// Current status, progress, outputs and error history of a job.
    pub async fn get_status(&self, id: &str) -> Result<JobStatusView, ManagerError> {
        self.shared
            .store
            .get(id)?
            .map(JobStatusView::from)
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))
    }

    /// Jobs matching `filter`, most recent first.
    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<JobStatusView>, ManagerError> {
        Ok(self
            .shared
            .store
            .list(filter)?
            .into_iter()
            .map(JobStatusView::from)
            .collect())
    }

    /// Cancel a job.
    ///
    /// Queued jobs (and failed jobs waiting for an automatic retry) become
    /// `cancelled` immediately. Processing jobs are flagged and stop at the
    /// next scene boundary; the worker then records the cancellation.
    pub async fn cancel(&self, id: &str) -> Result<(), ManagerError> {
        let shared = &self.shared;
        let job = shared
            .store
            .get(id)?
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;

        let retry_pending = job.status.can_retry() && job.retry_after.is_some();
        if job.status == JobStatus::Queued || retry_pending {
            let expected = job.status;
            let mut cancelled = job.clone();
            cancelled.status = JobStatus::Cancelled;
            cancelled.retry_after = None;
            cancelled.finished_at = Some(Utc::now());

            match shared.store.update(&cancelled, expected) {
                Ok(_) => {
                    shared.append_record(
                        id,
                        ErrorRecord::new(ErrorCode::Cancelled, "cancelled by request", false)
                            .with_attempt(job.attempts),
                    );
                    metrics::JOBS_FINISHED
                        .with_label_values(&[JobStatus::Cancelled.as_str()])
                        .inc();
                    info!("Cancelled {} job {}", expected, id);
                    return Ok(());
                }
                // Claimed by a worker meanwhile: cancel the running job instead.
                Err(JobStoreError::StatusConflict {
                    actual: JobStatus::Processing,
                    ..
                }) => {}
                Err(e) => return Err(e.into()),
            }
        } else if job.status != JobStatus::Processing {
            return Err(ManagerError::InvalidState {
                id: id.to_string(),
                status: job.status,
                operation: "cancel",
            });
        }

        let mut job = shared
            .store
            .get(id)?
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;
        if job.status != JobStatus::Processing {
            return Err(ManagerError::InvalidState {
                id: id.to_string(),
                status: job.status,
                operation: "cancel",
            });
        }
        job.cancel_requested = true;
        shared.store.update(&job, JobStatus::Processing)?;

        // Flag first, then token: a worker registering its token afterwards
        // still sees the flag.
        if let Some(token) = shared.active.read().await.get(id) {
            token.cancel();
        }
        info!("Cancellation requested for processing job {}", id);
        Ok(())
    }

    /// Re-queue a failed or partially completed job with boosted priority.
    ///
    /// Error history is kept. Only outputs without a result are rendered again.
    pub async fn retry(&self, id: &str) -> Result<(), ManagerError> {
        let job = self
            .shared
            .store
            .get(id)?
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;

        if !job.status.can_retry() {
            return Err(ManagerError::InvalidState {
                id: id.to_string(),
                status: job.status,
                operation: "retry",
            });
        }
        let max_attempts = self.shared.config.retry.max_attempts;
        if job.attempts >= max_attempts {
            return Err(ManagerError::RetryLimitExceeded {
                id: id.to_string(),
                attempts: job.attempts,
                max_attempts,
            });
        }

        self.shared.requeue(job)?;
        metrics::RETRIES_SCHEDULED.with_label_values(&["manual"]).inc();
        self.shared.wake.notify_one();
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the workers and the retry scheduler.
    pub async fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            warn!("Job manager already running");
            return;
        }

        info!(
            "Starting job manager with {} workers",
            self.shared.config.workers
        );

        self.shared.recover_processing_jobs();

        let mut handles = self.handles.lock().await;
        for worker in 0..self.shared.config.workers {
            handles.push(self.spawn_worker(worker));
        }
        handles.push(self.spawn_retry_scheduler());

        info!("Job manager started");
    }

    /// Stop gracefully: workers finish their current job, then exit.
    pub async fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            warn!("Job manager not running");
            return;
        }

        info!("Stopping job manager");
        let _ = self.shutdown_tx.send(());

        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Job manager task ended abnormally: {}", e);
            }
        }

        info!("Job manager stopped");
    }

    /// Get current manager status.
    pub async fn status(&self) -> ManagerStatus {
        let store = &self.shared.store;
        let count = |status| {
            store
                .count(&JobFilter::new().with_status(status))
                .unwrap_or(0) as usize
        };

        ManagerStatus {
            running: self.shared.running.load(Ordering::Relaxed),
            workers: self.shared.config.workers,
            active_jobs: self.shared.active.read().await.len(),
            queued_count: count(JobStatus::Queued),
            processing_count: count(JobStatus::Processing),
        }
    }

    /// Claim and process one queued job in the caller's task.
    ///
    /// Returns the processed job's ID, or `None` when the queue is empty.
    pub async fn run_once(&self) -> Result<Option<String>, ManagerError> {
        match self.shared.store.claim_next(Utc::now())? {
            Some(job) => {
                let id = job.id.clone();
                self.shared.process_job(job).await;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Re-queue failed jobs whose retry time has passed.
    ///
    /// Returns the number of jobs re-queued.
    pub async fn promote_due_retries(&self) -> Result<usize, ManagerError> {
        self.shared.promote_due_retries(Utc::now())
    }

    fn spawn_worker(&self, worker: usize) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            debug!("Worker {} started", worker);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Worker {} received shutdown signal", worker);
                        break;
                    }
                    _ = shared.wake.notified() => {}
                    _ = tokio::time::sleep(shared.config.poll_interval()) => {}
                }
                if !shared.running.load(Ordering::Relaxed) {
                    break;
                }

                // Drain the queue before sleeping again.
                while shared.running.load(Ordering::Relaxed) {
                    match shared.store.claim_next(Utc::now()) {
                        Ok(Some(job)) => shared.process_job(job).await,
                        Ok(None) => break,
                        Err(e) => {
                            error!("Worker {} failed to claim a job: {}", worker, e);
                            break;
                        }
                    }
                }
            }
            debug!("Worker {} stopped", worker);
        })
    }

    fn spawn_retry_scheduler(&self) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            debug!("Retry scheduler started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(shared.config.poll_interval()) => {
                        if let Err(e) = shared.promote_due_retries(Utc::now()) {
                            warn!("Retry scheduling error: {}", e);
                        }
                    }
                }
            }
            debug!("Retry scheduler stopped");
        })
    }
}

impl Shared {
    /// Re-queue jobs left processing by a previous process.
    fn recover_processing_jobs(&self) {
        let filter = JobFilter::new()
            .with_status(JobStatus::Processing)
            .with_limit(1000);

        match self.store.list(&filter) {
            Ok(jobs) => {
                let mut recovered = 0;
                for mut job in jobs {
                    if job.cancel_requested {
                        job.status = JobStatus::Cancelled;
                        job.finished_at = Some(Utc::now());
                    } else {
                        job.status = JobStatus::Queued;
                    }
                    match self.store.update(&job, JobStatus::Processing) {
                        Ok(_) => {
                            if job.status == JobStatus::Cancelled {
                                self.append_record(
                                    &job.id,
                                    ErrorRecord::new(
                                        ErrorCode::Cancelled,
                                        "cancelled before restart",
                                        false,
                                    )
                                    .with_attempt(job.attempts),
                                );
                            }
                            recovered += 1;
                            info!("Recovered job {} as {}", job.id, job.status);
                        }
                        Err(e) => error!("Failed to recover job {}: {}", job.id, e),
                    }
                }
                if recovered > 0 {
                    info!("Recovered {} interrupted jobs", recovered);
                }
            }
            Err(e) => {
                error!("Failed to recover processing jobs: {}", e);
            }
        }
    }

    fn promote_due_retries(&self, now: DateTime<Utc>) -> Result<usize, ManagerError> {
        let due = self.store.due_retries(now)?;
        let mut promoted = 0;
        for job in due {
            let id = job.id.clone();
            match self.requeue(job) {
                Ok(()) => {
                    promoted += 1;
                    metrics::RETRIES_SCHEDULED.with_label_values(&["auto"]).inc();
                }
                Err(e) => warn!("Failed to re-queue job {}: {}", id, e),
            }
        }
        if promoted > 0 {
            self.wake.notify_one();
        }
        Ok(promoted)
    }

    /// Failed/partial -> queued with boosted priority. Keeps outputs and errors.
    fn requeue(&self, mut job: RenderJob) -> Result<(), ManagerError> {
        let expected = job.status;
        job.status = JobStatus::Queued;
        job.priority = retry_priority(job.priority, self.config.retry.priority_boost);
        job.progress = 0;
        job.retry_after = None;
        job.cancel_requested = false;
        job.finished_at = None;
        self.store.update(&job, expected)?;

        info!(
            "Re-queued job {} after {} attempts (priority {})",
            job.id, job.attempts, job.priority
        );
        Ok(())
    }

    /// Runs one claimed job to a terminal state. Never returns an error:
    /// every failure ends up as an error record.
    async fn process_job(&self, job: RenderJob) {
        let started = Instant::now();
        let token = CancellationToken::new();
        self.active
            .write()
            .await
            .insert(job.id.clone(), token.clone());
        metrics::ACTIVE_JOBS.inc();

        // A cancel that raced the claim only set the stored flag.
        if let Ok(Some(current)) = self.store.get(&job.id) {
            if current.cancel_requested {
                token.cancel();
            }
        }

        info!(
            "Processing job {} (attempt {}, priority {})",
            job.id, job.attempts, job.priority
        );

        let report = self.render(&job, &token).await;
        let status = self.finish(&job, report);

        self.active.write().await.remove(&job.id);
        metrics::ACTIVE_JOBS.dec();
        metrics::JOBS_FINISHED
            .with_label_values(&[status.as_str()])
            .inc();
        metrics::JOB_DURATION
            .with_label_values(&[status.as_str()])
            .observe(started.elapsed().as_secs_f64());

        self.fanout.cleanup(&job.id).await;
    }

    /// Runs the fan-out while turning progress events into stored progress.
    async fn render(&self, job: &RenderJob, token: &CancellationToken) -> FanoutReport {
        let indices = job.missing_outputs();
        let scene_count = job.request.content.scenes.len();
        let total_outputs = job.requested_outputs();

        let units_per_output = scene_count + 1;
        let total_units = (total_outputs * units_per_output).max(1);
        let mut done_units = (total_outputs - indices.len()) * units_per_output;

        let video_secs = expected_video_secs(&job.request.content, &self.calculator);
        let speed = self.fanout.config().render_speed_factor;
        let eta = |done: usize| {
            let remaining = 1.0 - done as f64 / total_units as f64;
            estimate_completion(Utc::now(), video_secs, total_outputs, speed, remaining)
        };

        if let Err(e) = self.store.update_progress(&job.id, 0, Some(eta(done_units))) {
            warn!("Failed to update estimate for job {}: {}", job.id, e);
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();

        let fanout = &self.fanout;
        // Owns the sender so the tracker stops once rendering is done.
        let run = async move {
            let tx = tx;
            fanout
                .render(FanoutRequest {
                    job_id: &job.id,
                    attempt: job.attempts,
                    request: &job.request,
                    indices: &indices,
                    cancel: token,
                    progress: Some(&tx),
                })
                .await
        };

        let track = async {
            while let Some(event) = rx.recv().await {
                done_units = (done_units + 1).min(total_units);
                let progress =
                    ((100 * done_units / total_units) as u8).min(MAX_RUNNING_PROGRESS);
                debug!("Job {} progress {}% after {:?}", job.id, progress, event);
                if let Err(e) = self
                    .store
                    .update_progress(&job.id, progress, Some(eta(done_units)))
                {
                    warn!("Failed to update progress for job {}: {}", job.id, e);
                }
            }
        };

        let (report, ()) = tokio::join!(run, track);
        report
    }

    /// Records the attempt's outcome and moves the job to a terminal state.
    fn finish(&self, job: &RenderJob, report: FanoutReport) -> JobStatus {
        for record in &report.records {
            self.append_record(&job.id, record.clone());
        }

        let mut current = match self.store.get(&job.id) {
            Ok(Some(current)) => current,
            Ok(None) => {
                error!("Job {} disappeared while processing", job.id);
                return JobStatus::Failed;
            }
            Err(e) => {
                error!("Failed to reload job {}: {}", job.id, e);
                return JobStatus::Failed;
            }
        };

        let now = Utc::now();
        let requested = current.requested_outputs();

        let status = if report.cancelled {
            self.append_record(
                &job.id,
                ErrorRecord::new(ErrorCode::Cancelled, "cancelled by request", false)
                    .with_attempt(job.attempts),
            );
            JobStatus::Cancelled
        } else {
            current.outputs.extend(report.results.iter().cloned());
            current.outputs.sort_by_key(|o| o.spec_index);

            if current.outputs.len() == requested {
                JobStatus::Completed
            } else if current.outputs.is_empty() {
                self.append_record(
                    &job.id,
                    ErrorRecord::new(
                        ErrorCode::AllOutputsFailed,
                        format!("none of {} outputs could be rendered", requested),
                        report.has_retryable_failure(),
                    )
                    .with_attempt(job.attempts),
                );
                JobStatus::Failed
            } else {
                JobStatus::PartiallyCompleted
            }
        };

        current.status = status;
        current.finished_at = Some(now);
        current.estimated_completion = None;
        if matches!(status, JobStatus::Completed | JobStatus::PartiallyCompleted) {
            current.progress = 100;
        }
        if status.can_retry() {
            current.retry_after = self.schedule_retry(&current, &report, now);
        }

        match self.store.update(&current, JobStatus::Processing) {
            Ok(_) => info!(
                "Job {} {} with {}/{} outputs (attempt {})",
                job.id,
                status,
                current.outputs.len(),
                requested,
                job.attempts
            ),
            Err(e) => error!("Failed to finish job {}: {}", job.id, e),
        }
        status
    }

    /// When the next automatic retry is due, if any. Appends
    /// `RetryCapExceeded` once the attempt budget is spent.
    fn schedule_retry(
        &self,
        job: &RenderJob,
        report: &FanoutReport,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let policy = &self.config.retry;
        if !report.has_retryable_failure() {
            return None;
        }

        if job.attempts >= policy.max_attempts {
            warn!(
                "Job {} exhausted {} attempts",
                job.id, policy.max_attempts
            );
            self.append_record(
                &job.id,
                ErrorRecord::new(
                    ErrorCode::RetryCapExceeded,
                    format!("gave up after {} attempts", job.attempts),
                    false,
                )
                .with_attempt(job.attempts),
            );
            return None;
        }
        if !policy.auto_retry {
            return None;
        }

        let delay = policy.delay_for(job.attempts);
        debug!("Job {} retry scheduled in {:?}", job.id, delay);
        chrono::Duration::from_std(delay).ok().map(|d| now + d)
    }

    fn append_record(&self, id: &str, record: ErrorRecord) {
        if let Err(e) = self.store.append_error(id, &record) {
            error!("Failed to append {} record to job {}: {}", record.code.as_str(), id, e);
        }
    }
}
