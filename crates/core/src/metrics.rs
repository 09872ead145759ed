//! Prometheus metrics for the render engine.
//!
//! This module provides metrics for:
//! - Job manager (submissions, terminal states, retries, durations)
//! - Fan-out renderer (per-output results, encoders)
//! - Composition chain (attempts per method and outcome)

use once_cell::sync::Lazy;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

// =============================================================================
// Job Manager
// =============================================================================

/// Jobs accepted by submit.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("reelforge_jobs_submitted_total", "Total jobs submitted").unwrap()
});

/// Jobs reaching a terminal state, by status.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelforge_jobs_finished_total",
            "Total job attempts reaching a terminal state",
        ),
        &["status"], // "completed", "partially_completed", "failed", "cancelled"
    )
    .unwrap()
});

/// Wall time of one job attempt.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelforge_job_duration_seconds",
            "Duration of one job attempt",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["status"],
    )
    .unwrap()
});

/// Retries scheduled, by trigger.
pub static RETRIES_SCHEDULED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelforge_retries_scheduled_total", "Total retries scheduled"),
        &["trigger"], // "auto", "manual"
    )
    .unwrap()
});

/// Jobs currently held by workers.
pub static ACTIVE_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("reelforge_active_jobs", "Jobs currently being processed").unwrap()
});

// =============================================================================
// Fan-out Renderer
// =============================================================================

/// Output renders, by result.
pub static OUTPUTS_RENDERED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelforge_outputs_rendered_total", "Total output renders"),
        &["result"], // "success", "failed", "cancelled"
    )
    .unwrap()
});

/// Encoder used per output.
pub static ENCODER_USED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelforge_encoder_used_total", "Timeline encodes by encoder"),
        &["encoder"],
    )
    .unwrap()
});

// =============================================================================
// Composition Chain
// =============================================================================

/// Composition attempts, by method and outcome.
pub static COMPOSITION_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelforge_composition_attempts_total",
            "Total composition method attempts",
        ),
        &["method", "outcome"], // outcome: "success", "unavailable", "asset_missing", "failed", "timeout"
    )
    .unwrap()
});

/// Composition call duration.
pub static COMPOSITION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelforge_composition_duration_seconds",
            "Duration of composition method calls",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0]),
        &["method"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all engine metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(RETRIES_SCHEDULED.clone()),
        Box::new(ACTIVE_JOBS.clone()),
        Box::new(OUTPUTS_RENDERED.clone()),
        Box::new(ENCODER_USED.clone()),
        Box::new(COMPOSITION_ATTEMPTS.clone()),
        Box::new(COMPOSITION_DURATION.clone()),
    ]
}

/// Registers every engine metric in `registry`.
pub fn register_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        let registry = Registry::new();
        register_metrics(&registry).unwrap();

        JOBS_SUBMITTED.inc();
        COMPOSITION_ATTEMPTS
            .with_label_values(&["static_slide", "success"])
            .inc();

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"reelforge_jobs_submitted_total".to_string()));
        assert!(names.contains(&"reelforge_composition_attempts_total".to_string()));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        register_metrics(&registry).unwrap();
        assert!(register_metrics(&registry).is_err());
    }
}
