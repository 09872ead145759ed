//! Ranked fallback over composition methods.

use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::error::ComposerError;
use super::traits::CompositionMethod;
use super::types::{AttemptOutcome, ChainRun, ComposeRequest, Composed, CompositionAttempt};
use crate::metrics;
use crate::script::Scene;

/// Composition methods in fidelity order, best first.
///
/// The last method never depends on external tools, so a scene with
/// narration always gets a segment unless that method itself breaks.
pub struct CompositionChain {
    methods: Vec<Arc<dyn CompositionMethod>>,
}

impl CompositionChain {
    pub fn new(methods: Vec<Arc<dyn CompositionMethod>>) -> Result<Self, ComposerError> {
        let Some(last) = methods.last() else {
            return Err(ComposerError::invalid_chain("chain has no methods"));
        };
        if last.requires_external_tools() {
            return Err(ComposerError::invalid_chain(format!(
                "last method {} requires external tools",
                last.name()
            )));
        }
        Ok(Self { methods })
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Method names in rank order.
    pub fn method_names(&self) -> Vec<String> {
        self.methods.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn method_name(&self, rank: usize) -> Option<&str> {
        self.methods.get(rank).map(|m| m.name())
    }

    /// Tries each method in order until one produces a segment.
    pub async fn compose(&self, scene: &Scene, request: &ComposeRequest) -> ChainRun {
        let mut attempts = Vec::with_capacity(self.methods.len());
        let mut last_error = String::from("no method available");

        for (rank, method) in self.methods.iter().enumerate() {
            let name = method.name();

            if !method.is_available() {
                debug!(
                    "Scene {} skipping unavailable method {}",
                    request.scene_index, name
                );
                record(&mut attempts, name, AttemptOutcome::Unavailable, 0, None);
                continue;
            }

            let start = Instant::now();
            let result = timeout(request.timeout, method.compose(scene, request)).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            metrics::COMPOSITION_DURATION
                .with_label_values(&[name])
                .observe(start.elapsed().as_secs_f64());

            let error = match result {
                Ok(Ok(segment)) => {
                    debug!(
                        "Scene {} composed by {} in {} ms",
                        request.scene_index, name, elapsed_ms
                    );
                    record(&mut attempts, name, AttemptOutcome::Success, elapsed_ms, None);
                    return ChainRun {
                        attempts,
                        result: Ok(Composed { segment, rank }),
                    };
                }
                Ok(Err(e)) => e,
                Err(_) => ComposerError::Timeout {
                    method: name.to_string(),
                    timeout_ms: request.timeout.as_millis() as u64,
                },
            };

            let outcome = match &error {
                // Declined at call time, e.g. the scene lacks the input it needs.
                ComposerError::Unavailable { .. } => {
                    debug!(
                        "Scene {} method {} not applicable: {}",
                        request.scene_index, name, error
                    );
                    record(&mut attempts, name, AttemptOutcome::Unavailable, elapsed_ms, None);
                    continue;
                }
                ComposerError::AssetMissing { .. } => AttemptOutcome::AssetMissing,
                e if e.is_timeout() => AttemptOutcome::Timeout,
                _ => AttemptOutcome::Failed,
            };
            warn!(
                "Scene {} method {} {}: {}, trying next",
                request.scene_index,
                name,
                outcome.as_str(),
                error
            );
            last_error = error.to_string();
            record(&mut attempts, name, outcome, elapsed_ms, Some(last_error.clone()));
        }

        ChainRun {
            result: Err(ComposerError::AllMethodsExhausted {
                attempts: attempts.len(),
                last_error,
            }),
            attempts,
        }
    }

    /// Composes with only the lowest-ranked method.
    ///
    /// Used for placeholder segments when a scene cannot otherwise be built.
    pub async fn compose_placeholder(
        &self,
        scene: &Scene,
        request: &ComposeRequest,
    ) -> Result<Composed, ComposerError> {
        let rank = self.methods.len() - 1;
        let method = &self.methods[rank];

        match timeout(request.timeout, method.compose(scene, request)).await {
            Ok(Ok(segment)) => Ok(Composed { segment, rank }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ComposerError::Timeout {
                method: method.name().to_string(),
                timeout_ms: request.timeout.as_millis() as u64,
            }),
        }
    }
}

fn record(
    attempts: &mut Vec<CompositionAttempt>,
    method: &str,
    outcome: AttemptOutcome,
    duration_ms: u64,
    error: Option<String>,
) {
    metrics::COMPOSITION_ATTEMPTS
        .with_label_values(&[method, outcome.as_str()])
        .inc();
    attempts.push(CompositionAttempt {
        method_name: method.to_string(),
        outcome,
        duration_ms,
        error,
    });
}
