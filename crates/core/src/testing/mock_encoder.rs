//! Mock timeline encoder for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use crate::assembler::{EncodedOutput, EncoderError, Timeline, TimelineEncoder};
use crate::render::OutputSpec;

/// Mock implementation of the TimelineEncoder trait.
///
/// Writes the timeline as JSON and reports the timeline's total length,
/// optionally skewed, empty, or failing for selected labels.
#[derive(Debug)]
pub struct MockEncoder {
    name: String,
    available: AtomicBool,
    always_fail: AtomicBool,
    empty_output: AtomicBool,
    calls: AtomicUsize,
    duration_offset: RwLock<f64>,
    /// Output file stems that fail to encode.
    failing_labels: RwLock<HashSet<String>>,
    next_error: Mutex<Option<EncoderError>>,
}

impl MockEncoder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: AtomicBool::new(true),
            always_fail: AtomicBool::new(false),
            empty_output: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            duration_offset: RwLock::new(0.0),
            failing_labels: RwLock::new(HashSet::new()),
            next_error: Mutex::new(None),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fail every call with a retryable I/O error.
    pub fn set_always_fail(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    /// Write a zero-byte file.
    pub fn set_empty_output(&self, empty: bool) {
        self.empty_output.store(empty, Ordering::SeqCst);
    }

    /// Report durations off by `secs`.
    pub fn set_duration_offset(&self, secs: f64) {
        if let Ok(mut offset) = self.duration_offset.write() {
            *offset = secs;
        }
    }

    /// Fail outputs whose file stem is `label`.
    pub fn fail_for_label(&self, label: impl Into<String>) {
        if let Ok(mut labels) = self.failing_labels.write() {
            labels.insert(label.into());
        }
    }

    pub fn clear_failing_labels(&self) {
        if let Ok(mut labels) = self.failing_labels.write() {
            labels.clear();
        }
    }

    /// Fail the next call only.
    pub fn set_next_error(&self, error: EncoderError) {
        if let Ok(mut next) = self.next_error.lock() {
            *next = Some(error);
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimelineEncoder for MockEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn extension(&self, spec: &OutputSpec) -> String {
        spec.format.extension().to_string()
    }

    async fn encode(
        &self,
        timeline: &Timeline,
        _spec: &OutputSpec,
        output: &Path,
        _timeout: Duration,
    ) -> Result<EncodedOutput, EncoderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.next_error.lock().ok().and_then(|mut e| e.take()) {
            return Err(err);
        }

        let label = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let label_fails = self
            .failing_labels
            .read()
            .map(|l| l.contains(&label))
            .unwrap_or(false);
        if label_fails || self.always_fail.load(Ordering::SeqCst) {
            return Err(EncoderError::Io(std::io::Error::other("mock encoder failure")));
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = if self.empty_output.load(Ordering::SeqCst) {
            Vec::new()
        } else {
            serde_json::to_vec(timeline).map_err(|e| EncoderError::Serialization(e.to_string()))?
        };
        tokio::fs::write(output, &bytes).await?;

        let offset = self.duration_offset.read().map(|o| *o).unwrap_or(0.0);
        Ok(EncodedOutput {
            path: output.to_path_buf(),
            size_bytes: bytes.len() as u64,
            duration_secs: timeline.total_secs() + offset,
        })
    }
}
