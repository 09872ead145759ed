//! Mock composition method for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{watch, Notify};

use crate::composer::{
    ComposeRequest, ComposerError, CompositionMethod, Segment, SegmentKind, SlideDescriptor,
};
use crate::script::Scene;

/// Mock implementation of the CompositionMethod trait.
///
/// Provides controllable behavior for testing:
/// - Toggle availability
/// - Fail once or on every call
/// - Delay every call (to trigger timeouts)
/// - Pause after a number of calls until released (to cancel mid-job)
///
/// Successful calls write a slide descriptor, so encoders can consume the
/// segment like one from the static slide method.
///
/// # Example
///
/// ```rust,ignore
/// use reelforge_core::testing::MockCompositionMethod;
///
/// let high = Arc::new(MockCompositionMethod::new("high").with_external_tools());
/// high.set_available(false);
///
/// let low = Arc::new(MockCompositionMethod::new("low"));
/// low.set_next_error(ComposerError::failed("low", "transient"));
/// ```
#[derive(Debug)]
pub struct MockCompositionMethod {
    name: String,
    external_tools: bool,
    delay: Option<Duration>,
    available: AtomicBool,
    always_fail: AtomicBool,
    calls: AtomicUsize,
    /// If set, the next call will fail with this error.
    next_error: Mutex<Option<ComposerError>>,
    /// Calls beyond this count wait for `release`.
    pause_after: Mutex<Option<usize>>,
    paused: Notify,
    released: watch::Sender<bool>,
}

impl MockCompositionMethod {
    /// Create an available mock that needs no external tools.
    pub fn new(name: impl Into<String>) -> Self {
        let (released, _) = watch::channel(false);
        Self {
            name: name.into(),
            external_tools: false,
            delay: None,
            available: AtomicBool::new(true),
            always_fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            next_error: Mutex::new(None),
            pause_after: Mutex::new(None),
            paused: Notify::new(),
            released,
        }
    }

    /// Report that external tools are required.
    pub fn with_external_tools(mut self) -> Self {
        self.external_tools = true;
        self
    }

    /// Sleep this long in every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fail the next call only.
    pub fn set_next_error(&self, error: ComposerError) {
        if let Ok(mut next) = self.next_error.lock() {
            *next = Some(error);
        }
    }

    pub fn set_always_fail(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    /// Hold every call after the first `calls` until `release` is called.
    pub fn pause_after(&self, calls: usize) {
        if let Ok(mut pause) = self.pause_after.lock() {
            *pause = Some(calls);
        }
    }

    /// Wait until a call is held by `pause_after`.
    pub async fn wait_until_paused(&self) {
        self.paused.notified().await;
    }

    /// Let held and future calls proceed.
    pub fn release(&self) {
        self.released.send_replace(true);
    }

    /// Number of compose calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompositionMethod for MockCompositionMethod {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn requires_external_tools(&self) -> bool {
        self.external_tools
    }

    async fn compose(
        &self,
        _scene: &Scene,
        request: &ComposeRequest,
    ) -> Result<Segment, ComposerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        let pause = self.pause_after.lock().ok().and_then(|p| *p);
        if pause.is_some_and(|after| call > after) {
            let mut released = self.released.subscribe();
            self.paused.notify_one();
            let _ = released.wait_for(|r| *r).await;
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.next_error.lock().ok().and_then(|mut e| e.take()) {
            return Err(err);
        }
        if self.always_fail.load(Ordering::SeqCst) {
            return Err(ComposerError::failed(&self.name, "mock failure"));
        }

        tokio::fs::create_dir_all(&request.work_dir).await?;
        let descriptor = SlideDescriptor {
            title: request.title.clone(),
            background: "#202020".to_string(),
            width: request.resolution.width,
            height: request.resolution.height,
            duration_secs: request.target_duration_secs,
        };
        let path = request.segment_path(&self.name, "json");
        let json = serde_json::to_vec(&descriptor)
            .map_err(|e| ComposerError::failed(&self.name, e.to_string()))?;
        tokio::fs::write(&path, json).await?;

        Ok(Segment {
            path,
            kind: SegmentKind::Slide,
            duration_secs: request.target_duration_secs,
            method: self.name.clone(),
        })
    }
}
