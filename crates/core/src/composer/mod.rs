//! Scene composition with a ranked fallback chain.
//!
//! This module provides the `CompositionMethod` trait, the three built-in
//! methods and the chain that tries them in fidelity order.
//!
//! # Methods
//!
//! - `high_fidelity`: ffmpeg renders the scene's visual asset
//! - `frame_buffer`: ffmpeg draws the scene title on a solid background
//! - `static_slide`: pure Rust slide descriptor, always available
//!
//! # Example
//!
//! ```ignore
//! use reelforge_core::composer::{CompositionChain, StaticSlideMethod, FrameBufferMethod};
//!
//! let toolchain = Arc::new(FfmpegToolchain::detect("ffmpeg", "ffprobe").await);
//! let chain = CompositionChain::new(vec![
//!     Arc::new(FrameBufferMethod::new(toolchain, 30)),
//!     Arc::new(StaticSlideMethod::new()),
//! ])?;
//!
//! let run = chain.compose(&scene, &request).await;
//! for attempt in &run.attempts {
//!     println!("{} -> {:?}", attempt.method_name, attempt.outcome);
//! }
//! ```

mod chain;
mod config;
mod error;
mod ffmpeg;
mod scene;
mod slide;
mod traits;
mod types;

pub use chain::CompositionChain;
pub use config::ComposerConfig;
pub use error::ComposerError;
pub use ffmpeg::{FrameBufferMethod, HighFidelityMethod};
pub(crate) use ffmpeg::drawtext_filter;
pub use scene::{SceneComposer, SceneOutcome};
pub use slide::StaticSlideMethod;
pub use traits::CompositionMethod;
pub use types::{
    AttemptOutcome, ChainRun, ComposeRequest, Composed, CompositionAttempt, Segment, SegmentKind,
    SlideDescriptor,
};
