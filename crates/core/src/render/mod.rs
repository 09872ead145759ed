//! Output specs and the format fan-out renderer.
//!
//! A job with K output specs renders K isolated tasks. One failing output
//! never fails its siblings; outputs are published only after every task
//! has joined and the job was not cancelled.

mod config;
mod fanout;
mod types;

pub use config::RenderConfig;
pub use fanout::{FanoutReport, FanoutRenderer, FanoutRequest};
pub use types::{
    Compression, OutputResult, OutputSpec, QualityPreset, Resolution, VideoFormat,
};
