//! Scene timing: duration calculation and sync validation.

mod config;
mod duration;
mod sync;

pub use config::TimingConfig;
pub use duration::{count_words, DurationCalculator};
pub use sync::{validate, SyncReport, SyncValidator};
