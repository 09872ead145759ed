//! External media tooling: ffmpeg detection/invocation and duration probing.

mod error;
mod probe;
mod toolchain;

pub use error::{ProbeError, ToolError};
pub use probe::{FfprobeProbe, MediaProbe};
pub use toolchain::FfmpegToolchain;
