//! Multi-scene assembly: ordered timelines, encoders and atomic publishing.
//!
//! Every output gets its own timeline holding exactly one entry per scene
//! in script order. Scenes that cannot be composed are replaced by a
//! placeholder from the lowest-ranked composition method.

mod encoder;
mod error;
mod multi_scene;
mod publish;
mod timeline;

pub use encoder::{
    EncodedOutput, FfmpegConcatEncoder, ManifestEncoder, ManifestScene, RenderManifest,
    TimelineEncoder,
};
pub use error::{AssemblyError, EncoderError};
pub use multi_scene::{Assembly, AssemblyInput, MultiSceneAssembler, ProgressEvent};
pub use publish::publish_file;
pub use timeline::{Timeline, TimelineEntry};
