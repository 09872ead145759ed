//! Interactive metadata: captions, chapters and hotspots.
//!
//! Template elements are authored relative to scenes. Once a timeline is
//! assembled, [`generate`] resolves them to absolute positions and renders a
//! WebVTT caption track. A failure here only costs the output its
//! interactive package, never the video itself.

mod error;
mod generator;
mod types;
pub mod vtt;

pub use error::InteractiveError;
pub use generator::generate;
pub use types::{
    Annotation, CaptionCue, Chapter, ChapterMarker, CueKind, Hotspot, HotspotAction, HotspotDef,
    InteractiveElements, InteractivePackage, Region, SceneSpan,
};
