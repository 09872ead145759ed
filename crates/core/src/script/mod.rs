//! Script input types: templates, content sets and scenes.

mod types;

pub use types::{ContentSet, Scene, Template};
