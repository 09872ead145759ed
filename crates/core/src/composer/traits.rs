//! Trait definitions for the composer module.

use async_trait::async_trait;

use super::error::ComposerError;
use super::types::{ComposeRequest, Segment};
use crate::script::Scene;

/// One strategy for turning a scene into a visual segment.
#[async_trait]
pub trait CompositionMethod: Send + Sync {
    /// Returns the name of this method.
    fn name(&self) -> &str;

    /// Cheap, side-effect free readiness check.
    fn is_available(&self) -> bool;

    /// Whether this method depends on anything outside the process.
    ///
    /// The last method of a chain must return `false`.
    fn requires_external_tools(&self) -> bool {
        true
    }

    /// Produces the segment for `scene`. Must finish within `request.timeout`;
    /// the chain enforces it regardless.
    async fn compose(
        &self,
        scene: &Scene,
        request: &ComposeRequest,
    ) -> Result<Segment, ComposerError>;
}
