//! Testing utilities and mock implementations.
//!
//! This module provides mocks for the engine's seams (composition methods,
//! media probing and timeline encoding), allowing the whole pipeline to run
//! in tests without ffmpeg.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelforge_core::testing::{fixtures, MockCompositionMethod, MockEncoder, MockProbe};
//!
//! let high = Arc::new(MockCompositionMethod::new("high").with_external_tools());
//! high.set_available(false);
//!
//! let probe = MockProbe::new(0.0);
//! probe.set_duration("/audio/intro.wav", 42.0);
//!
//! let request = fixtures::job_request(3, 2);
//! ```

mod mock_composer;
mod mock_encoder;
mod mock_probe;

pub use mock_composer::MockCompositionMethod;
pub use mock_encoder::MockEncoder;
pub use mock_probe::MockProbe;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;
    use std::time::Duration;

    use crate::composer::ComposeRequest;
    use crate::job::JobRequest;
    use crate::render::{OutputSpec, Resolution, VideoFormat};
    use crate::script::{ContentSet, Scene, Template};

    /// Narration of exactly `words` words, ending with a period.
    pub fn narration(words: usize) -> String {
        let mut text = (0..words)
            .map(|i| if i == 0 { "Narration" } else { "word" })
            .collect::<Vec<_>>()
            .join(" ");
        text.push('.');
        text
    }

    /// Scene `scene-<index>` with `words` words of narration and no assets.
    pub fn scene(index: usize, words: usize) -> Scene {
        Scene::new(format!("scene-{}", index), narration(words))
    }

    /// Compose request for a 60 second 720p scene.
    pub fn compose_request(work_dir: &Path, scene_index: usize) -> ComposeRequest {
        ComposeRequest {
            scene_index,
            title: format!("Scene {}", scene_index),
            target_duration_secs: 60.0,
            resolution: Resolution::hd(),
            work_dir: work_dir.to_path_buf(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Output spec labelled `out-<index>`: 720p mp4, standard quality.
    pub fn output_spec(index: usize) -> OutputSpec {
        OutputSpec::new(VideoFormat::Mp4, Resolution::hd()).with_label(format!("out-{}", index))
    }

    /// Request with `scene_count` ten-word scenes and `output_count` outputs.
    pub fn job_request(scene_count: usize, output_count: usize) -> JobRequest {
        JobRequest::new(
            Template::new("tpl-test", "Test template"),
            ContentSet::new(
                "Test video",
                (0..scene_count).map(|i| scene(i, 10)).collect(),
            ),
            (0..output_count).map(output_spec).collect(),
        )
    }
}
