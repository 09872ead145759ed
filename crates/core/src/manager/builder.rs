//! Wires a complete engine from configuration.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::assembler::{FfmpegConcatEncoder, ManifestEncoder, MultiSceneAssembler, TimelineEncoder};
use crate::composer::{
    ComposerError, CompositionChain, CompositionMethod, FrameBufferMethod, HighFidelityMethod,
    SceneComposer, StaticSlideMethod,
};
use crate::config::{validate_config, Config, ConfigError};
use crate::job::{JobStore, JobStoreError, SqliteJobStore};
use crate::media::{FfmpegToolchain, FfprobeProbe, MediaProbe};
use crate::render::FanoutRenderer;
use crate::timing::{DurationCalculator, SyncValidator};

use super::runner::JobManager;

/// Errors while building the engine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid composition chain: {0}")]
    Chain(#[from] ComposerError),

    #[error("failed to open job store: {0}")]
    Store(#[from] JobStoreError),
}

/// Build a job manager, detecting ffmpeg and opening the configured store.
pub async fn build_job_manager(config: &Config) -> Result<JobManager, BuildError> {
    validate_config(config)?;

    let toolchain = Arc::new(
        FfmpegToolchain::detect(&config.composer.ffmpeg_path, &config.composer.ffprobe_path)
            .await,
    );
    let store: Arc<dyn JobStore> = if config.database.is_in_memory() {
        Arc::new(SqliteJobStore::in_memory()?)
    } else {
        Arc::new(SqliteJobStore::new(&config.database.path)?)
    };

    build_job_manager_with(config, toolchain, store)
}

/// Build a job manager from an already detected toolchain and store.
pub fn build_job_manager_with(
    config: &Config,
    toolchain: Arc<FfmpegToolchain>,
    store: Arc<dyn JobStore>,
) -> Result<JobManager, BuildError> {
    validate_config(config)?;

    // Ranked best first; the static slide always closes the chain.
    let mut methods: Vec<Arc<dyn CompositionMethod>> = Vec::new();
    if config.composer.high_fidelity {
        methods.push(Arc::new(HighFidelityMethod::new(
            Arc::clone(&toolchain),
            config.composer.fps,
        )));
    }
    if config.composer.frame_buffer {
        methods.push(Arc::new(FrameBufferMethod::new(
            Arc::clone(&toolchain),
            config.composer.fps,
        )));
    }
    methods.push(Arc::new(StaticSlideMethod::new()));
    let chain = Arc::new(CompositionChain::new(methods)?);

    let probe: Arc<dyn MediaProbe> = Arc::new(FfprobeProbe::new(Arc::clone(&toolchain)));
    let validator = SyncValidator::new(
        config.timing.scene_tolerance_secs,
        config.timing.global_tolerance_secs,
    );

    let composer = SceneComposer::new(
        Arc::clone(&chain),
        Arc::clone(&probe),
        DurationCalculator::new(&config.timing),
        validator,
        config.composer.timeout(),
    );

    let encoders: Vec<Arc<dyn TimelineEncoder>> = vec![
        Arc::new(FfmpegConcatEncoder::new(
            Arc::clone(&toolchain),
            probe,
            config.composer.fps,
        )),
        Arc::new(ManifestEncoder::new()),
    ];
    let assembler = MultiSceneAssembler::new(
        Arc::new(composer),
        encoders,
        validator,
        config.render.encode_timeout(),
    );
    info!(
        "Engine ready: chain [{}], encoders [{}], ffmpeg {}",
        chain.method_names().join(", "),
        assembler.encoder_names().join(", "),
        if toolchain.is_available() { "available" } else { "unavailable" }
    );
    let fanout = FanoutRenderer::new(Arc::new(assembler), config.render.clone());

    Ok(JobManager::new(
        config.manager.clone(),
        store,
        Arc::new(fanout),
        DurationCalculator::new(&config.timing),
    ))
}
