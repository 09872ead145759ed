pub mod assembler;
pub mod composer;
pub mod config;
pub mod interactive;
pub mod job;
pub mod manager;
pub mod media;
pub mod metrics;
pub mod render;
pub mod script;
pub mod testing;
pub mod timing;

pub use assembler::{
    AssemblyError, EncoderError, FfmpegConcatEncoder, ManifestEncoder, MultiSceneAssembler,
    Timeline, TimelineEncoder,
};
pub use composer::{
    ComposerConfig, ComposerError, CompositionChain, CompositionMethod, FrameBufferMethod,
    HighFidelityMethod, SceneComposer, StaticSlideMethod,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
};
pub use interactive::{InteractiveElements, InteractivePackage};
pub use job::{
    ErrorCode, ErrorRecord, JobFilter, JobRequest, JobStatus, JobStatusView, JobStore,
    JobStoreError, RenderJob, SqliteJobStore,
};
pub use manager::{
    build_job_manager, build_job_manager_with, BuildError, JobManager, ManagerConfig,
    ManagerError, ManagerStatus, RetryConfig,
};
pub use media::{FfmpegToolchain, FfprobeProbe, MediaProbe, ProbeError, ToolError};
pub use render::{
    FanoutRenderer, OutputResult, OutputSpec, QualityPreset, RenderConfig, Resolution, VideoFormat,
};
pub use script::{ContentSet, Scene, Template};
pub use timing::{DurationCalculator, SyncValidator, TimingConfig};
