use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelforge_core::{
    build_job_manager, load_config, validate_config, Config, JobManager, JobRequest,
    JobStatusView,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file used when `REELFORGE_CONFIG` is not set.
const DEFAULT_CONFIG: &str = "reelforge.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let job_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => bail!("usage: reelforge <job.json>"),
    };

    let config = resolve_config()?;
    validate_config(&config).context("Configuration validation failed")?;

    let hash = config_hash(&config);
    info!(
        "reelforge {} starting (config {}, database {:?})",
        VERSION,
        &hash[..16],
        config.database.path
    );

    let request = read_request(&job_path)?;

    let manager = build_job_manager(&config)
        .await
        .context("Failed to build rendering engine")?;

    let job_id = manager.submit(request).await.context("Job rejected")?;
    info!("Submitted job {}", job_id);

    manager.start().await;
    let view = wait_for_terminal(&manager, &job_id).await;
    manager.stop().await;
    let view = view?;

    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn resolve_config() -> Result<Config> {
    resolve_config_from(
        std::env::var_os("REELFORGE_CONFIG").map(PathBuf::from),
        Path::new(DEFAULT_CONFIG),
    )
}

/// An explicit path must load. The fallback file is optional.
fn resolve_config_from(explicit: Option<PathBuf>, fallback: &Path) -> Result<Config> {
    let path = match explicit {
        Some(path) => path,
        None if fallback.exists() => fallback.to_path_buf(),
        None => {
            warn!("No {:?} found, using default configuration", fallback);
            return Ok(Config::default());
        }
    };
    info!("Loading configuration from {:?}", path);
    load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
}

fn config_hash(config: &Config) -> String {
    let config_json = serde_json::to_string(config).unwrap_or_default();
    format!("{:x}", Sha256::digest(config_json.as_bytes()))
}

fn read_request(path: &Path) -> Result<JobRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid job description in {:?}", path))
}

/// Poll until the job is terminal with no automatic retry pending.
/// Ctrl-C cancels the job and keeps waiting for it to settle.
async fn wait_for_terminal(manager: &JobManager, job_id: &str) -> Result<JobStatusView> {
    let interval = manager.config().poll_interval();
    let mut last_progress = None;
    let mut cancel_sent = false;

    loop {
        let view = manager.get_status(job_id).await?;
        if last_progress != Some(view.progress) {
            info!("Job {} {} ({}%)", job_id, view.status, view.progress);
            last_progress = Some(view.progress);
        }
        if view.status.is_terminal() && view.retry_after.is_none() {
            return Ok(view);
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = signal::ctrl_c(), if !cancel_sent => {
                result.context("Failed to listen for ctrl-c")?;
                warn!("Interrupted, cancelling job {}", job_id);
                cancel_sent = true;
                if let Err(e) = manager.cancel(job_id).await {
                    warn!("Cancel of job {} failed: {}", job_id, e);
                }
            }
        }
    }
}
