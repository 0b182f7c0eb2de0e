use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use raylink_bridge::{
    LoopState, RenderLoopMonitor, Session, SessionConfig, StopReason, WorkerOptions,
};
use raylink_engine::{ModuleSource, RenderOptions};

use crate::signal;

#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    /// Render module, binary `.wasm` or `.wat` text.
    ///
    /// Environment variable: `RAYLINK_MODULE`.
    #[arg(long, env = "RAYLINK_MODULE")]
    pub module: PathBuf,

    /// Render options JSON. The built-in demo scene is used when omitted.
    ///
    /// Environment variable: `RAYLINK_OPTIONS`.
    #[arg(long, env = "RAYLINK_OPTIONS")]
    pub options: Option<PathBuf>,

    /// Stop after this many frames. Runs until interrupted when omitted.
    #[arg(long)]
    pub frames: Option<u64>,

    /// Pool size override; defaults to the available hardware parallelism.
    ///
    /// Environment variable: `RAYLINK_THREADS`.
    #[arg(long, env = "RAYLINK_THREADS")]
    pub threads: Option<usize>,
}

pub async fn run(args: RenderArgs) -> anyhow::Result<()> {
    let options = match &args.options {
        Some(path) => RenderOptions::load(path)?,
        None => RenderOptions::default(),
    };

    let started = Instant::now();
    let session = Session::bootstrap(SessionConfig {
        module: ModuleSource::Path(args.module.clone()),
        options,
        worker: WorkerOptions {
            parallelism: args.threads,
            ..WorkerOptions::default()
        },
    })
    .await
    .with_context(|| format!("bootstrap render session for {}", args.module.display()))?;

    let mut monitor = session.monitor();
    tokio::select! {
        reached = until_done(&mut monitor, args.frames) => {
            if !reached {
                tracing::warn!("render loop stopped before the frame limit");
            }
        }
        _ = signal::shutdown() => {}
    }

    session.shutdown().await.context("terminate worker")?;

    let frames = monitor.frames();
    let elapsed = started.elapsed().as_secs_f64();
    tracing::info!(
        frames,
        elapsed_seconds = elapsed,
        frames_per_second = frames as f64 / elapsed.max(f64::EPSILON),
        "render session finished"
    );

    if monitor.state() == LoopState::Stopped(StopReason::Failed) {
        anyhow::bail!("render loop failed after {frames} frames");
    }
    Ok(())
}

/// `true` once `limit` frames were rendered; `false` if the loop stopped on its own first.
async fn until_done(monitor: &mut RenderLoopMonitor, limit: Option<u64>) -> bool {
    match limit {
        Some(limit) => monitor.wait_for_frames(limit).await,
        None => {
            monitor.stopped().await;
            false
        }
    }
}
