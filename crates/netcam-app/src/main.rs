use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use netcam_core::PeerId;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app;
mod devices;

/// Which end of the stream this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleKind {
    /// Capture and stream frames.
    #[value(alias = "s", alias = "streamer")]
    Source,
    /// Pair with a source and show its frames.
    #[value(alias = "v", alias = "viewer")]
    Sink,
}

#[derive(Debug, Parser)]
#[command(name = "netcam", version)]
#[command(about = "Stream camera frames between peers over a message bus")]
pub struct Args {
    /// JSON configuration file (default: ./netcam.json when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// This peer's identifier on the bus
    #[arg(short, long)]
    pub name: PeerId,

    /// Role to run
    #[arg(short = 't', long = "type", value_enum)]
    pub kind: RoleKind,

    /// Source to pair with (sink only)
    #[arg(short, long, required_if_eq("kind", "sink"))]
    pub source_id: Option<PeerId>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG=debug for per-envelope diagnostics
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(false)
        .init();

    info!("netcam v{}", env!("CARGO_PKG_VERSION"));

    match app::run(args).await {
        Ok(()) => {
            info!("netcam exited cleanly.");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            Err(e)
        }
    }
}
