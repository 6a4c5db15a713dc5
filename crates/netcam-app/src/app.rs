use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use netcam_core::{NetcamConfig, PeerId};
use netcam_sink::Viewer;
use netcam_source::{ServoGimbal, Streamer};
use netcam_transport::{drive, UdpBus};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::devices::{spawn_keyboard, ConsoleDisplay, LoggingPwm, StaticTelemetry, TestPatternCamera};
use crate::{Args, RoleKind};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "netcam.json";

/// Main loop: load the configuration, bind the bus, and drive the selected
/// role until Ctrl-C or a fatal capture failure.
pub async fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            shutdown.cancel();
        }
    });

    match args.kind {
        RoleKind::Source => run_source(args.name, &config, cancel).await,
        RoleKind::Sink => {
            let source = args
                .source_id
                .context("--source-id is required when running a sink")?;
            run_sink(args.name, source, &config, cancel).await
        }
    }
}

async fn run_source(uid: PeerId, config: &NetcamConfig, cancel: CancellationToken) -> Result<()> {
    let (mut bus, mut inbound) = UdpBus::bind(config, config.source.timer).await?;

    let options = &config.source;
    let camera = TestPatternCamera::new(options.width, options.height);
    let mut streamer = Streamer::new(uid, options.clone(), Box::new(camera));
    if options.gps {
        if options.location.is_none() {
            warn!("GPS enabled but no location configured; acknowledgements carry no fix");
        }
        streamer = streamer.with_telemetry(Box::new(StaticTelemetry::new(options.location)));
    }
    if options.servo {
        let mut gimbal = ServoGimbal::new(LoggingPwm);
        gimbal.reset().context("Centring gimbal")?;
        streamer = streamer.with_actuator(Box::new(gimbal));
    }

    info!("Source {} streaming on {}", uid, bus.local_addr());
    drive(&mut streamer, &mut bus, &mut inbound, &cancel).await?;
    Ok(())
}

async fn run_sink(
    uid: PeerId,
    source: PeerId,
    config: &NetcamConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let (mut bus, mut inbound) = UdpBus::bind(config, config.sink.timer).await?;

    let keys = std::io::stdin().is_terminal().then(spawn_keyboard);
    if keys.is_some() {
        info!("Gimbal keys: w/s tilt, a/d pan, l location (press Enter to send)");
    }
    let display = ConsoleDisplay::new(keys);
    let mut viewer = Viewer::new(uid, source, config.sink.clone(), Box::new(display));

    info!("Sink {} pairing with source {} via {}", uid, source, bus.local_addr());
    drive(&mut viewer, &mut bus, &mut inbound, &cancel).await?;
    Ok(())
}

/// Read the JSON configuration. Without an explicit path, `netcam.json` in
/// the working directory is used when present, else the defaults.
pub fn load_config(path: Option<&Path>) -> Result<NetcamConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                info!("No {} found, using default configuration", DEFAULT_CONFIG_FILE);
                return Ok(NetcamConfig::default());
            }
            fallback
        }
    };

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Reading config {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("Parsing config {}", path.display()))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
