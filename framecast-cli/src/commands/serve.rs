//! Serve command - run the HTTP API and video feed

use anyhow::{Context, Result};
use clap::Args;
use framecast_core::{
    AppState, JpegEncoder, RuntimeConfig, SessionRegistry,
    capture::FfmpegBackend,
    config::{ConfigFile, PORT_ENV, RtspTransport},
    server,
};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};

/// Arguments for the serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Config file to load instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind to (overrides the config file)
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Port to listen on (overrides the config file and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// RTSP transport (tcp, udp)
    #[arg(long)]
    transport: Option<RtspTransport>,

    /// Start streaming this source as soon as the server is up
    #[arg(long)]
    rtsp_url: Option<String>,
}

impl ServeArgs {
    /// Resolve file, environment and flags, in increasing precedence
    fn runtime_config(&self) -> Result<RuntimeConfig> {
        let file = match &self.config {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                ConfigFile::load_from(path)?
            }
            None => ConfigFile::load()?,
        };

        let mut runtime = RuntimeConfig::from_file(&file)?;
        runtime.apply_port_env(std::env::var(PORT_ENV).ok().as_deref())?;

        if let Some(ip) = self.bind {
            runtime.bind = SocketAddr::new(ip, runtime.bind.port());
        }
        if let Some(port) = self.port {
            runtime.bind.set_port(port);
        }
        if let Some(transport) = self.transport {
            runtime.capture.rtsp_transport = transport;
        }

        Ok(runtime)
    }
}

/// Run the server until Ctrl+C
pub async fn serve(args: ServeArgs) -> Result<()> {
    let runtime = args.runtime_config()?;

    let backend = FfmpegBackend::new(runtime.capture.clone())
        .context("Failed to initialize FFmpeg capture")?;
    let encoder = JpegEncoder::new().context("Failed to initialize JPEG encoder")?;

    let registry = Arc::new(SessionRegistry::new(
        Arc::new(backend),
        runtime.capture.frame_queue,
    ));
    let state = AppState::new(Arc::clone(&registry), Arc::new(encoder), runtime.publisher);

    let listener = TcpListener::bind(runtime.bind)
        .await
        .with_context(|| format!("Failed to bind {}", runtime.bind))?;

    if let Some(url) = args.rtsp_url {
        let session = state.default_session();
        let started = tokio::task::spawn_blocking(move || session.start(&url)).await?;
        match started {
            Ok(ack) => info!("Streaming {} (generation {})", ack.source, ack.generation),
            Err(e) => warn!("Could not start initial stream: {}", e),
        }
    }

    let shutdown_registry = Arc::clone(&registry);
    let shutdown = async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received interrupt signal, stopping sessions");
        // Ending the sessions closes every open video feed
        let registry = shutdown_registry;
        if let Err(e) = tokio::task::spawn_blocking(move || registry.stop_all()).await {
            error!("Failed to stop sessions: {}", e);
        }
    };

    let served = server::serve(listener, state, shutdown).await;

    tokio::task::spawn_blocking(move || registry.shutdown()).await?;
    served?;

    info!("Framecast stopped");
    Ok(())
}
