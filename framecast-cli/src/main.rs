//! Framecast CLI
//!
//! Pulls a network camera feed and serves it to browsers as an MJPEG stream
//! with overlays drawn on top.
//!
//! # Usage
//!
//! ```bash
//! # Run the HTTP API on the configured port
//! framecast serve
//!
//! # Start streaming a camera right away
//! framecast serve --rtsp-url rtsp://192.168.1.20/stream1
//!
//! # Write a default config file
//! framecast config init
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Framecast - live camera re-streaming with overlays
#[derive(Parser)]
#[command(name = "framecast")]
#[command(version)]
#[command(about = "Live network camera re-streaming with composited overlays", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and video feed
    Serve(commands::ServeArgs),

    /// Manage the configuration file
    Config(commands::ConfigArgs),

    /// Show FFmpeg and encoder information
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Serving should be chatty by default, everything else quiet
    let level = match (cli.verbose, &cli.command) {
        (0, Commands::Serve(_)) => Level::INFO,
        (0, _) => Level::WARN,
        (1, _) => Level::INFO,
        (2, _) => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("framecast={}", level).parse()?)
                .add_directive(format!("framecast_core={}", level).parse()?),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve(args) => commands::serve(args).await?,
        Commands::Config(args) => commands::config(args).await?,
        Commands::Info => commands::info().await?,
    }

    Ok(())
}
