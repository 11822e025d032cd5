//! GestureLink - Main entry point
//!
//! Reads hand landmarks from a pose estimator, turns finger counts and
//! virtual button touches into serial commands for the peripheral.

mod config;
mod control;
mod overlay;
mod source;

use anyhow::Result;
use clap::Parser;
use gesturelink_core::ButtonTouchTracker;
use gesturelink_serial::SerialLink;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::control::ControlLoop;
use crate::source::{HandFilter, JsonLinesSource, LandmarkSource};

#[derive(Parser, Debug)]
#[command(name = "gesturelink")]
#[command(about = "Hand gesture to serial command bridge")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "gesturelink.toml")]
    config: PathBuf,

    /// Serial port (overrides the configuration file)
    #[arg(short, long)]
    port: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Write a default configuration file and exit
    #[arg(long)]
    init: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("GestureLink v{}", env!("CARGO_PKG_VERSION"));

    if args.init {
        config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote default configuration");
        return Ok(());
    }

    let mut config = config::load_config(&args.config)?;

    // Override serial port if specified
    if let Some(port) = args.port {
        config.serial.port = port;
    }

    info!(
        port = %config.serial.port,
        baud = config.serial.baud_rate,
        "Configuration loaded"
    );

    // Failing to reach the board is fatal
    let link = SerialLink::open(&config.to_serial_settings()).await?;

    let (quit_tx, quit_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping");
                let _ = quit_tx.send(true);
            }
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
        }
    });

    match config.detector.command.clone() {
        Some(command) => {
            let source = JsonLinesSource::spawn(&command, &config.detector)?;
            run_loop(source, link, &config, quit_rx).await
        }
        None => {
            let source = JsonLinesSource::stdin(HandFilter::from_config(&config.detector));
            run_loop(source, link, &config, quit_rx).await
        }
    }
}

async fn run_loop<S: LandmarkSource>(
    source: S,
    link: SerialLink,
    config: &Config,
    quit: watch::Receiver<bool>,
) -> Result<()> {
    let tracker = ButtonTouchTracker::new(config.button_region());
    let mut control = ControlLoop::new(source, link, tracker, config.button.label.clone(), quit)
        .with_mirror(config.detector.mirror);

    let summary = control.run().await?;
    info!(
        frames = summary.frames,
        skipped = summary.skipped,
        commands = summary.commands_sent,
        write_failures = summary.write_failures,
        button_on = control.state().button.on,
        "Closing program"
    );
    Ok(())
}
