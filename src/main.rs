#![forbid(unsafe_code)]

mod config;
mod constants;
mod control;
mod daemon;
mod dpi;
mod face;
mod frame_window;
mod geometry;
mod hit_test;
mod lighting;
mod monitor;
mod orchestrator;
mod platform;
mod pointer;
mod x11_utils;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use config::Settings;
use platform::x11::X11Platform;

/// Soft light frame around the screen edges with a hole under the pointer
#[derive(Parser, Debug)]
#[command(name = "edge-light", version, about)]
struct Args {
    /// Settings file (default: ~/.config/edge-light/config.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Show the frame on every monitor
    #[arg(long)]
    all_monitors: bool,

    /// JSON-lines face sample stream (file or FIFO)
    #[arg(long, value_name = "PATH")]
    face_samples: Option<PathBuf>,

    /// Start with the light switched off
    #[arg(long)]
    light_off: bool,
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref());
    if args.all_monitors {
        settings.show_on_all_monitors = true;
    }
    if let Some(path) = args.face_samples {
        settings.face_samples = Some(path);
    }
    if args.light_off {
        settings.light_on = false;
    }
    info!(settings = ?settings, "Starting edge-light");

    let platform = X11Platform::connect(settings.frame_rgb())?;
    daemon::run(platform, &settings)
}
