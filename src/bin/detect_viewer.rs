//! detect_viewer - desktop window for live object detection
//!
//! Loads the model once, then opens the viewer window. Webcam, video and
//! image sessions are started from the window's buttons.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use detect_viewer::{load_backend, shell, Detector, ViewerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Configuration file (TOML, or JSON with a .json extension).
    #[arg(long, env = "DETECT_VIEWER_CONFIG")]
    config: Option<PathBuf>,
    /// Model weights file, overrides the configured path.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Detector backend (stub or tract).
    #[arg(long)]
    backend: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = ViewerConfig::load(args.config.as_deref())?
        .with_overrides(args.model, args.backend.as_deref())?;

    let detector = Detector::new(load_backend(&cfg.model)?);
    log::info!(
        "detect_viewer starting: backend={} window={}x{}",
        detector.backend_name(),
        cfg.window.width,
        cfg.window.height
    );

    shell::run_window(cfg, detector)?;
    log::info!("detect_viewer closed");
    Ok(())
}
