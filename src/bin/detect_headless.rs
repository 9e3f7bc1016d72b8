//! detect_headless - run one source through the detection pipeline without a window
//!
//! Frames are ticked exactly as in the GUI; rendered images go to a sink that
//! only logs them. Stops at end of stream, after `--max-ticks`, or on Ctrl-C.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use detect_viewer::{
    load_backend, DisplayImage, DisplaySink, Detector, PlaybackController, SourceFactory,
    SourceSpec, TickOutcome, ViewerConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(group(ArgGroup::new("source").required(true).args(["webcam", "image", "video"])))]
struct Args {
    /// Capture from a camera: index, device path or stub:// locator.
    /// Without a value the configured camera is used.
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    webcam: Option<String>,
    /// Detect on a single JPEG/PNG image.
    #[arg(long)]
    image: Option<PathBuf>,
    /// Detect on a local video file.
    #[arg(long)]
    video: Option<PathBuf>,
    /// Configuration file (TOML, or JSON with a .json extension).
    #[arg(long, env = "DETECT_VIEWER_CONFIG")]
    config: Option<PathBuf>,
    /// Model weights file, overrides the configured path.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Detector backend (stub or tract).
    #[arg(long)]
    backend: Option<String>,
    /// Stop after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,
}

/// Display sink that records what would have been drawn.
#[derive(Default)]
struct LogSink {
    shown: u64,
}

impl DisplaySink for LogSink {
    fn show(&mut self, image: DisplayImage) {
        self.shown += 1;
        log::debug!(
            "frame {} displayed at {}x{}",
            image.sequence,
            image.width,
            image.height
        );
    }

    fn clear(&mut self) {
        log::debug!("display cleared");
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = ViewerConfig::load(args.config.as_deref())?
        .with_overrides(args.model, args.backend.as_deref())?;

    let spec = match (args.webcam, args.image, args.video) {
        (Some(device), _, _) if device.trim().is_empty() => {
            SourceSpec::camera(cfg.camera.device.clone())
        }
        (Some(device), _, _) => SourceSpec::camera(device),
        (None, Some(path), _) => SourceSpec::still(path.to_string_lossy()),
        (None, None, Some(path)) => SourceSpec::video(path.to_string_lossy()),
        (None, None, None) => anyhow::bail!("one of --webcam, --image or --video is required"),
    };

    let detector = Detector::new(load_backend(&cfg.model)?);
    let mut controller =
        PlaybackController::new(SourceFactory::new(cfg.camera.clone()), detector, cfg.playback);
    let mut sink = LogSink::default();

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    controller.start(spec, Instant::now())?;

    let mut ticks = 0u64;
    while running.load(Ordering::SeqCst) && controller.is_running() {
        if let Some(outcome) = controller.poll(Instant::now(), &mut sink) {
            ticks += 1;
            match &outcome {
                TickOutcome::Rendered { sequence } => {
                    let detections = controller.detector().last_detections();
                    log::info!("frame {}: {} detections", sequence, detections.len());
                    for d in detections {
                        log::debug!(
                            "  {} {:.2} [{:.0},{:.0},{:.0},{:.0}]",
                            d.label(),
                            d.confidence,
                            d.x1,
                            d.y1,
                            d.x2,
                            d.y2
                        );
                    }
                }
                TickOutcome::Skipped(err) => log::debug!("tick skipped: {}", err),
                TickOutcome::EndOfStream => log::info!("end of stream"),
                TickOutcome::Stopped(err) => log::error!("playback stopped: {}", err),
            }
            if args.max_ticks.is_some_and(|max| ticks >= max) {
                log::info!("reached --max-ticks {}", ticks);
                break;
            }
        }
        if let Some(wait) = controller.time_until_next_tick(Instant::now()) {
            std::thread::sleep(wait);
        }
    }

    if !running.load(Ordering::SeqCst) {
        log::info!("shutdown signal received, stopping playback...");
    }
    let status = controller.status().map(str::to_string);
    controller.stop(&mut sink);

    let stats = controller.stats();
    log::info!(
        "done: {} ticks, {} frames rendered, {} skipped, {} displayed",
        stats.ticks,
        stats.frames_rendered,
        stats.frames_skipped,
        sink.shown
    );
    if let Some(status) = status {
        log::warn!("last status: {}", status);
    }
    Ok(())
}
