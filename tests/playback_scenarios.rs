use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use detect_viewer::detect::{Detector, StubBackend};
use detect_viewer::frame::Frame;
use detect_viewer::ingest::{
    FrameSource, SourceFactory, SourceKind, SourceOpener, SourceSpec, SourceStats,
    SyntheticSource,
};
use detect_viewer::playback::{
    DisplaySink, PlaybackConfig, PlaybackController, PlaybackState, ReadFailurePolicy,
    TickOutcome,
};
use detect_viewer::render::{DisplayImage, DisplaySize};
use detect_viewer::ViewerError;

const TICK: Duration = Duration::from_millis(30);

#[derive(Default)]
struct RecordingSink {
    shown: Vec<(u64, u32, u32)>,
    clears: usize,
}

impl DisplaySink for RecordingSink {
    fn show(&mut self, image: DisplayImage) {
        self.shown.push((image.sequence, image.width, image.height));
    }

    fn clear(&mut self) {
        self.clears += 1;
    }
}

/// Source wrapper that tracks how many sessions are open at once.
struct Tracked {
    inner: SyntheticSource,
    open: Arc<AtomicUsize>,
}

impl FrameSource for Tracked {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.inner.next_frame()
    }

    fn kind(&self) -> SourceKind {
        self.inner.kind()
    }

    fn locator(&self) -> &str {
        self.inner.locator()
    }

    fn stats(&self) -> SourceStats {
        self.inner.stats()
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

fn tracking_opener(
    open: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
) -> impl FnMut(&SourceSpec) -> Result<Box<dyn FrameSource>> {
    move |spec: &SourceSpec| -> Result<Box<dyn FrameSource>> {
        let inner = SyntheticSource::open(spec.kind, &spec.locator)?;
        let now_open = open.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now_open, Ordering::SeqCst);
        Ok(Box::new(Tracked {
            inner,
            open: open.clone(),
        }))
    }
}

fn config(policy: ReadFailurePolicy) -> PlaybackConfig {
    PlaybackConfig {
        tick_interval: TICK,
        read_failure_policy: policy,
        display_size: DisplaySize::new(32, 24),
    }
}

fn factory_controller(policy: ReadFailurePolicy) -> PlaybackController<SourceFactory> {
    PlaybackController::new(
        SourceFactory::default(),
        Detector::new(Box::new(StubBackend::new())),
        config(policy),
    )
}

/// Poll on a simulated clock until the controller goes idle.
fn run_to_idle<O: SourceOpener>(
    controller: &mut PlaybackController<O>,
    sink: &mut RecordingSink,
    start: Instant,
    max_ticks: usize,
) -> Vec<TickOutcome> {
    let mut outcomes = Vec::new();
    let mut now = start;
    while controller.is_running() && outcomes.len() < max_ticks {
        if let Some(outcome) = controller.poll(now, sink) {
            outcomes.push(outcome);
        }
        now += TICK;
    }
    outcomes
}

#[test]
fn ten_frame_video_renders_every_frame_then_idles() {
    let mut ctl = factory_controller(ReadFailurePolicy::Skip);
    let mut sink = RecordingSink::default();
    let t0 = Instant::now();

    ctl.start(SourceSpec::video("stub://clip10?frames=10&width=64&height=48"), t0)
        .expect("start video");
    let outcomes = run_to_idle(&mut ctl, &mut sink, t0, 100);

    let rendered = outcomes
        .iter()
        .filter(|o| matches!(o, TickOutcome::Rendered { .. }))
        .count();
    assert_eq!(rendered, 10);
    assert_eq!(outcomes.last(), Some(&TickOutcome::EndOfStream));
    assert_eq!(ctl.state(), PlaybackState::Idle);
    assert_eq!(
        sink.shown.iter().map(|s| s.0).collect::<Vec<_>>(),
        (1..=10).collect::<Vec<_>>()
    );
    assert_eq!(sink.clears, 0, "end of stream keeps the last image");
    assert!(ctl.status().is_none());
}

#[test]
fn corrupt_frame_is_skipped_under_default_policy() {
    let mut ctl = factory_controller(ReadFailurePolicy::default());
    let mut sink = RecordingSink::default();
    let t0 = Instant::now();

    ctl.start(
        SourceSpec::video("stub://corrupt?frames=10&fail_at=5&width=16&height=16"),
        t0,
    )
    .expect("start video");
    let outcomes = run_to_idle(&mut ctl, &mut sink, t0, 100);

    assert_eq!(sink.shown.len(), 9);
    assert!(matches!(
        outcomes[4],
        TickOutcome::Skipped(ViewerError::Decode { frame: 5, .. })
    ));
    assert_eq!(ctl.stats().frames_skipped, 1);
    assert_eq!(ctl.stats().frames_rendered, 9);
    assert_eq!(ctl.state(), PlaybackState::Idle);
}

#[test]
fn stop_policy_halts_on_first_corrupt_frame() {
    let mut ctl = factory_controller(ReadFailurePolicy::Stop);
    let mut sink = RecordingSink::default();
    let t0 = Instant::now();

    ctl.start(
        SourceSpec::video("stub://halt?frames=10&fail_at=3&width=16&height=16"),
        t0,
    )
    .expect("start video");
    let outcomes = run_to_idle(&mut ctl, &mut sink, t0, 100);

    assert_eq!(sink.shown.len(), 2);
    assert!(matches!(
        outcomes.last(),
        Some(TickOutcome::Stopped(ViewerError::Decode { frame: 3, .. }))
    ));
    assert_eq!(ctl.state(), PlaybackState::Idle);
    assert!(ctl.status().is_some_and(|s| s.contains("frame 3")));
}

#[test]
fn still_image_renders_once_then_idles() {
    let mut ctl = factory_controller(ReadFailurePolicy::Skip);
    let mut sink = RecordingSink::default();
    let t0 = Instant::now();

    ctl.start(SourceSpec::still("stub://photo?width=40&height=30"), t0)
        .expect("start image");
    assert!(matches!(
        ctl.poll(t0, &mut sink),
        Some(TickOutcome::Rendered { sequence: 1 })
    ));
    assert_eq!(ctl.state(), PlaybackState::Idle);
    assert_eq!(ctl.time_until_next_tick(t0), None);

    for step in 1..5u32 {
        assert!(ctl.poll(t0 + TICK * step, &mut sink).is_none());
    }
    assert_eq!(sink.shown, vec![(1, 32, 24)]);
}

#[test]
fn still_image_then_stop_clears_the_display() {
    let mut ctl = factory_controller(ReadFailurePolicy::Skip);
    let mut sink = RecordingSink::default();
    let t0 = Instant::now();

    ctl.start(SourceSpec::still("stub://stop-after-photo?width=8&height=8"), t0)
        .expect("start image");
    ctl.poll(t0, &mut sink);
    assert_eq!(ctl.state(), PlaybackState::Idle);
    assert_eq!(sink.shown.len(), 1);
    assert_eq!(sink.clears, 0);

    ctl.stop(&mut sink);
    assert_eq!(sink.clears, 1, "stop removes the finished image");
    ctl.stop(&mut sink);
    assert_eq!(sink.clears, 1);
}

#[test]
fn still_image_from_disk_renders_once() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scene.png");
    image::RgbImage::from_pixel(20, 10, image::Rgb([200, 10, 10])).save(&path)?;

    let mut ctl = factory_controller(ReadFailurePolicy::Skip);
    let mut sink = RecordingSink::default();
    let t0 = Instant::now();

    ctl.start(SourceSpec::still(path.to_string_lossy()), t0)?;
    let outcomes = run_to_idle(&mut ctl, &mut sink, t0, 10);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(sink.shown, vec![(1, 32, 24)]);
    Ok(())
}

#[test]
fn at_most_one_session_is_open() {
    let open = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut ctl = PlaybackController::new(
        tracking_opener(open.clone(), peak.clone()),
        Detector::new(Box::new(StubBackend::new())),
        config(ReadFailurePolicy::Skip),
    );
    let mut sink = RecordingSink::default();
    let t0 = Instant::now();

    ctl.start(SourceSpec::camera("stub://one-session-cam?width=8&height=8"), t0)
        .expect("webcam");
    ctl.poll(t0, &mut sink);
    ctl.start(SourceSpec::video("stub://one-session-video?frames=3&width=8&height=8"), t0)
        .expect("video");
    ctl.poll(t0, &mut sink);
    ctl.start(SourceSpec::still("stub://one-session-image?width=8&height=8"), t0)
        .expect("image");
    assert_eq!(open.load(Ordering::SeqCst), 1);

    ctl.poll(t0, &mut sink);
    assert_eq!(open.load(Ordering::SeqCst), 0, "still image closes after its frame");
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(ctl.stats().sessions_opened, 3);
}

#[test]
fn stop_twice_equals_stop_once() {
    let open = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut ctl = PlaybackController::new(
        tracking_opener(open.clone(), peak),
        Detector::new(Box::new(StubBackend::new())),
        config(ReadFailurePolicy::Skip),
    );
    let mut sink = RecordingSink::default();
    let t0 = Instant::now();

    ctl.start(SourceSpec::camera("stub://stop-twice-cam?width=8&height=8"), t0)
        .expect("webcam");
    ctl.poll(t0, &mut sink);

    ctl.stop(&mut sink);
    let after_first = (ctl.state(), sink.clears, open.load(Ordering::SeqCst));
    ctl.stop(&mut sink);
    let after_second = (ctl.state(), sink.clears, open.load(Ordering::SeqCst));

    assert_eq!(after_first, (PlaybackState::Idle, 1, 0));
    assert_eq!(after_first, after_second);
}

#[test]
fn webcam_can_be_reopened_after_stop() {
    let mut ctl = factory_controller(ReadFailurePolicy::Skip);
    let mut sink = RecordingSink::default();
    let t0 = Instant::now();
    let webcam = SourceSpec::camera("stub://reopen-cam?width=8&height=8");

    ctl.start(webcam.clone(), t0).expect("first open");
    for step in 0..3u32 {
        ctl.poll(t0 + TICK * step, &mut sink);
    }
    ctl.stop(&mut sink);
    assert_eq!(ctl.state(), PlaybackState::Idle);

    let t1 = t0 + Duration::from_secs(1);
    ctl.start(webcam.clone(), t1).expect("reopen after stop");
    assert!(ctl.is_running());
    assert!(matches!(
        ctl.poll(t1, &mut sink),
        Some(TickOutcome::Rendered { .. })
    ));

    // Restarting the same device while it is running also works.
    ctl.start(webcam, t1).expect("restart while running");
    assert!(ctl.is_running());
}

#[test]
fn busy_camera_reports_source_unavailable() {
    let mut factory = SourceFactory::default();
    let _held = factory
        .open(&SourceSpec::camera("stub://held-cam"))
        .expect("hold");
    let mut ctl = PlaybackController::new(
        factory.clone(),
        Detector::new(Box::new(StubBackend::new())),
        config(ReadFailurePolicy::Skip),
    );

    let err = ctl
        .start(SourceSpec::camera("stub://held-cam"), Instant::now())
        .unwrap_err();
    assert!(matches!(err, ViewerError::SourceUnavailable { .. }));
    assert_eq!(ctl.state(), PlaybackState::Idle);
    assert!(ctl.status().is_some_and(|s| s.contains("busy")));
}

#[test]
fn missing_files_report_source_unavailable() {
    let mut ctl = factory_controller(ReadFailurePolicy::Skip);
    for spec in [
        SourceSpec::still("/nonexistent/picture.png"),
        SourceSpec::video("/nonexistent/clip.mp4"),
    ] {
        let err = ctl.start(spec, Instant::now()).unwrap_err();
        assert!(matches!(err, ViewerError::SourceUnavailable { .. }));
        assert_eq!(ctl.state(), PlaybackState::Idle);
    }
}

#[test]
fn rendered_images_match_display_size() {
    let mut ctl = PlaybackController::new(
        SourceFactory::default(),
        Detector::new(Box::new(StubBackend::new())),
        PlaybackConfig::default(),
    );
    let mut sink = RecordingSink::default();
    let t0 = Instant::now();

    ctl.start(SourceSpec::camera("stub://vga-cam"), t0).expect("webcam");
    ctl.poll(t0, &mut sink);
    assert_eq!(sink.shown, vec![(1, 800, 600)]);

    ctl.set_display_size(DisplaySize::new(1024, 700));
    ctl.poll(t0 + TICK, &mut sink);
    assert_eq!(sink.shown[1], (2, 1024, 700));
}

#[test]
fn inference_failure_skips_frame_and_continues() {
    struct Flaky {
        calls: u32,
    }

    impl detect_viewer::DetectorBackend for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<detect_viewer::Detection>> {
            self.calls += 1;
            if self.calls == 2 {
                anyhow::bail!("tensor shape mismatch");
            }
            Ok(Vec::new())
        }
    }

    let mut ctl = PlaybackController::new(
        SourceFactory::default(),
        Detector::new(Box::new(Flaky { calls: 0 })),
        config(ReadFailurePolicy::Skip),
    );
    let mut sink = RecordingSink::default();
    let t0 = Instant::now();

    ctl.start(SourceSpec::video("stub://flaky?frames=3&width=8&height=8"), t0)
        .expect("start");
    let outcomes = run_to_idle(&mut ctl, &mut sink, t0, 10);

    assert!(matches!(
        outcomes[1],
        TickOutcome::Skipped(ViewerError::Inference { frame: 2, .. })
    ));
    assert_eq!(
        sink.shown.iter().map(|s| s.0).collect::<Vec<_>>(),
        vec![1, 3]
    );
    assert_eq!(outcomes.last(), Some(&TickOutcome::EndOfStream));
}
