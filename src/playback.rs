//! Playback controller.
//!
//! Drives the capture → infer → render cycle for one session at a time:
//!
//! - `start` closes any open session, opens the new one and schedules the first
//!   tick immediately.
//! - `poll(now, sink)` runs one tick when its deadline has passed. The host UI
//!   calls it from its event loop and uses `time_until_next_tick` to arm its
//!   own timer, so ticks never overlap and `stop` lands on a tick boundary.
//! - End of stream returns to `Idle` on its own and keeps the last image on
//!   screen; `stop` returns to `Idle` and clears the display.
//!
//! All state is owned by the controller and only touched from the thread that
//! polls it.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::anyhow;

use crate::detect::Detector;
use crate::error::ViewerError;
use crate::frame::Frame;
use crate::ingest::{FrameSource, SourceFactory, SourceKind, SourceOpener, SourceSpec};
use crate::render::{self, DisplayImage, DisplaySize};

/// Fixed polling interval, roughly 33 ticks per second.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(30);

/// Consecutive read failures between repeated warnings.
const READ_FAILURE_WARN_EVERY: u32 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Idle,
    Running,
}

/// What a tick does when the source fails to deliver a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadFailurePolicy {
    /// Skip the tick and keep the session running.
    #[default]
    Skip,
    /// Close the session and return to `Idle` with a status message.
    Stop,
}

impl FromStr for ReadFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(ReadFailurePolicy::Skip),
            "stop" => Ok(ReadFailurePolicy::Stop),
            other => Err(anyhow!("unknown read failure policy '{}'", other)),
        }
    }
}

impl fmt::Display for ReadFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadFailurePolicy::Skip => write!(f, "skip"),
            ReadFailurePolicy::Stop => write!(f, "stop"),
        }
    }
}

/// Where rendered images go.
pub trait DisplaySink {
    fn show(&mut self, image: DisplayImage);

    fn clear(&mut self);
}

/// Result of one tick.
#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// A frame went through the whole pipeline and reached the display.
    Rendered { sequence: u64 },
    /// The frame was dropped; the session keeps running.
    Skipped(ViewerError),
    /// The source ran dry; the controller is `Idle` again.
    EndOfStream,
    /// The session was closed because of the error; the controller is `Idle`.
    Stopped(ViewerError),
}

#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    pub tick_interval: Duration,
    pub read_failure_policy: ReadFailurePolicy,
    pub display_size: DisplaySize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            read_failure_policy: ReadFailurePolicy::default(),
            display_size: DisplaySize::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub sessions_opened: u64,
    pub ticks: u64,
    pub frames_rendered: u64,
    pub frames_skipped: u64,
}

struct Session {
    spec: SourceSpec,
    source: Box<dyn FrameSource>,
    reads: u64,
    consecutive_failures: u32,
}

impl Session {
    fn read(&mut self) -> Result<Option<Frame>, ViewerError> {
        self.reads += 1;
        match self.source.next_frame() {
            Ok(Some(frame)) => {
                self.consecutive_failures = 0;
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                self.consecutive_failures += 1;
                Err(ViewerError::Decode {
                    frame: self.reads,
                    reason: ViewerError::reason(&err),
                })
            }
        }
    }
}

pub struct PlaybackController<O: SourceOpener = SourceFactory> {
    opener: O,
    detector: Detector,
    config: PlaybackConfig,
    state: PlaybackState,
    session: Option<Session>,
    next_tick_at: Option<Instant>,
    status: Option<String>,
    stats: PlaybackStats,
    /// An image is on the sink and has not been cleared since.
    displaying: bool,
}

impl<O: SourceOpener> PlaybackController<O> {
    pub fn new(opener: O, detector: Detector, config: PlaybackConfig) -> Self {
        Self {
            opener,
            detector,
            config,
            state: PlaybackState::Idle,
            session: None,
            next_tick_at: None,
            status: None,
            stats: PlaybackStats::default(),
            displaying: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PlaybackState::Running
    }

    /// Last user-visible problem, cleared by start, stop and the next rendered frame.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn stats(&self) -> &PlaybackStats {
        &self.stats
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Spec of the open session, if any.
    pub fn current_source(&self) -> Option<&SourceSpec> {
        self.session.as_ref().map(|session| &session.spec)
    }

    pub fn set_display_size(&mut self, size: DisplaySize) {
        self.config.display_size = size;
    }

    /// Open `spec` and start ticking. Any open session is closed first.
    ///
    /// On failure the controller stays `Idle` and the error is also kept as the
    /// status message.
    pub fn start(&mut self, spec: SourceSpec, now: Instant) -> Result<(), ViewerError> {
        self.close_session("replaced");
        self.state = PlaybackState::Idle;
        self.next_tick_at = None;

        let source = match self.opener.open(&spec) {
            Ok(source) => source,
            Err(err) => {
                let error = ViewerError::SourceUnavailable {
                    locator: spec.locator.clone(),
                    reason: ViewerError::reason(&err),
                };
                log::warn!("{}", error);
                self.status = Some(error.to_string());
                return Err(error);
            }
        };

        log::info!(
            "playback started: {} (tick every {:?})",
            spec,
            self.config.tick_interval
        );
        self.session = Some(Session {
            spec,
            source,
            reads: 0,
            consecutive_failures: 0,
        });
        self.stats.sessions_opened += 1;
        self.state = PlaybackState::Running;
        self.next_tick_at = Some(now);
        self.status = None;
        Ok(())
    }

    /// Stop ticking, close the session and clear the display.
    ///
    /// Also clears an image left on screen by a finished still image or video.
    /// A second stop changes nothing.
    pub fn stop(&mut self, sink: &mut dyn DisplaySink) {
        self.close_session("stopped");
        self.state = PlaybackState::Idle;
        self.next_tick_at = None;
        self.status = None;
        if self.displaying {
            sink.clear();
            self.displaying = false;
        }
    }

    /// Whether the sink currently holds an image from this controller.
    pub fn is_displaying(&self) -> bool {
        self.displaying
    }

    /// Run a tick if one is due at `now`.
    pub fn poll(&mut self, now: Instant, sink: &mut dyn DisplaySink) -> Option<TickOutcome> {
        if self.state != PlaybackState::Running {
            return None;
        }
        let deadline = self.next_tick_at?;
        if now < deadline {
            return None;
        }

        let outcome = self.tick(sink);

        if self.state == PlaybackState::Running {
            let following = deadline + self.config.tick_interval;
            self.next_tick_at = Some(if following > now {
                following
            } else {
                now + self.config.tick_interval
            });
        }
        Some(outcome)
    }

    /// Time left before the next tick is due, `None` when idle.
    pub fn time_until_next_tick(&self, now: Instant) -> Option<Duration> {
        self.next_tick_at
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    fn tick(&mut self, sink: &mut dyn DisplaySink) -> TickOutcome {
        let Some(session) = self.session.as_mut() else {
            self.state = PlaybackState::Idle;
            self.next_tick_at = None;
            return TickOutcome::EndOfStream;
        };
        self.stats.ticks += 1;
        let kind = session.spec.kind;
        let read = session.read();
        let consecutive_failures = session.consecutive_failures;

        let frame = match read {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.finish("end of stream");
                return TickOutcome::EndOfStream;
            }
            Err(error) => return self.read_failed(error, consecutive_failures),
        };

        let sequence = frame.sequence;
        let annotated = match self.detector.infer(frame) {
            Ok(annotated) => annotated,
            Err(err) => {
                let error = ViewerError::Inference {
                    frame: sequence,
                    reason: ViewerError::reason(&err),
                };
                log::warn!("{}; frame dropped", error);
                self.stats.frames_skipped += 1;
                self.status = Some(error.to_string());
                return TickOutcome::Skipped(error);
            }
        };

        let image = match render::adapt(&annotated, self.config.display_size) {
            Ok(image) => image,
            Err(err) => {
                let error = render_error(&err, sequence);
                self.halt(error.clone());
                return TickOutcome::Stopped(error);
            }
        };

        sink.show(image);
        self.displaying = true;
        self.stats.frames_rendered += 1;
        self.status = None;

        if kind == SourceKind::StillImage {
            self.finish("single image shown");
        }
        TickOutcome::Rendered { sequence }
    }

    fn read_failed(&mut self, error: ViewerError, consecutive_failures: u32) -> TickOutcome {
        match self.config.read_failure_policy {
            ReadFailurePolicy::Skip => {
                self.stats.frames_skipped += 1;
                if consecutive_failures == 1 {
                    log::warn!("{}; tick skipped", error);
                } else if consecutive_failures % READ_FAILURE_WARN_EVERY == 0 {
                    log::warn!(
                        "{} consecutive read failures, source may be stalled: {}",
                        consecutive_failures,
                        error
                    );
                } else {
                    log::debug!("{}; tick skipped", error);
                }
                TickOutcome::Skipped(error)
            }
            ReadFailurePolicy::Stop => {
                self.halt(error.clone());
                TickOutcome::Stopped(error)
            }
        }
    }

    /// Normal return to `Idle`; the last image stays on screen.
    fn finish(&mut self, reason: &str) {
        self.close_session(reason);
        self.state = PlaybackState::Idle;
        self.next_tick_at = None;
    }

    /// Failure return to `Idle` with the error as status.
    fn halt(&mut self, error: ViewerError) {
        log::error!("playback stopped: {}", error);
        self.finish("error");
        self.status = Some(error.to_string());
    }

    fn close_session(&mut self, reason: &str) {
        if let Some(session) = self.session.take() {
            let stats = session.source.stats();
            log::info!(
                "closing {} session ({}): {} frames delivered, {} decode failures",
                session.spec,
                reason,
                stats.frames_delivered,
                stats.decode_failures
            );
        }
    }
}

/// Render failures other than a bad channel count are reported as what they are.
fn render_error(err: &anyhow::Error, frame: u64) -> ViewerError {
    match err.downcast_ref::<ViewerError>() {
        Some(error) => error.clone(),
        None => ViewerError::Render {
            frame,
            reason: ViewerError::reason(err),
        },
    }
}
