use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use crate::error::ViewerError;
use crate::ingest::{SourceOpener, SourceSpec};
use crate::playback::{DisplaySink, PlaybackController};

/// One button press, after any file picker has returned a path.
///
/// A cancelled picker produces no action at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShellAction {
    StartWebcam,
    Stop,
    DetectImage(PathBuf),
    DetectVideo(PathBuf),
}

impl fmt::Display for ShellAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellAction::StartWebcam => write!(f, "Start Webcam"),
            ShellAction::Stop => write!(f, "Stop"),
            ShellAction::DetectImage(path) => write!(f, "Detect from Image ({})", path.display()),
            ShellAction::DetectVideo(path) => write!(f, "Detect from Video ({})", path.display()),
        }
    }
}

/// Route an action to the controller.
///
/// `webcam` is the camera locator used by `StartWebcam`.
pub fn apply_action<O: SourceOpener>(
    controller: &mut PlaybackController<O>,
    action: ShellAction,
    webcam: &str,
    now: Instant,
    sink: &mut dyn DisplaySink,
) -> Result<(), ViewerError> {
    log::debug!("shell action: {}", action);
    let spec = match action {
        ShellAction::Stop => {
            controller.stop(sink);
            return Ok(());
        }
        ShellAction::StartWebcam => SourceSpec::camera(webcam),
        ShellAction::DetectImage(path) => SourceSpec::still(path.to_string_lossy()),
        ShellAction::DetectVideo(path) => SourceSpec::video(path.to_string_lossy()),
    };
    controller.start(spec, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detector, StubBackend};
    use crate::ingest::{SourceFactory, SourceKind};
    use crate::playback::{PlaybackConfig, PlaybackState, TickOutcome};
    use crate::render::{DisplayImage, DisplaySize};

    #[derive(Default)]
    struct Screen {
        image: Option<DisplayImage>,
    }

    impl DisplaySink for Screen {
        fn show(&mut self, image: DisplayImage) {
            self.image = Some(image);
        }

        fn clear(&mut self) {
            self.image = None;
        }
    }

    fn controller_with(factory: SourceFactory) -> PlaybackController<SourceFactory> {
        PlaybackController::new(
            factory,
            Detector::new(Box::new(StubBackend::new())),
            PlaybackConfig {
                display_size: DisplaySize::new(16, 12),
                ..PlaybackConfig::default()
            },
        )
    }

    fn controller() -> PlaybackController<SourceFactory> {
        controller_with(SourceFactory::default())
    }

    #[test]
    fn image_action_opens_still_source() -> Result<(), ViewerError> {
        let mut ctl = controller();
        let mut screen = Screen::default();
        let now = Instant::now();

        apply_action(
            &mut ctl,
            ShellAction::DetectImage(PathBuf::from("stub://shell-image?width=8&height=8")),
            "stub://unused",
            now,
            &mut screen,
        )?;
        assert_eq!(
            ctl.current_source().map(|spec| spec.kind),
            Some(SourceKind::StillImage)
        );
        assert!(matches!(
            ctl.poll(now, &mut screen),
            Some(TickOutcome::Rendered { .. })
        ));
        assert_eq!(ctl.state(), PlaybackState::Idle);
        assert_eq!(screen.image.as_ref().map(|i| (i.width, i.height)), Some((16, 12)));
        Ok(())
    }

    #[test]
    fn webcam_then_stop_clears_screen() -> Result<(), ViewerError> {
        let mut ctl = controller();
        let mut screen = Screen::default();
        let now = Instant::now();

        apply_action(
            &mut ctl,
            ShellAction::StartWebcam,
            "stub://shell-webcam?width=8&height=8",
            now,
            &mut screen,
        )?;
        ctl.poll(now, &mut screen);
        assert!(screen.image.is_some());

        apply_action(&mut ctl, ShellAction::Stop, "", now, &mut screen)?;
        assert!(screen.image.is_none());
        assert_eq!(ctl.state(), PlaybackState::Idle);
        Ok(())
    }

    #[test]
    fn video_action_replaces_running_webcam() -> Result<(), ViewerError> {
        let factory = SourceFactory::default();
        let mut ctl = controller_with(factory.clone());
        let mut screen = Screen::default();
        let now = Instant::now();

        apply_action(
            &mut ctl,
            ShellAction::StartWebcam,
            "stub://shell-replaced-cam",
            now,
            &mut screen,
        )?;
        assert!(factory.locks().is_held("shell-replaced-cam"));
        apply_action(
            &mut ctl,
            ShellAction::DetectVideo(PathBuf::from("stub://shell-video?frames=3")),
            "",
            now,
            &mut screen,
        )?;
        assert_eq!(
            ctl.current_source().map(|spec| spec.kind),
            Some(SourceKind::VideoFile)
        );
        // The camera was released by the replacement.
        assert!(!factory.locks().is_held("shell-replaced-cam"));
        Ok(())
    }

    #[test]
    fn unopenable_source_reports_source_unavailable() {
        let mut ctl = controller();
        let mut screen = Screen::default();
        let err = apply_action(
            &mut ctl,
            ShellAction::DetectVideo(PathBuf::from("stub://")),
            "",
            Instant::now(),
            &mut screen,
        )
        .unwrap_err();
        assert!(matches!(err, ViewerError::SourceUnavailable { .. }));
        assert!(ctl.status().is_some());
    }
}
