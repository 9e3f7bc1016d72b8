//! Frame sources.
//!
//! This module provides the sources a capture session can be opened on:
//! - Cameras (V4L2 devices, feature: ingest-v4l2)
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Still images (JPEG/PNG through the `image` crate)
//! - Synthetic `stub://` sources for every kind (tests, demos)
//!
//! Every source owns exactly one underlying handle and releases it on drop, so a
//! session dropped mid-playback (stop, replacement, unwinding) never leaks the
//! device or decoder.

pub mod camera;
pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod still;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub(crate) mod v4l2;

use std::fmt;
use std::path::Path;

use anyhow::Result;

use crate::frame::Frame;

pub use camera::{CameraConfig, CameraSource};
pub use file::VideoFileSource;
pub use still::StillImageSource;
pub use synthetic::{DeviceLocks, SyntheticOptions, SyntheticSource};

/// File extensions offered by the "Detect from Image" picker.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
/// File extensions offered by the "Detect from Video" picker.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

/// What kind of input a session reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Camera,
    VideoFile,
    StillImage,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Camera => write!(f, "camera"),
            SourceKind::VideoFile => write!(f, "video"),
            SourceKind::StillImage => write!(f, "image"),
        }
    }
}

/// Request to open a source: the kind plus a locator (device, path or `stub://` URI).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceSpec {
    pub kind: SourceKind,
    pub locator: String,
}

impl SourceSpec {
    pub fn camera(locator: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Camera,
            locator: locator.into(),
        }
    }

    pub fn video(locator: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::VideoFile,
            locator: locator.into(),
        }
    }

    pub fn still(locator: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::StillImage,
            locator: locator.into(),
        }
    }

    /// Infer the source kind from a file extension (image or video).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let locator = path.to_string_lossy().into_owned();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::still(locator))
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::video(locator))
        } else {
            None
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.locator)
    }
}

/// Counters kept by every source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_delivered: u64,
    pub decode_failures: u64,
    pub locator: String,
}

/// An open capture session.
pub trait FrameSource {
    /// Next frame, `Ok(None)` at end of stream, `Err` when the frame could not
    /// be decoded. A decode error does not end the stream by itself.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn kind(&self) -> SourceKind;

    fn locator(&self) -> &str;

    fn stats(&self) -> SourceStats;
}

/// Opens capture sessions on behalf of the playback controller.
pub trait SourceOpener {
    fn open(&mut self, spec: &SourceSpec) -> Result<Box<dyn FrameSource>>;
}

impl<F> SourceOpener for F
where
    F: FnMut(&SourceSpec) -> Result<Box<dyn FrameSource>>,
{
    fn open(&mut self, spec: &SourceSpec) -> Result<Box<dyn FrameSource>> {
        self(spec)
    }
}

/// Production opener: dispatches on the spec kind to the concrete sources.
///
/// Clones share one `DeviceLocks` table, so a camera held by one clone is busy
/// for the others.
#[derive(Clone, Debug, Default)]
pub struct SourceFactory {
    camera: CameraConfig,
    locks: DeviceLocks,
}

impl SourceFactory {
    pub fn new(camera: CameraConfig) -> Self {
        Self {
            camera,
            locks: DeviceLocks::default(),
        }
    }

    pub fn locks(&self) -> &DeviceLocks {
        &self.locks
    }
}

impl SourceOpener for SourceFactory {
    fn open(&mut self, spec: &SourceSpec) -> Result<Box<dyn FrameSource>> {
        let source: Box<dyn FrameSource> = match spec.kind {
            SourceKind::Camera => {
                let config = CameraConfig {
                    device: spec.locator.clone(),
                    ..self.camera.clone()
                };
                Box::new(CameraSource::open(config, &self.locks)?)
            }
            SourceKind::VideoFile => Box::new(VideoFileSource::open(&spec.locator)?),
            SourceKind::StillImage => Box::new(StillImageSource::open(&spec.locator)?),
        };
        log::info!("opened {} session on {}", spec.kind, spec.locator);
        Ok(source)
    }
}

pub(crate) fn is_synthetic(locator: &str) -> bool {
    locator.starts_with(synthetic::STUB_SCHEME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_infers_kind_by_extension() {
        let image = SourceSpec::from_path(Path::new("shots/cat.JPG")).expect("image");
        assert_eq!(image.kind, SourceKind::StillImage);

        let video = SourceSpec::from_path(Path::new("clip.mov")).expect("video");
        assert_eq!(video.kind, SourceKind::VideoFile);

        assert!(SourceSpec::from_path(Path::new("notes.txt")).is_none());
        assert!(SourceSpec::from_path(Path::new("no_extension")).is_none());
    }

    #[test]
    fn factory_opens_synthetic_sources_of_each_kind() -> Result<()> {
        let mut factory = SourceFactory::default();

        let video = factory.open(&SourceSpec::video("stub://factory-video?frames=2"))?;
        assert_eq!(video.kind(), SourceKind::VideoFile);

        let still = factory.open(&SourceSpec::still("stub://factory-still"))?;
        assert_eq!(still.kind(), SourceKind::StillImage);

        let camera = factory.open(&SourceSpec::camera("stub://factory-camera"))?;
        assert_eq!(camera.kind(), SourceKind::Camera);
        assert_eq!(camera.locator(), "stub://factory-camera");
        assert!(factory.locks().is_held("factory-camera"));

        let mut clone = factory.clone();
        assert!(clone.open(&SourceSpec::camera("stub://factory-camera")).is_err());
        drop(camera);
        assert!(clone.open(&SourceSpec::camera("stub://factory-camera")).is_ok());
        Ok(())
    }

    #[test]
    fn closures_act_as_openers() -> Result<()> {
        let mut opener = |spec: &SourceSpec| -> Result<Box<dyn FrameSource>> {
            Ok(Box::new(SyntheticSource::open(spec.kind, &spec.locator)?))
        };
        let mut source = opener.open(&SourceSpec::video("stub://closure?frames=1"))?;
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        Ok(())
    }
}
