//! Camera frame source.
//!
//! `CameraSource` owns one open camera. Device locators are either a bare index
//! (`0` means `/dev/video0`) or a device path; `stub://` locators produce
//! synthetic frames. Real devices need the `ingest-v4l2` feature.

use anyhow::Result;

use super::synthetic::{DeviceLocks, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
use super::v4l2::DeviceCamera;
use super::{is_synthetic, FrameSource, SourceKind, SourceStats};
use crate::frame::Frame;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device index, device path (e.g. "/dev/video0") or `stub://` locator.
    pub device: String,
    /// Requested capture rate. The device may ignore it.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "0".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

/// Open camera session. Dropping it releases the device.
pub struct CameraSource {
    locator: String,
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    /// Synthetic cameras claim their name in `locks`; real device nodes are
    /// exclusive at the driver level.
    pub fn open(config: CameraConfig, locks: &DeviceLocks) -> Result<Self> {
        let locator = config.device.clone();
        if is_synthetic(&config.device) {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticSource::open_exclusive(
                    SourceKind::Camera,
                    &config.device,
                    locks,
                )?),
                locator,
            });
        }

        #[cfg(feature = "ingest-v4l2")]
        {
            let device_path = resolve_device_path(&config.device);
            Ok(Self {
                backend: CameraBackend::Device(DeviceCamera::open(config, device_path)?),
                locator,
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(anyhow::anyhow!(
                "camera {} requires the ingest-v4l2 feature",
                resolve_device_path(&config.device)
            ))
        }
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Camera
    }

    fn locator(&self) -> &str {
        &self.locator
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

/// Map a bare camera index to its device node; anything else is used as-is.
pub fn resolve_device_path(device: &str) -> String {
    let trimmed = device.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("/dev/video{}", trimmed)
    } else {
        trimmed.to_string()
    }
}
