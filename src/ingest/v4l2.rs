//! V4L2 camera backend.
//!
//! Opens a local device node, asks for packed RGB and falls back to YUYV when
//! the driver refuses. Buffers are memory-mapped; the device and its stream are
//! released together when the camera is dropped.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::camera::CameraConfig;
use super::normalize::{normalize_to_rgb, PixelFormat};
use super::SourceStats;
use crate::frame::Frame;

pub(crate) struct DeviceCamera {
    device_path: String,
    state: DeviceState,
    format: PixelFormat,
    width: u32,
    height: u32,
    stats: SourceStats,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl DeviceCamera {
    pub(crate) fn open(config: CameraConfig, device_path: String) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&device_path)
            .with_context(|| format!("open v4l2 device {}", device_path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "camera {}: RGB3 rejected ({}), keeping driver format",
                    device_path,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        let pixel_format = if format.fourcc == v4l::FourCC::new(b"RGB3") {
            PixelFormat::Rgb24
        } else if format.fourcc == v4l::FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else {
            return Err(anyhow!(
                "camera {} delivers unsupported pixel format {}",
                device_path,
                format.fourcc
            ));
        };

        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("camera {}: failed to set fps: {}", device_path, err);
            }
        }

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "camera {} opened ({}x{}, {:?})",
            device_path,
            format.width,
            format.height,
            pixel_format
        );
        Ok(Self {
            stats: SourceStats {
                locator: device_path.clone(),
                ..SourceStats::default()
            },
            device_path,
            state,
            format: pixel_format,
            width: format.width,
            height: format.height,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let format = self.format;
        let (width, height) = (self.width, self.height);
        let decoded = self.state.with_mut(|fields| -> Result<Vec<u8>> {
            let (buf, meta) = fields
                .stream
                .next()
                .map_err(|err| anyhow::Error::new(err).context("capture v4l2 frame"))?;
            let used = (meta.bytesused as usize).min(buf.len());
            let used = if used == 0 { buf.len() } else { used };
            normalize_to_rgb(&buf[..used], width, height, format)
        });

        let pixels = match decoded {
            Ok(pixels) => pixels,
            Err(err) => {
                self.stats.decode_failures += 1;
                return Err(err);
            }
        };

        self.stats.frames_delivered += 1;
        let frame = Frame::rgb(pixels, width, height)?.with_sequence(self.stats.frames_delivered);
        Ok(Some(frame))
    }

    pub(crate) fn stats(&self) -> SourceStats {
        self.stats.clone()
    }
}

impl Drop for DeviceCamera {
    fn drop(&mut self) {
        log::info!("camera {} released", self.device_path);
    }
}
