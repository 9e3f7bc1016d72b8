//! Frame container shared by every pipeline stage.
//!
//! - `Frame`: one decoded raster image with its channel order. Pixel bytes are
//!   private; stages borrow them through accessors and validate dimensions once
//!   at construction.
//! - `ChannelOrder`: BGR (what camera libraries hand out) or RGB (what decoders
//!   and the display surface use).

use anyhow::{anyhow, Result};
use image::RgbImage;

/// Byte order of the three colour channels in a packed pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelOrder {
    Bgr,
    Rgb,
}

/// A single packed, row-major raster image.
///
/// Only one frame travels through the pipeline at a time; nothing keeps
/// history, so frames are moved between stages rather than cloned.
#[derive(Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    pub order: ChannelOrder,
    /// 1-based position of the frame within its capture session.
    pub sequence: u64,
}

impl Frame {
    /// Build a frame, checking that the buffer matches `width * height * channels`.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
        order: ChannelOrder,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame has zero dimension ({}x{})", width, height));
        }
        if channels == 0 {
            return Err(anyhow!("frame has zero channels"));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(channels as usize))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
            order,
            sequence: 0,
        })
    }

    pub fn bgr(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        Self::new(data, width, height, 3, ChannelOrder::Bgr)
    }

    pub fn rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        Self::new(data, width, height, 3, ChannelOrder::Rgb)
    }

    pub fn from_rgb_image(image: RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::rgb(image.into_raw(), width, height)
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per pixel; checked against the buffer length at construction.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Copy of the pixels in RGB order. Fails for anything but 3 channels.
    pub fn to_rgb_bytes(&self) -> Result<Vec<u8>> {
        if self.channels != 3 {
            return Err(anyhow!(
                "expected 3 channels, frame has {}",
                self.channels
            ));
        }
        let mut rgb = self.data.clone();
        if self.order == ChannelOrder::Bgr {
            swap_red_blue(&mut rgb);
        }
        Ok(rgb)
    }
}

/// Swap the first and third byte of every packed 3-byte pixel in place.
pub(crate) fn swap_red_blue(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
}
