//! Render adapter: annotated frame → image the display can blit.
//!
//! The display surface takes packed RGB888 at exactly the size of its image
//! area. Frames are stretched to fill that area; aspect ratio is not preserved.

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::RgbImage;

use crate::error::ViewerError;
use crate::frame::Frame;

/// Size of the display area in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl DisplaySize {
    /// Zero dimensions (a collapsed window) are clamped to 1.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }
}

impl Default for DisplaySize {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// Packed RGB888 image sized for the display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayImage {
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
    rgb: Vec<u8>,
}

impl DisplayImage {
    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }

    pub fn bytes_per_line(&self) -> usize {
        self.width as usize * 3
    }
}

/// Reorder channels to RGB and stretch the frame to `target`.
pub fn adapt(frame: &Frame, target: DisplaySize) -> Result<DisplayImage> {
    if frame.channels() != 3 {
        return Err(ViewerError::UnsupportedFormat {
            channels: frame.channels(),
        }
        .into());
    }

    let rgb = frame.to_rgb_bytes()?;
    let rgb = if (frame.width(), frame.height()) == (target.width, target.height) {
        rgb
    } else {
        let image = RgbImage::from_raw(frame.width(), frame.height(), rgb)
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        image::imageops::resize(&image, target.width, target.height, FilterType::Triangle)
            .into_raw()
    };

    Ok(DisplayImage {
        width: target.width,
        height: target.height,
        sequence: frame.sequence,
        rgb,
    })
}
