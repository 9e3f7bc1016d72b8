//! Still image source.
//!
//! The image is decoded when the session opens, so a missing or corrupt file is
//! reported as an unavailable source. The session then yields that one frame
//! and ends.

use anyhow::{Context, Result};

use super::synthetic::SyntheticSource;
use super::{is_synthetic, FrameSource, SourceKind, SourceStats};
use crate::frame::Frame;

pub struct StillImageSource {
    path: String,
    pending: Pending,
    stats: SourceStats,
}

enum Pending {
    Decoded(Option<Frame>),
    Synthetic(SyntheticSource),
}

impl StillImageSource {
    pub fn open(path: &str) -> Result<Self> {
        let pending = if is_synthetic(path) {
            Pending::Synthetic(SyntheticSource::open(SourceKind::StillImage, path)?)
        } else {
            let image = image::open(path)
                .with_context(|| format!("failed to read image {}", path))?
                .to_rgb8();
            log::info!("image {} loaded ({}x{})", path, image.width(), image.height());
            Pending::Decoded(Some(Frame::from_rgb_image(image)?.with_sequence(1)))
        };

        Ok(Self {
            path: path.to_string(),
            pending,
            stats: SourceStats {
                locator: path.to_string(),
                ..SourceStats::default()
            },
        })
    }
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.pending {
            Pending::Decoded(frame) => {
                let frame = frame.take();
                if frame.is_some() {
                    self.stats.frames_delivered += 1;
                }
                Ok(frame)
            }
            Pending::Synthetic(source) => source.next_frame(),
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::StillImage
    }

    fn locator(&self) -> &str {
        &self.path
    }

    fn stats(&self) -> SourceStats {
        match &self.pending {
            Pending::Decoded(_) => self.stats.clone(),
            Pending::Synthetic(source) => source.stats(),
        }
    }
}
