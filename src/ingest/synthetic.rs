//! Synthetic `stub://` sources.
//!
//! Locator grammar: `stub://<name>?frames=N&fail_at=a,b&width=W&height=H`.
//!
//! - `frames`: number of frame indices before end of stream. Cameras default to
//!   unbounded, videos to 30, still images to 1.
//! - `fail_at`: 1-based frame indices that fail to decode. A failed index is
//!   consumed, so `frames=10&fail_at=5` delivers 9 frames.
//! - `width`/`height`: frame size, 640x480 by default.
//!
//! Frames are BGR, matching what a camera library hands out. Cameras opened
//! through `open_exclusive` behave like a real device node: a second open of
//! the same name on the same `DeviceLocks` fails until the first is dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};

use super::{FrameSource, SourceKind, SourceStats};
use crate::frame::Frame;

pub(crate) const STUB_SCHEME: &str = "stub://";

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_VIDEO_FRAMES: u64 = 30;

/// Parsed `stub://` locator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticOptions {
    pub name: String,
    pub frames: Option<u64>,
    pub fail_at: Vec<u64>,
    pub width: u32,
    pub height: u32,
}

impl SyntheticOptions {
    pub fn parse(locator: &str, kind: SourceKind) -> Result<Self> {
        let rest = locator
            .strip_prefix(STUB_SCHEME)
            .ok_or_else(|| anyhow!("not a synthetic locator: {}", locator))?;
        let (name, query) = match rest.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (rest, None),
        };
        if name.trim().is_empty() {
            bail!("synthetic locator {} has no name", locator);
        }

        let mut options = Self {
            name: name.to_string(),
            frames: match kind {
                SourceKind::Camera => None,
                SourceKind::VideoFile => Some(DEFAULT_VIDEO_FRAMES),
                SourceKind::StillImage => Some(1),
            },
            fail_at: Vec::new(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        };

        for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed synthetic parameter '{}'", pair))?;
            match key {
                "frames" => options.frames = Some(parse_number(key, value)?),
                "fail_at" => {
                    options.fail_at = value
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(|v| parse_number(key, v))
                        .collect::<Result<Vec<_>>>()?;
                }
                "width" => options.width = parse_dimension(key, value)?,
                "height" => options.height = parse_dimension(key, value)?,
                other => bail!("unknown synthetic parameter '{}'", other),
            }
        }

        Ok(options)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| anyhow!("synthetic parameter {} must be an integer, got '{}'", key, value))
}

fn parse_dimension(key: &str, value: &str) -> Result<u32> {
    let parsed = parse_number(key, value)?;
    if parsed == 0 || parsed > u32::MAX as u64 {
        bail!("synthetic parameter {} out of range: {}", key, parsed);
    }
    Ok(parsed as u32)
}

/// Set of synthetic device names currently held open.
///
/// Clones share the same set; a `SourceFactory` owns one for its sessions.
#[derive(Clone, Debug, Default)]
pub struct DeviceLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl DeviceLocks {
    fn acquire(&self, name: &str) -> Result<DeviceLease> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| anyhow!("device lock table poisoned"))?;
        if !held.insert(name.to_string()) {
            bail!("camera {} is busy", name);
        }
        Ok(DeviceLease {
            locks: self.clone(),
            name: name.to_string(),
        })
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(name))
            .unwrap_or(false)
    }
}

/// Released when dropped.
struct DeviceLease {
    locks: DeviceLocks,
    name: String,
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        if let Ok(mut held) = self.locks.held.lock() {
            held.remove(&self.name);
        }
    }
}

/// Generated frame sequence standing in for a device, decoder or image file.
pub struct SyntheticSource {
    kind: SourceKind,
    locator: String,
    options: SyntheticOptions,
    consumed: u64,
    stats: SourceStats,
    _lease: Option<DeviceLease>,
}

impl SyntheticSource {
    /// Open without claiming the device name.
    pub fn open(kind: SourceKind, locator: &str) -> Result<Self> {
        Self::open_with(kind, locator, None)
    }

    /// Open and hold the device name in `locks` until the source is dropped.
    pub fn open_exclusive(kind: SourceKind, locator: &str, locks: &DeviceLocks) -> Result<Self> {
        Self::open_with(kind, locator, Some(locks))
    }

    fn open_with(kind: SourceKind, locator: &str, locks: Option<&DeviceLocks>) -> Result<Self> {
        let options = SyntheticOptions::parse(locator, kind)?;
        let lease = match locks {
            Some(locks) => Some(locks.acquire(&options.name)?),
            None => None,
        };

        log::debug!("SyntheticSource: opened {} ({})", locator, kind);
        Ok(Self {
            kind,
            locator: locator.to_string(),
            options,
            consumed: 0,
            stats: SourceStats {
                locator: locator.to_string(),
                ..SourceStats::default()
            },
            _lease: lease,
        })
    }

    pub fn options(&self) -> &SyntheticOptions {
        &self.options
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let pixel_count = (self.options.width as usize) * (self.options.height as usize) * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.consumed) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(limit) = self.options.frames {
            if self.consumed >= limit {
                return Ok(None);
            }
        }
        self.consumed += 1;

        if self.options.fail_at.contains(&self.consumed) {
            self.stats.decode_failures += 1;
            bail!("corrupt synthetic frame {}", self.consumed);
        }

        let pixels = self.generate_pixels();
        let frame = Frame::bgr(pixels, self.options.width, self.options.height)?
            .with_sequence(self.consumed);
        self.stats.frames_delivered += 1;
        Ok(Some(frame))
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn locator(&self) -> &str {
        &self.locator
    }

    fn stats(&self) -> SourceStats {
        self.stats.clone()
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        log::debug!("SyntheticSource: released {}", self.locator);
    }
}
