//! Local video file source.
//!
//! `VideoFileSource` decodes a local container (MP4, AVI, MOV, ...) frame by
//! frame. Decoding happens in-memory; nothing is written back to disk. Remote
//! URLs are refused. `stub://` paths produce synthetic clips for tests.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::synthetic::SyntheticSource;
use super::{is_synthetic, FrameSource, SourceKind, SourceStats};
use crate::frame::Frame;

/// Open video decoding session.
pub struct VideoFileSource {
    path: String,
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl VideoFileSource {
    pub fn open(path: &str) -> Result<Self> {
        if !is_local_file_path(path) {
            return Err(anyhow!(
                "video playback only supports local paths (no URL schemes)"
            ));
        }
        if is_synthetic(path) {
            return Ok(Self {
                path: path.to_string(),
                backend: FileBackend::Synthetic(SyntheticSource::open(
                    SourceKind::VideoFile,
                    path,
                )?),
            });
        }

        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                path: path.to_string(),
                backend: FileBackend::Ffmpeg(FfmpegFileSource::open(path)?),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "video playback requires the ingest-file-ffmpeg feature"
            ))
        }
    }
}

impl FrameSource for VideoFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::VideoFile
    }

    fn locator(&self) -> &str {
        &self.path
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

pub(crate) fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if is_synthetic(path) {
        return true;
    }
    !path.contains("://")
}
