use std::path::PathBuf;

use thiserror::Error;

/// Failure classes surfaced by the viewer.
///
/// Component code returns `anyhow::Result`; the playback controller maps each
/// pipeline stage's failure into one of these so the shell can show a status
/// line and tests can match on the class.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ViewerError {
    #[error("source {locator} unavailable: {reason}")]
    SourceUnavailable { locator: String, reason: String },

    #[error("failed to decode frame {frame}: {reason}")]
    Decode { frame: u64, reason: String },

    #[error("inference failed on frame {frame}: {reason}")]
    Inference { frame: u64, reason: String },

    #[error("unsupported frame format: {channels} channels (expected 3)")]
    UnsupportedFormat { channels: u8 },

    #[error("failed to render frame {frame}: {reason}")]
    Render { frame: u64, reason: String },

    #[error("failed to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ViewerError {
    /// Flatten an `anyhow` chain into the single-line reason used in status text.
    pub(crate) fn reason(err: &anyhow::Error) -> String {
        format!("{err:#}")
    }
}
