use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Available detector backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// Deterministic detections, no model file.
    Stub,
    /// YOLOv8 ONNX model through tract (feature: backend-tract).
    Tract,
}

impl BackendKind {
    /// Tract when compiled in, stub otherwise.
    pub fn preferred() -> Self {
        if cfg!(feature = "backend-tract") {
            BackendKind::Tract
        } else {
            BackendKind::Stub
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(BackendKind::Stub),
            "tract" => Ok(BackendKind::Tract),
            other => Err(anyhow!("unknown detector backend '{}'", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Stub => write!(f, "stub"),
            BackendKind::Tract => write!(f, "tract"),
        }
    }
}

/// Detector backend trait.
///
/// Backends see the frame read-only and return boxes in the frame's pixel
/// coordinates. Painting the boxes is the caller's job.
pub trait DetectorBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once after loading.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_parse_case_insensitively() -> Result<()> {
        assert_eq!("Stub".parse::<BackendKind>()?, BackendKind::Stub);
        assert_eq!(" tract ".parse::<BackendKind>()?, BackendKind::Tract);
        assert!("onnxruntime".parse::<BackendKind>().is_err());
        Ok(())
    }
}
