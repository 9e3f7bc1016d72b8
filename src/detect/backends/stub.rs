use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Stub backend for tests and demos.
///
/// Reports one "person" box over the centre half of every frame unless a fixed
/// detection list was supplied.
#[derive(Default)]
pub struct StubBackend {
    fixed: Option<Vec<Detection>>,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return exactly `detections` for every frame.
    pub fn with_detections(detections: Vec<Detection>) -> Self {
        Self {
            fixed: Some(detections),
            calls: 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.calls += 1;
        if let Some(fixed) = &self.fixed {
            return Ok(fixed.clone());
        }
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        Ok(vec![Detection {
            x1: w * 0.25,
            y1: h * 0.25,
            x2: w * 0.75,
            y2: h * 0.75,
            confidence: 0.9,
            class_id: 0,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_boxes_the_centre() -> Result<()> {
        let frame = Frame::bgr(vec![0u8; 8 * 4 * 3], 8, 4)?;
        let mut backend = StubBackend::new();

        let detections = backend.detect(&frame)?;
        assert_eq!(detections.len(), 1);
        let d = detections[0];
        assert_eq!((d.x1, d.y1, d.x2, d.y2), (2.0, 1.0, 6.0, 3.0));
        assert_eq!(d.label(), "person");
        assert_eq!(backend.calls(), 1);
        Ok(())
    }

    #[test]
    fn fixed_detections_are_repeated() -> Result<()> {
        let frame = Frame::rgb(vec![0u8; 3], 1, 1)?;
        let mut backend = StubBackend::with_detections(Vec::new());
        assert!(backend.detect(&frame)?.is_empty());
        assert!(backend.detect(&frame)?.is_empty());
        assert_eq!(backend.calls(), 2);
        Ok(())
    }
}
