use std::path::PathBuf;

use anyhow::Result;

use crate::detect::backend::{BackendKind, DetectorBackend};
use crate::detect::backends::StubBackend;
use crate::detect::overlay::Overlay;
use crate::detect::result::Detection;
use crate::error::ViewerError;
use crate::frame::Frame;

/// Model settings used to build the detector at startup.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    /// Local weights file (ONNX export).
    pub path: PathBuf,
    pub backend: BackendKind,
    /// Minimum class score for a box to be kept.
    pub confidence: f32,
    /// NMS overlap threshold.
    pub iou: f32,
    /// Square model input side in pixels.
    pub input_size: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("yolov8n.onnx"),
            backend: BackendKind::preferred(),
            confidence: 0.25,
            iou: 0.7,
            input_size: 640,
        }
    }
}

/// Load the configured backend and warm it up.
///
/// Startup treats any failure here as fatal; there is no fallback model.
pub fn load_backend(config: &ModelConfig) -> Result<Box<dyn DetectorBackend>, ViewerError> {
    let model_error = |reason: String| ViewerError::ModelLoad {
        path: config.path.clone(),
        reason,
    };

    let mut backend: Box<dyn DetectorBackend> = match config.backend {
        BackendKind::Stub => Box::new(StubBackend::new()),
        #[cfg(feature = "backend-tract")]
        BackendKind::Tract => Box::new(
            crate::detect::backends::TractBackend::new(&config.path, config.input_size)
                .map_err(|err| model_error(ViewerError::reason(&err)))?
                .with_thresholds(config.confidence, config.iou),
        ),
        #[cfg(not(feature = "backend-tract"))]
        BackendKind::Tract => {
            return Err(model_error(
                "the tract backend requires the backend-tract feature".to_string(),
            ))
        }
    };

    backend
        .warm_up()
        .map_err(|err| model_error(ViewerError::reason(&err)))?;
    log::info!(
        "detector ready: backend={} model={}",
        backend.name(),
        config.path.display()
    );
    Ok(backend)
}

/// Frame-in, annotated-frame-out wrapper around one backend.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
    overlay: Overlay,
    last: Vec<Detection>,
}

impl Detector {
    pub fn new(backend: Box<dyn DetectorBackend>) -> Self {
        Self {
            backend,
            overlay: Overlay::default(),
            last: Vec::new(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Detections from the most recent successful `infer`.
    pub fn last_detections(&self) -> &[Detection] {
        &self.last
    }

    /// Run the backend and paint its boxes onto the frame.
    ///
    /// Frames the overlay cannot paint (not 3 channels) pass through unpainted;
    /// the render stage owns the format check.
    pub fn infer(&mut self, frame: Frame) -> Result<Frame> {
        let detections = self.backend.detect(&frame)?;
        log::trace!(
            "frame {}: {} detections",
            frame.sequence,
            detections.len()
        );
        let frame = if frame.channels() == 3 {
            self.overlay.paint(frame, &detections)?
        } else {
            frame
        };
        self.last = detections;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ChannelOrder;
    use anyhow::anyhow;

    struct FailingBackend;

    impl DetectorBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
            Err(anyhow!("malformed input"))
        }
    }

    #[test]
    fn infer_paints_and_remembers_detections() -> Result<()> {
        let mut detector = Detector::new(Box::new(StubBackend::new()));
        let frame = Frame::bgr(vec![0u8; 16 * 16 * 3], 16, 16)?.with_sequence(4);

        let annotated = detector.infer(frame)?;
        assert_eq!(annotated.sequence, 4);
        assert_eq!((annotated.width(), annotated.height()), (16, 16));
        assert!(annotated.data().iter().any(|&b| b != 0));
        assert_eq!(detector.last_detections().len(), 1);
        Ok(())
    }

    #[test]
    fn backend_failure_propagates() -> Result<()> {
        let mut detector = Detector::new(Box::new(FailingBackend));
        let frame = Frame::rgb(vec![0u8; 3], 1, 1)?;
        assert!(detector.infer(frame).is_err());
        assert!(detector.last_detections().is_empty());
        Ok(())
    }

    #[test]
    fn four_channel_frames_pass_through() -> Result<()> {
        let mut detector = Detector::new(Box::new(StubBackend::new()));
        let frame = Frame::new(vec![9u8; 4 * 4 * 4], 4, 4, 4, ChannelOrder::Rgb)?;
        let out = detector.infer(frame)?;
        assert_eq!(out.channels(), 4);
        assert!(out.data().iter().all(|&b| b == 9));
        Ok(())
    }

    #[test]
    fn stub_backend_loads_without_model_file() {
        let config = ModelConfig {
            path: PathBuf::from("/nonexistent/model.onnx"),
            backend: BackendKind::Stub,
            ..ModelConfig::default()
        };
        assert!(load_backend(&config).is_ok());
    }

    #[test]
    fn tract_backend_fails_on_missing_model() {
        let config = ModelConfig {
            path: PathBuf::from("/nonexistent/model.onnx"),
            backend: BackendKind::Tract,
            ..ModelConfig::default()
        };
        match load_backend(&config) {
            Err(ViewerError::ModelLoad { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/model.onnx"))
            }
            other => panic!("expected ModelLoad error, got {:?}", other.map(|b| b.name())),
        }
    }
}
