mod backend;
mod backends;
mod detector;
pub mod labels;
mod overlay;
mod result;

pub use backend::{BackendKind, DetectorBackend};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use detector::{load_backend, Detector, ModelConfig};
pub use overlay::{class_color, Overlay};
pub use result::{non_max_suppression, Detection};
