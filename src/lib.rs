//! Detection viewer.
//!
//! Opens one input at a time (webcam, video file or still image), runs an
//! object detector on every frame, paints the boxes and hands the result to a
//! display surface.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (cameras, video files, still images, `stub://`)
//! - `detect`: detector backends, NMS and the box overlay
//! - `render`: channel reorder and stretch to the display size
//! - `playback`: the Idle/Running controller driven by a fixed tick
//! - `shell`: user actions and the egui window (feature `gui`)
//! - `config`: file and environment configuration

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod playback;
pub mod render;
pub mod shell;

pub use config::ViewerConfig;
pub use detect::{load_backend, Detection, Detector, DetectorBackend, ModelConfig};
pub use error::ViewerError;
pub use frame::{ChannelOrder, Frame};
pub use ingest::{FrameSource, SourceFactory, SourceKind, SourceOpener, SourceSpec};
pub use playback::{
    DisplaySink, PlaybackConfig, PlaybackController, PlaybackState, ReadFailurePolicy,
    TickOutcome,
};
pub use render::{adapt, DisplayImage, DisplaySize};
