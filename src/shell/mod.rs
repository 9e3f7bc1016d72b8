//! User-facing shell: the four actions, and the egui window behind the `gui`
//! feature.

mod actions;
#[cfg(feature = "gui")]
mod app;

pub use actions::{apply_action, ShellAction};
#[cfg(feature = "gui")]
pub use app::{run_window, ViewerApp};

/// Window title shown by the GUI.
pub const WINDOW_TITLE: &str = "YOLOv8 Object Detection";
