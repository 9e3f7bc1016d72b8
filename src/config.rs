use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{BackendKind, ModelConfig};
use crate::error::ViewerError;
use crate::ingest::CameraConfig;
use crate::playback::{PlaybackConfig, ReadFailurePolicy, DEFAULT_TICK_INTERVAL};
use crate::render::DisplaySize;

pub const CONFIG_ENV: &str = "DETECT_VIEWER_CONFIG";
pub const MODEL_ENV: &str = "DETECT_VIEWER_MODEL";
pub const BACKEND_ENV: &str = "DETECT_VIEWER_BACKEND";
pub const TICK_MS_ENV: &str = "DETECT_VIEWER_TICK_MS";
pub const CAMERA_ENV: &str = "DETECT_VIEWER_CAMERA";

const DEFAULT_WINDOW_WIDTH: u32 = 1000;
const DEFAULT_WINDOW_HEIGHT: u32 = 800;
/// Largest accepted model input side. YOLOv8 exports top out well below this.
const MAX_INPUT_SIZE: u32 = 4096;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ViewerConfigFile {
    model: Option<ModelConfigFile>,
    playback: Option<PlaybackConfigFile>,
    display: Option<DisplayConfigFile>,
    camera: Option<CameraConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    backend: Option<String>,
    confidence: Option<f32>,
    iou: Option<f32>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PlaybackConfigFile {
    tick_ms: Option<u64>,
    on_read_failure: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DisplayConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    window_width: Option<u32>,
    window_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
}

/// Everything the binaries need at startup.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub model: ModelConfig,
    pub playback: PlaybackConfig,
    pub window: WindowSettings,
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            playback: PlaybackConfig::default(),
            window: WindowSettings {
                width: DEFAULT_WINDOW_WIDTH,
                height: DEFAULT_WINDOW_HEIGHT,
            },
            camera: CameraConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Load defaults, then the config file (`path`, else `DETECT_VIEWER_CONFIG`),
    /// then environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ViewerError> {
        let env_path = std::env::var(CONFIG_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Some(read_config_file(&path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Command-line flags win over file and environment.
    pub fn with_overrides(
        mut self,
        model: Option<PathBuf>,
        backend: Option<&str>,
    ) -> Result<Self, ViewerError> {
        if let Some(path) = model {
            self.model.path = path;
        }
        if let Some(name) = backend {
            self.model.backend = parse_backend(name)?;
        }
        Ok(self)
    }

    fn from_file(file: ViewerConfigFile) -> Result<Self, ViewerError> {
        let defaults = Self::default();

        let model_file = file.model.unwrap_or_default();
        let model = ModelConfig {
            path: model_file.path.unwrap_or(defaults.model.path),
            backend: match model_file.backend {
                Some(name) => parse_backend(&name)?,
                None => defaults.model.backend,
            },
            confidence: model_file.confidence.unwrap_or(defaults.model.confidence),
            iou: model_file.iou.unwrap_or(defaults.model.iou),
            input_size: model_file.input_size.unwrap_or(defaults.model.input_size),
        };

        let playback_file = file.playback.unwrap_or_default();
        let display_file = file.display.unwrap_or_default();
        let playback = PlaybackConfig {
            tick_interval: playback_file
                .tick_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TICK_INTERVAL),
            read_failure_policy: match playback_file.on_read_failure {
                Some(policy) => parse_policy(&policy)?,
                None => ReadFailurePolicy::default(),
            },
            // Zero is rejected by validate, so keep it raw here.
            display_size: DisplaySize {
                width: display_file
                    .width
                    .unwrap_or(defaults.playback.display_size.width),
                height: display_file
                    .height
                    .unwrap_or(defaults.playback.display_size.height),
            },
        };
        let window = WindowSettings {
            width: display_file.window_width.unwrap_or(defaults.window.width),
            height: display_file.window_height.unwrap_or(defaults.window.height),
        };

        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraConfig {
            device: camera_file.device.unwrap_or(defaults.camera.device),
            target_fps: camera_file.fps.unwrap_or(defaults.camera.target_fps),
            width: camera_file.width.unwrap_or(defaults.camera.width),
            height: camera_file.height.unwrap_or(defaults.camera.height),
        };

        Ok(Self {
            model,
            playback,
            window,
            camera,
        })
    }

    fn apply_env(&mut self) -> Result<(), ViewerError> {
        if let Some(path) = env_value(MODEL_ENV) {
            self.model.path = PathBuf::from(path);
        }
        if let Some(backend) = env_value(BACKEND_ENV) {
            self.model.backend = parse_backend(&backend)?;
        }
        if let Some(tick) = env_value(TICK_MS_ENV) {
            let millis: u64 = tick.trim().parse().map_err(|_| {
                ViewerError::Config(format!(
                    "{} must be an integer number of milliseconds",
                    TICK_MS_ENV
                ))
            })?;
            self.playback.tick_interval = Duration::from_millis(millis);
        }
        if let Some(device) = env_value(CAMERA_ENV) {
            self.camera.device = device;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ViewerError> {
        if self.playback.tick_interval.is_zero() {
            return Err(ViewerError::Config(
                "tick interval must be greater than zero".to_string(),
            ));
        }
        let display = self.playback.display_size;
        if display.width == 0 || display.height == 0 {
            return Err(ViewerError::Config(format!(
                "display size must be non-zero, got {}x{}",
                display.width, display.height
            )));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ViewerError::Config(
                "window size must be non-zero".to_string(),
            ));
        }
        for (name, value) in [
            ("confidence", self.model.confidence),
            ("iou", self.model.iou),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ViewerError::Config(format!(
                    "model {} must be within 0..=1, got {}",
                    name, value
                )));
            }
        }
        if self.model.input_size == 0 || self.model.input_size > MAX_INPUT_SIZE {
            return Err(ViewerError::Config(format!(
                "model input_size must be within 1..={}, got {}",
                MAX_INPUT_SIZE, self.model.input_size
            )));
        }
        if self.camera.device.trim().is_empty() {
            return Err(ViewerError::Config("camera device is empty".to_string()));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ViewerConfigFile, ViewerError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ViewerError::Config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    } else {
        toml::from_str(&raw).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| {
        ViewerError::Config(format!("invalid config file {}: {}", path.display(), e))
    })
}

fn parse_backend(value: &str) -> Result<BackendKind, ViewerError> {
    value
        .parse()
        .map_err(|err: anyhow::Error| ViewerError::Config(err.to_string()))
}

fn parse_policy(value: &str) -> Result<ReadFailurePolicy, ViewerError> {
    value
        .parse()
        .map_err(|err: anyhow::Error| ViewerError::Config(err.to_string()))
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
