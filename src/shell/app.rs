//! egui window: image area, four buttons, status line.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Result};
use eframe::egui::{self, Color32, RichText, Stroke, TextureHandle, TextureOptions};

use crate::config::ViewerConfig;
use crate::detect::{labels, Detector};
use crate::ingest::{SourceFactory, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
use crate::playback::{DisplaySink, PlaybackController, PlaybackState};
use crate::render::{DisplayImage, DisplaySize};

use super::actions::{apply_action, ShellAction};
use super::WINDOW_TITLE;

const ACCENT: Color32 = Color32::from_rgb(0x1E, 0x88, 0xE5);
const BACKGROUND: Color32 = Color32::from_rgb(0x12, 0x12, 0x12);
const MIN_IMAGE_AREA: DisplaySize = DisplaySize {
    width: 800,
    height: 600,
};

/// Texture-backed display surface.
struct Screen {
    ctx: egui::Context,
    texture: Option<TextureHandle>,
}

impl DisplaySink for Screen {
    fn show(&mut self, image: DisplayImage) {
        let size = [image.width as usize, image.height as usize];
        let color = egui::ColorImage::from_rgb(size, image.rgb());
        match &mut self.texture {
            Some(texture) => texture.set(color, TextureOptions::LINEAR),
            None => {
                self.texture = Some(self.ctx.load_texture("display", color, TextureOptions::LINEAR))
            }
        }
    }

    fn clear(&mut self) {
        self.texture = None;
    }
}

pub struct ViewerApp {
    controller: PlaybackController<SourceFactory>,
    screen: Screen,
    webcam: String,
}

impl ViewerApp {
    fn new(ctx: egui::Context, controller: PlaybackController<SourceFactory>, webcam: String) -> Self {
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = BACKGROUND;
        visuals.window_fill = BACKGROUND;
        ctx.set_visuals(visuals);
        Self {
            controller,
            screen: Screen { ctx, texture: None },
            webcam,
        }
    }

    fn button(label: &str) -> egui::Button<'static> {
        egui::Button::new(RichText::new(label.to_string()).strong().color(Color32::WHITE))
            .fill(ACCENT)
            .rounding(8.0)
            .min_size(egui::vec2(160.0, 36.0))
    }

    fn pick(title: &str, filter: &str, extensions: &[&str]) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title(title)
            .add_filter(filter, extensions)
            .pick_file()
    }

    fn buttons(&mut self, ui: &mut egui::Ui) -> Option<ShellAction> {
        let mut action = None;
        ui.horizontal(|ui| {
            if ui.add(Self::button("Start Webcam")).clicked() {
                action = Some(ShellAction::StartWebcam);
            }
            if ui.add(Self::button("Stop")).clicked() {
                action = Some(ShellAction::Stop);
            }
            if ui.add(Self::button("Detect from Image")).clicked() {
                action = Self::pick("Select Image", "Images", IMAGE_EXTENSIONS)
                    .map(ShellAction::DetectImage);
            }
            if ui.add(Self::button("Detect from Video")).clicked() {
                action = Self::pick("Select Video", "Videos", VIDEO_EXTENSIONS)
                    .map(ShellAction::DetectVideo);
            }
        });
        action
    }

    fn status_text(&self) -> String {
        if let Some(status) = self.controller.status() {
            return status.to_string();
        }
        let detections = self.controller.detector().last_detections();
        let mut names: Vec<&str> = detections
            .iter()
            .map(|d| labels::class_name(d.class_id))
            .collect();
        names.sort_unstable();
        names.dedup();
        match (self.controller.state(), self.controller.current_source()) {
            (PlaybackState::Running, Some(spec)) => format!(
                "{}: {} objects [{}]",
                spec,
                detections.len(),
                names.join(", ")
            ),
            _ if self.screen.texture.is_some() => {
                format!("Idle: {} objects [{}]", detections.len(), names.join(", "))
            }
            _ => "Idle".to_string(),
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut action = None;
        egui::TopBottomPanel::bottom("controls")
            .frame(egui::Frame::none().fill(BACKGROUND).inner_margin(10.0))
            .show(ctx, |ui| {
                action = self.buttons(ui);
                ui.add_space(6.0);
                ui.label(RichText::new(self.status_text()).color(Color32::LIGHT_GRAY));
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_size();
            let area = DisplaySize::new(
                (available.x as u32).max(MIN_IMAGE_AREA.width),
                (available.y as u32).max(MIN_IMAGE_AREA.height),
            );
            self.controller.set_display_size(area);
            let size = egui::vec2(area.width as f32, area.height as f32);
            egui::Frame::none()
                .stroke(Stroke::new(2.0, ACCENT))
                .rounding(10.0)
                .show(ui, |ui| match &self.screen.texture {
                    Some(texture) => {
                        ui.image(egui::load::SizedTexture::new(texture.id(), size));
                    }
                    None => {
                        ui.allocate_space(size);
                    }
                });
        });

        if let Some(action) = action {
            if let Err(err) = apply_action(
                &mut self.controller,
                action,
                &self.webcam,
                Instant::now(),
                &mut self.screen,
            ) {
                log::warn!("action failed: {}", err);
            }
        }

        if let Some(outcome) = self.controller.poll(Instant::now(), &mut self.screen) {
            log::trace!("tick: {:?}", outcome);
        }
        if let Some(wait) = self.controller.time_until_next_tick(Instant::now()) {
            ctx.request_repaint_after(wait);
        }
    }
}

/// Open the main window and block until it is closed.
pub fn run_window(config: ViewerConfig, detector: Detector) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size([config.window.width as f32, config.window.height as f32])
            .with_min_inner_size([MIN_IMAGE_AREA.width as f32, MIN_IMAGE_AREA.height as f32]),
        ..Default::default()
    };
    let webcam = config.camera.device.clone();
    let controller =
        PlaybackController::new(SourceFactory::new(config.camera), detector, config.playback);

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |cc| {
            Ok(Box::new(ViewerApp::new(
                cc.egui_ctx.clone(),
                controller,
                webcam,
            )))
        }),
    )
    .map_err(|err| anyhow!("viewer window failed: {}", err))
}
