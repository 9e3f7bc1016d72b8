use ab_glyph::{FontRef, PxScale};
use anyhow::{anyhow, Result};
use epaint_default_fonts::HACK_REGULAR;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detect::result::Detection;
use crate::frame::{ChannelOrder, Frame};

/// Per-class box colours (RGB), cycled by class id.
const PALETTE: [[u8; 3]; 20] = [
    [0xFF, 0x38, 0x38],
    [0xFF, 0x9D, 0x97],
    [0xFF, 0x70, 0x1F],
    [0xFF, 0xB2, 0x1D],
    [0xCF, 0xD2, 0x31],
    [0x48, 0xF9, 0x0A],
    [0x92, 0xCC, 0x17],
    [0x3D, 0xDB, 0x86],
    [0x1A, 0x93, 0x34],
    [0x00, 0xD4, 0xBB],
    [0x2C, 0x99, 0xA8],
    [0x00, 0xC2, 0xFF],
    [0x34, 0x45, 0x93],
    [0x64, 0x73, 0xFF],
    [0x00, 0x18, 0xEC],
    [0x84, 0x38, 0xFF],
    [0x52, 0x00, 0x85],
    [0xCB, 0x38, 0xFF],
    [0xFF, 0x95, 0xC8],
    [0xFF, 0x37, 0xC7],
];

/// Height of the tab when no font is available.
const TAB_HEIGHT: u32 = 6;
/// Label glyph height in pixels.
const LABEL_SCALE: f32 = 12.0;
const LABEL_PADDING: u32 = 2;
const LABEL_COLOR: Rgb<u8> = Rgb([0xFF, 0xFF, 0xFF]);

pub fn class_color(class_id: usize) -> [u8; 3] {
    PALETTE[class_id % PALETTE.len()]
}

/// Paints detection boxes and their `label confidence` tabs onto frame pixels.
#[derive(Clone)]
pub struct Overlay {
    thickness: u32,
    font: Option<FontRef<'static>>,
}

impl Default for Overlay {
    fn default() -> Self {
        let font = match FontRef::try_from_slice(HACK_REGULAR) {
            Ok(font) => Some(font),
            Err(err) => {
                log::warn!("overlay font unavailable, labels disabled: {}", err);
                None
            }
        };
        Self { thickness: 2, font }
    }
}

impl Overlay {
    /// Draw every detection onto a 3-channel frame, in the frame's channel order.
    pub fn paint(&self, frame: Frame, detections: &[Detection]) -> Result<Frame> {
        if detections.is_empty() {
            return Ok(frame);
        }
        if frame.channels() != 3 {
            return Err(anyhow!(
                "cannot paint overlay on a {}-channel frame",
                frame.channels()
            ));
        }

        let (width, height, order, sequence) =
            (frame.width(), frame.height(), frame.order, frame.sequence);
        let mut canvas = RgbImage::from_raw(width, height, frame.into_data())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;

        for detection in detections {
            let mut color = class_color(detection.class_id);
            if order == ChannelOrder::Bgr {
                color.swap(0, 2);
            }
            self.draw_box(&mut canvas, detection, Rgb(color));
        }

        Ok(Frame::new(canvas.into_raw(), width, height, 3, order)?.with_sequence(sequence))
    }

    fn draw_box(&self, canvas: &mut RgbImage, detection: &Detection, color: Rgb<u8>) {
        let max_x = canvas.width() as f32;
        let max_y = canvas.height() as f32;
        let x1 = detection.x1.clamp(0.0, max_x) as i32;
        let y1 = detection.y1.clamp(0.0, max_y) as i32;
        let x2 = detection.x2.clamp(0.0, max_x) as i32;
        let y2 = detection.y2.clamp(0.0, max_y) as i32;

        for inset in 0..self.thickness as i32 {
            let w = x2 - x1 - 2 * inset;
            let h = y2 - y1 - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(canvas, rect, color);
        }

        self.draw_label(canvas, detection, x1, y1, color);
    }

    /// Solid tab sitting on the box's top edge, with the label text in white.
    fn draw_label(
        &self,
        canvas: &mut RgbImage,
        detection: &Detection,
        x1: i32,
        y1: i32,
        color: Rgb<u8>,
    ) {
        let room = (canvas.width() as i32 - x1).max(1) as u32;
        let Some(font) = &self.font else {
            let tab_top = (y1 - TAB_HEIGHT as i32).max(0);
            draw_filled_rect_mut(
                canvas,
                Rect::at(x1, tab_top).of_size(room.min(48), TAB_HEIGHT),
                color,
            );
            return;
        };

        let text = format!("{} {:.2}", detection.label(), detection.confidence);
        let scale = PxScale::from(LABEL_SCALE);
        let (text_w, text_h) = text_size(scale, font, &text);
        let tab_w = (text_w + 2 * LABEL_PADDING).min(room);
        let tab_h = text_h.max(1) + 2 * LABEL_PADDING;
        let tab_top = (y1 - tab_h as i32).max(0);

        draw_filled_rect_mut(canvas, Rect::at(x1, tab_top).of_size(tab_w, tab_h), color);
        draw_text_mut(
            canvas,
            LABEL_COLOR,
            x1 + LABEL_PADDING as i32,
            tab_top + LABEL_PADDING as i32,
            scale,
            font,
            &text,
        );
    }
}
