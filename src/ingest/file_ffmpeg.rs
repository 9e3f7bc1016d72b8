//! FFmpeg-backed video decoding.
//!
//! Packets from the best video stream are decoded and scaled to RGB24 one frame
//! at a time. At end of input the decoder is drained before the source reports
//! end of stream.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::SourceStats;
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    decoded: ffmpeg::frame::Video,
    rgb_frame: ffmpeg::frame::Video,
    eof_sent: bool,
    stats: SourceStats,
}

impl FfmpegFileSource {
    pub(crate) fn open(path: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open video '{}' with ffmpeg", path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "video {} opened ({}x{})",
            path,
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            decoded: ffmpeg::frame::Video::empty(),
            rgb_frame: ffmpeg::frame::Video::empty(),
            eof_sent: false,
            stats: SourceStats {
                locator: path.to_string(),
                ..SourceStats::default()
            },
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.decode_next() {
            Ok(frame) => Ok(frame),
            Err(err) => {
                self.stats.decode_failures += 1;
                Err(err)
            }
        }
    }

    pub(crate) fn stats(&self) -> SourceStats {
        self.stats.clone()
    }

    fn decode_next(&mut self) -> Result<Option<Frame>> {
        if self.decoder.receive_frame(&mut self.decoded).is_ok() {
            return self.emit().map(Some);
        }

        if !self.eof_sent {
            let mut received = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                if self.decoder.receive_frame(&mut self.decoded).is_ok() {
                    received = true;
                    break;
                }
            }
            if received {
                return self.emit().map(Some);
            }
            self.decoder.send_eof().context("flush ffmpeg decoder")?;
            self.eof_sent = true;
        }

        if self.decoder.receive_frame(&mut self.decoded).is_ok() {
            return self.emit().map(Some);
        }
        Ok(None)
    }

    fn emit(&mut self) -> Result<Frame> {
        self.scaler
            .run(&self.decoded, &mut self.rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&self.rgb_frame)?;
        self.stats.frames_delivered += 1;
        Ok(Frame::rgb(pixels, width, height)?.with_sequence(self.stats.frames_delivered))
    }
}

impl Drop for FfmpegFileSource {
    fn drop(&mut self) {
        log::info!("video {} released", self.stats.locator);
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let pixels = data
            .get(..len)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((pixels.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(
            data.get(start..start + row_bytes)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
