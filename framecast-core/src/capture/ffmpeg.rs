//! FFmpeg capture backend
//!
//! Opens RTSP (and any other FFmpeg-readable) sources, decodes the best
//! video stream and converts each decoded picture to packed RGB24.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;
use ffmpeg_next::format::{self, Pixel};
use ffmpeg_next::media::Type;
use ffmpeg_next::software::scaling::{self, Flags};
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::{Dictionary, Packet};
use tracing::{debug, info, trace};

use super::{CaptureBackend, FrameSource};
use crate::config::CaptureOptions;
use crate::error::{FramecastError, Result};
use crate::types::FrameBuffer;

/// Capture backend built on libavformat/libavcodec
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    options: CaptureOptions,
}

impl FfmpegBackend {
    /// Create a backend, initializing FFmpeg
    pub fn new(options: CaptureOptions) -> Result<Self> {
        ffmpeg::init()
            .map_err(|e| FramecastError::config(format!("FFmpeg init failed: {}", e)))?;
        Ok(Self { options })
    }

    /// Demuxer options for a source
    fn input_options(&self, source: &str) -> Dictionary<'static> {
        let timeout_us = self.options.open_timeout.as_micros().to_string();
        let mut opts = Dictionary::new();
        if is_rtsp(source) {
            opts.set("rtsp_transport", self.options.rtsp_transport.as_ffmpeg_option());
            opts.set("timeout", &timeout_us);
        }
        opts.set("rw_timeout", &timeout_us);
        opts
    }
}

impl CaptureBackend for FfmpegBackend {
    fn open(&self, source: &str) -> Result<Box<dyn FrameSource>> {
        debug!("Opening {} ({})", source, self.options.rtsp_transport);

        let input = format::input_with_dictionary(source, self.input_options(source))
            .map_err(|e| FramecastError::stream_open(source, e.to_string()))?;

        let (stream_index, decoder) = {
            let stream = input
                .streams()
                .best(Type::Video)
                .ok_or_else(|| FramecastError::stream_open(source, "no video stream"))?;

            let context = codec::context::Context::from_parameters(stream.parameters())
                .map_err(|e| FramecastError::stream_open(source, format!("bad codec parameters: {}", e)))?;
            let decoder = context
                .decoder()
                .video()
                .map_err(|e| FramecastError::stream_open(source, format!("no decoder: {}", e)))?;

            (stream.index(), decoder)
        };

        info!(
            "Opened {}: {:?} {}x{}",
            source,
            decoder.id(),
            decoder.width(),
            decoder.height()
        );

        Ok(Box::new(FfmpegSource {
            input,
            decoder,
            stream_index,
            scaler: None,
            draining: false,
        }))
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Scaler cache key: source format and size
type ScalerKey = (Pixel, u32, u32);

/// An open FFmpeg input with its video decoder
pub struct FfmpegSource {
    input: format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    scaler: Option<(ScalerKey, scaling::Context)>,
    draining: bool,
}

impl FfmpegSource {
    /// Push the next video packet into the decoder
    fn feed(&mut self) -> Result<()> {
        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) if packet.stream() == self.stream_index => {
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        trace!("Decoder rejected packet: {}", e);
                    }
                    return Ok(());
                }
                Ok(()) => continue,
                Err(ffmpeg::Error::Eof) => {
                    debug!("Upstream reached end of input, draining decoder");
                    self.draining = true;
                    self.decoder.send_eof().ok();
                    return Ok(());
                }
                Err(e) => {
                    debug!("Upstream read failed: {}", e);
                    return Err(FramecastError::EndOfStream);
                }
            }
        }
    }

    /// Convert a decoded picture to packed RGB24
    fn to_rgb(&mut self, decoded: &Video) -> Result<FrameBuffer> {
        let key = (decoded.format(), decoded.width(), decoded.height());
        let (_, width, height) = key;

        if self.scaler.as_ref().is_none_or(|(k, _)| *k != key) {
            debug!("Creating scaler: {:?} {}x{} -> RGB24", key.0, width, height);
            let context = scaling::Context::get(key.0, width, height, Pixel::RGB24, width, height, Flags::BILINEAR)
                .map_err(|e| FramecastError::encode(format!("Failed to create scaler: {}", e)))?;
            self.scaler = Some((key, context));
        }

        let Some((_, scaler)) = self.scaler.as_mut() else {
            return Err(FramecastError::EndOfStream);
        };

        let mut rgb = Video::empty();
        scaler
            .run(decoded, &mut rgb)
            .map_err(|e| FramecastError::encode(format!("Colorspace conversion failed: {}", e)))?;

        let stride = rgb.stride(0);
        let row_len = width as usize * FrameBuffer::BYTES_PER_PIXEL;
        let plane = rgb.data(0);
        let mut data = Vec::with_capacity(row_len * height as usize);
        for y in 0..height as usize {
            let start = y * stride;
            data.extend_from_slice(&plane[start..start + row_len]);
        }

        Ok(FrameBuffer {
            width,
            height,
            data,
            sequence: 0,
        })
    }
}

impl FrameSource for FfmpegSource {
    fn read_frame(&mut self) -> Result<FrameBuffer> {
        let mut decoded = Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    return self.to_rgb(&decoded).map_err(|e| {
                        debug!("Dropping session after conversion failure: {}", e);
                        FramecastError::EndOfStream
                    });
                }
                Err(ffmpeg::Error::Eof) => return Err(FramecastError::EndOfStream),
                Err(_) if self.draining => return Err(FramecastError::EndOfStream),
                Err(_) => self.feed()?,
            }
        }
    }
}

fn is_rtsp(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("rtsp://") || lower.starts_with("rtsps://")
}
