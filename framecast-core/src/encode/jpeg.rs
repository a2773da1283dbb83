//! JPEG encoder via FFmpeg's MJPEG codec

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec::{self, encoder};
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{self, Flags};
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::{Dictionary, Rational};
use tracing::{info, trace};

use super::FrameEncoder;
use crate::error::{FramecastError, Result};
use crate::types::{EncodedChunk, FrameBuffer};

/// Lowest quantizer the encoder may use
const QMIN: &str = "2";

/// Highest quantizer the encoder may use
const QMAX: &str = "8";

/// Single-frame JPEG encoder
///
/// Every call builds its own codec context, so the encoder is `Sync` and
/// output depends only on the input frame.
#[derive(Debug)]
pub struct JpegEncoder {
    _private: (),
}

impl JpegEncoder {
    /// Create a new JPEG encoder
    pub fn new() -> Result<Self> {
        ffmpeg::init().map_err(|e| FramecastError::encode(format!("FFmpeg init failed: {}", e)))?;

        if !mjpeg_encoder_available() {
            return Err(FramecastError::encode("MJPEG encoder not found"));
        }

        info!("JPEG encoder ready (FFmpeg {})", super::ffmpeg_version());
        Ok(Self { _private: () })
    }

    /// Copy the packed RGB24 frame into an FFmpeg frame, honouring its stride
    fn rgb_frame(frame: &FrameBuffer) -> Video {
        let mut src = Video::new(Pixel::RGB24, frame.width, frame.height);
        let stride = src.stride(0);
        let row_len = frame.width as usize * FrameBuffer::BYTES_PER_PIXEL;
        let plane = src.data_mut(0);

        for (y, row) in frame.data.chunks_exact(row_len).enumerate() {
            let start = y * stride;
            plane[start..start + row_len].copy_from_slice(row);
        }

        src
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, frame: &FrameBuffer) -> Result<EncodedChunk> {
        if !frame.is_well_formed() {
            return Err(FramecastError::encode(format!(
                "Unsupported buffer shape: {}x{} with {} bytes (expected {})",
                frame.width,
                frame.height,
                frame.data.len(),
                frame.expected_len()
            )));
        }

        let codec = encoder::find(codec::Id::MJPEG)
            .ok_or_else(|| FramecastError::encode("MJPEG encoder not found"))?;

        let mut context = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| FramecastError::encode(format!("Failed to create encoder context: {}", e)))?;

        context.set_width(frame.width);
        context.set_height(frame.height);
        context.set_format(Pixel::YUVJ420P);
        context.set_time_base(Rational::new(1, 25));

        let mut opts = Dictionary::new();
        opts.set("qmin", QMIN);
        opts.set("qmax", QMAX);

        let mut encoder = context
            .open_with(opts)
            .map_err(|e| FramecastError::encode(format!("Failed to open encoder: {}", e)))?;

        let src = Self::rgb_frame(frame);
        let mut yuv = Video::new(Pixel::YUVJ420P, frame.width, frame.height);

        let mut scaler = scaling::Context::get(
            Pixel::RGB24,
            frame.width,
            frame.height,
            Pixel::YUVJ420P,
            frame.width,
            frame.height,
            Flags::BILINEAR,
        )
        .map_err(|e| FramecastError::encode(format!("Failed to create scaler: {}", e)))?;

        scaler
            .run(&src, &mut yuv)
            .map_err(|e| FramecastError::encode(format!("Colorspace conversion failed: {}", e)))?;
        yuv.set_pts(Some(0));

        encoder
            .send_frame(&yuv)
            .map_err(|e| FramecastError::encode(format!("Failed to send frame: {}", e)))?;
        encoder
            .send_eof()
            .map_err(|e| FramecastError::encode(format!("Failed to send EOF: {}", e)))?;

        let mut packet = ffmpeg::Packet::empty();
        encoder
            .receive_packet(&mut packet)
            .map_err(|e| FramecastError::encode(format!("Failed to receive packet: {}", e)))?;

        let data = packet
            .data()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| FramecastError::encode("Encoder produced an empty packet"))?;

        trace!("Encoded frame {}: {} bytes", frame.sequence, data.len());
        Ok(EncodedChunk::new(frame.sequence, data.to_vec()))
    }
}

/// Check if the MJPEG encoder is available
pub(super) fn mjpeg_encoder_available() -> bool {
    ffmpeg::init().ok();
    encoder::find(codec::Id::MJPEG).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_shape() {
        let Ok(encoder) = JpegEncoder::new() else {
            eprintln!("MJPEG encoder not available, skipping");
            return;
        };
        let mut frame = FrameBuffer::filled(16, 16, [0, 0, 0]);
        frame.data.truncate(10);
        assert!(matches!(encoder.encode(&frame), Err(FramecastError::Encode(_))));

        let empty = FrameBuffer::filled(0, 0, [0, 0, 0]);
        assert!(encoder.encode(&empty).is_err());
    }

    #[test]
    fn test_encodes_jpeg_markers() {
        let Ok(encoder) = JpegEncoder::new() else {
            eprintln!("MJPEG encoder not available, skipping");
            return;
        };
        let mut frame = FrameBuffer::filled(64, 48, [200, 30, 30]);
        frame.sequence = 42;

        let chunk = encoder.encode(&frame).expect("encode");

        assert_eq!(chunk.sequence, 42);
        assert_eq!(&chunk.jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&chunk.jpeg[chunk.jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let Ok(encoder) = JpegEncoder::new() else {
            eprintln!("MJPEG encoder not available, skipping");
            return;
        };
        let frame = FrameBuffer::filled(32, 32, [10, 120, 240]);
        let a = encoder.encode(&frame).expect("encode");
        let b = encoder.encode(&frame).expect("encode");
        assert_eq!(a.jpeg, b.jpeg);
    }
}
