//! Frame-level decoder state machine.
//!
//! The decoder owns exactly one reference frame (colour planes kept at
//! float precision plus the emitted RGB), swapped on every decoded frame.
//! Per the container error policy, damaged packets are skipped with a
//! counter bump rather than aborting the stream.

use tav_container::{ChannelLayout, Packet};
use tracing::warn;

use crate::encoder::rgb_planes;
use crate::frame::{
    decode_plane_stream, decompress_payload, dequantise_frame_plane, inverse_spatial,
    parse_frame_blob, FrameMode,
};
use crate::gop;
use crate::params::{CodecParams, CodecStats};
use crate::{color, Error, Result};

/// Frames produced by one packet, in presentation order.
pub type DecodedFrames = Vec<Vec<u8>>;

pub struct TavDecoder {
    params: CodecParams,
    stats: CodecStats,
    reference_planes: Option<Vec<Vec<f32>>>,
    reference_rgb: Option<Vec<u8>>,
}

impl TavDecoder {
    pub fn new(params: CodecParams) -> Self {
        Self { params, stats: CodecStats::default(), reference_planes: None, reference_rgb: None }
    }

    pub fn params(&self) -> &CodecParams {
        &self.params
    }

    pub fn stats(&self) -> CodecStats {
        self.stats
    }

    /// Drops the reference state (stream reset / seek to an I-frame).
    pub fn reset(&mut self) {
        self.reference_planes = None;
        self.reference_rgb = None;
    }

    /// Decodes one container packet under the non-fatal error policy:
    /// damaged video packets are logged and skipped (P-frames re-emit the
    /// reference), and non-video packets yield no frames.
    pub fn decode_packet(&mut self, packet: &Packet) -> DecodedFrames {
        match packet {
            Packet::IFrame(body) => self.resilient_frame(body, false),
            Packet::PFrame(body) => self.resilient_frame(body, true),
            Packet::GopUnified(body) => self.resilient_gop(body, false),
            Packet::GopUnifiedMotion(body) => self.resilient_gop(body, true),
            _ => Vec::new(),
        }
    }

    fn resilient_frame(&mut self, body: &[u8], predicted: bool) -> DecodedFrames {
        match self.decode_frame(body, predicted) {
            Ok(frame) => vec![frame],
            Err(err) => {
                self.count_error(&err);
                warn!(error = %err, predicted, "dropping damaged frame packet");
                if predicted {
                    // Re-emit the reference so the presentation clock
                    // still advances by one frame.
                    self.reference_rgb.clone().map(|f| vec![f]).unwrap_or_default()
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn resilient_gop(&mut self, body: &[u8], has_motion: bool) -> DecodedFrames {
        match self.decode_gop(body, has_motion) {
            Ok(frames) => frames,
            Err(err) => {
                self.count_error(&err);
                warn!(error = %err, "dropping damaged GOP packet");
                Vec::new()
            }
        }
    }

    fn count_error(&mut self, err: &Error) {
        match err {
            Error::Zstd(_) => self.stats.zstd_errors += 1,
            Error::Entropy(_) => self.stats.entropy_errors += 1,
            _ => {}
        }
        self.stats.skipped_packets += 1;
    }

    /// Decodes an I-frame (`0x10`) or P-frame (`0x11`) packet body.
    pub fn decode_frame(&mut self, body: &[u8], predicted: bool) -> Result<Vec<u8>> {
        let blob = decompress_payload(&self.params, body)?;
        let (mode, overrides, streams) = parse_frame_blob(&blob)?;

        if mode == FrameMode::Skip {
            let rgb = self
                .reference_rgb
                .clone()
                .unwrap_or_else(|| vec![0u8; self.params.pixel_count() * 3]);
            return Ok(rgb);
        }

        let plane_count = self.params.plane_count();
        let mut planes = Vec::with_capacity(plane_count);
        for idx in 0..plane_count {
            let stream = streams.get(idx).ok_or(Error::TruncatedBlob)?;
            let quantised = decode_plane_stream(&self.params, stream)?;
            let q_idx = self.params.quantiser_for(idx, overrides[idx.min(2)]);
            let coeffs = dequantise_frame_plane(&self.params, &quantised, idx, q_idx);
            planes.push(inverse_spatial(&self.params, &coeffs));
        }

        if mode == FrameMode::Delta {
            if !predicted {
                return Err(Error::BadFrameMode(mode.to_u8()));
            }
            let reference = self.reference_planes.as_ref().ok_or(Error::MissingReference)?;
            for (plane, reference_plane) in planes.iter_mut().zip(reference) {
                for (value, r) in plane.iter_mut().zip(reference_plane) {
                    *value += r;
                }
            }
        }

        let rgb = planes_to_rgb(&self.params, &planes);
        self.reference_planes = Some(planes);
        self.reference_rgb = Some(rgb.clone());
        Ok(rgb)
    }

    /// Decodes a GOP-unified packet body (`0x12`, or `0x13` with
    /// `has_motion`).
    pub fn decode_gop(&mut self, body: &[u8], has_motion: bool) -> Result<DecodedFrames> {
        let frames = gop::decode_gop(&self.params, body, has_motion)?;
        if let Some(last) = frames.last() {
            // GOP frames reset prediction; keep the final frame around as
            // the reference for any P-frames that follow.
            self.reference_planes = Some(rgb_planes(&self.params, last));
            self.reference_rgb = Some(last.clone());
        }
        Ok(frames)
    }
}

/// Reassembles output pixels from decoded colour planes according to the
/// stream's channel layout. Alpha planes are carried but not emitted
/// (output is RGB24).
pub(crate) fn planes_to_rgb(params: &CodecParams, planes: &[Vec<f32>]) -> Vec<u8> {
    match params.channel_layout {
        ChannelLayout::LumaChroma | ChannelLayout::LumaChromaAlpha => {
            if params.ictcp {
                color::ictcp_to_rgb_pixels(&planes[..3])
            } else {
                color::ycocg_to_rgb_pixels(&planes[..3], params.lossless)
            }
        }
        ChannelLayout::Luma | ChannelLayout::LumaAlpha => {
            let mut rgb = Vec::with_capacity(planes[0].len() * 3);
            for &y in &planes[0] {
                let v = (y + 0.5).clamp(0.0, 255.0) as u8;
                rgb.extend_from_slice(&[v, v, v]);
            }
            rgb
        }
        ChannelLayout::Chroma | ChannelLayout::ChromaAlpha => {
            // Chroma-only streams carry no luma; reconstruct against a
            // mid-grey baseline.
            let luma = vec![128.0f32; planes[0].len()];
            let full = [luma, planes[0].clone(), planes[1].clone()];
            if params.ictcp {
                color::ictcp_to_rgb_pixels(&full)
            } else {
                color::ycocg_to_rgb_pixels(&full, false)
            }
        }
    }
}
