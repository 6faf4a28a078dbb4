//! Frame-level encoder state.

use crate::frame::{
    compress_payload, dequantise_frame_plane, encode_plane_stream, forward_spatial,
    inverse_spatial, quantise_frame_plane, write_frame_blob, FrameMode,
};
use crate::gop;
use crate::params::CodecParams;
use crate::{color, Result};

/// Any per-pixel delta below this is treated as "no change" when deciding
/// whether a P-frame can be skipped outright. Sits just above the rounding
/// noise of a reconstruct-and-reread cycle.
const SKIP_THRESHOLD: f32 = 1.5;

/// Owns the reference colour planes (the frame a decoder would have
/// reconstructed) so P-frame deltas match decoder state exactly.
pub struct TavEncoder {
    params: CodecParams,
    reference: Option<Vec<Vec<f32>>>,
}

impl TavEncoder {
    pub fn new(params: CodecParams) -> Self {
        Self { params, reference: None }
    }

    pub fn params(&self) -> &CodecParams {
        &self.params
    }

    /// Encodes an intra frame and makes its reconstruction the reference.
    /// Returns the compressed packet body (the bytes after the size field
    /// of an `0x10` packet).
    pub fn encode_iframe(&mut self, rgb: &[u8]) -> Result<Vec<u8>> {
        let planes = rgb_planes(&self.params, rgb);
        let mut streams = Vec::with_capacity(planes.len());
        let mut reconstruction = Vec::with_capacity(planes.len());
        for (idx, plane) in planes.iter().enumerate() {
            let coeffs = forward_spatial(&self.params, plane);
            let q_idx = self.params.quantiser[idx.min(2)];
            let quantised = quantise_frame_plane(&self.params, &coeffs, idx, q_idx);
            let dequantised = dequantise_frame_plane(&self.params, &quantised, idx, q_idx);
            reconstruction.push(inverse_spatial(&self.params, &dequantised));
            streams.push(encode_plane_stream(&self.params, &quantised));
        }
        self.reference = Some(reconstruction);
        let blob = write_frame_blob(FrameMode::Intra, [0; 3], &streams);
        compress_payload(&self.params, &blob)
    }

    /// Encodes a predicted frame against the current reference. Falls back
    /// to an intra-mode body when no reference exists yet; emits a SKIP
    /// body when the frame is indistinguishable from the reference.
    pub fn encode_pframe(&mut self, rgb: &[u8]) -> Result<Vec<u8>> {
        if self.reference.is_none() {
            return self.encode_iframe(rgb);
        }

        let planes = rgb_planes(&self.params, rgb);
        let reference = self.reference.as_ref().unwrap();

        let mut peak = 0.0f32;
        for (plane, reference_plane) in planes.iter().zip(reference) {
            for (a, b) in plane.iter().zip(reference_plane) {
                peak = peak.max((a - b).abs());
            }
        }
        if peak < SKIP_THRESHOLD {
            let blob = write_frame_blob(FrameMode::Skip, [0; 3], &[]);
            return compress_payload(&self.params, &blob);
        }

        let mut streams = Vec::with_capacity(planes.len());
        let mut new_reference = Vec::with_capacity(planes.len());
        for (idx, (plane, reference_plane)) in planes.iter().zip(reference).enumerate() {
            let delta: Vec<f32> =
                plane.iter().zip(reference_plane).map(|(a, b)| a - b).collect();
            let coeffs = forward_spatial(&self.params, &delta);
            let q_idx = self.params.quantiser[idx.min(2)];
            let quantised = quantise_frame_plane(&self.params, &coeffs, idx, q_idx);
            let dequantised = dequantise_frame_plane(&self.params, &quantised, idx, q_idx);
            let recon_delta = inverse_spatial(&self.params, &dequantised);
            new_reference.push(
                reference_plane
                    .iter()
                    .zip(&recon_delta)
                    .map(|(r, d)| r + d)
                    .collect(),
            );
            streams.push(encode_plane_stream(&self.params, &quantised));
        }
        self.reference = Some(new_reference);
        let blob = write_frame_blob(FrameMode::Delta, [0; 3], &streams);
        compress_payload(&self.params, &blob)
    }

    /// Encodes a whole GOP as one temporally-transformed packet body.
    /// The reference is reset afterwards: GOP streams restart prediction.
    pub fn encode_gop(&mut self, frames: &[Vec<u8>]) -> Result<Vec<u8>> {
        self.reference = None;
        gop::encode_gop(&self.params, frames)
    }
}

pub(crate) fn rgb_planes(params: &CodecParams, rgb: &[u8]) -> Vec<Vec<f32>> {
    let n = params.pixel_count();
    let planes = if params.ictcp {
        color::rgb_to_ictcp_planes(rgb, n)
    } else {
        color::rgb_to_ycocg_planes(rgb, n)
    };
    planes.into_iter().collect()
}
