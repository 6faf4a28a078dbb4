//! Per-frame plumbing shared by the I/P assembler and the GOP coder:
//! spatial transforms (monoblock or tiled), geometry-aware quantisation,
//! entropy stream framing and the Zstd envelope.

use byteorder::{LittleEndian, WriteBytesExt};
use tav_container::EntropyCoder;
use tsvm_codec_dwt::{forward_2d, inverse_2d};
use tsvm_codec_entropy as entropy;

use crate::params::{dwt_filter, CodecParams};
use crate::quant::{classify, subband_weight, QLUT};
use crate::tile::{crop_core, extract_padded, tile_grid, MARGIN, PADDED_H, PADDED_W};
use crate::{Error, Result};

/// The mode byte leading every frame blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// No payload; the frame repeats the reference.
    Skip,
    /// Self-contained coefficient planes.
    Intra,
    /// Coefficient planes holding a delta against the reference.
    Delta,
}

impl FrameMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Skip),
            1 => Some(Self::Intra),
            2 => Some(Self::Delta),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Skip => 0,
            Self::Intra => 1,
            Self::Delta => 2,
        }
    }
}

/// Forward spatial transform of one full-frame plane.
pub(crate) fn forward_spatial(params: &CodecParams, plane: &[f32]) -> Vec<f32> {
    let (w, h) = (params.width, params.height);
    let filter = dwt_filter(params.wavelet_filter);
    if params.is_monoblock() {
        let mut coeffs = plane.to_vec();
        forward_2d(filter, &mut coeffs, w, h, params.decomp_levels);
        return coeffs;
    }

    let mut coeffs = vec![0.0f32; w * h];
    let (tiles_x, tiles_y) = tile_grid(w, h);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let mut padded = extract_padded(plane, w, h, tx, ty);
            forward_2d(filter, &mut padded, PADDED_W, PADDED_H, params.decomp_levels);
            crop_core(&padded, &mut coeffs, w, h, tx, ty);
        }
    }
    coeffs
}

/// Inverse of [`forward_spatial`]. The tiled path mirror-pads the
/// coefficient plane per tile before the inverse transform.
pub(crate) fn inverse_spatial(params: &CodecParams, coeffs: &[f32]) -> Vec<f32> {
    let (w, h) = (params.width, params.height);
    let filter = dwt_filter(params.wavelet_filter);
    if params.is_monoblock() {
        let mut plane = coeffs.to_vec();
        inverse_2d(filter, &mut plane, w, h, params.decomp_levels);
        return plane;
    }

    let mut plane = vec![0.0f32; w * h];
    let (tiles_x, tiles_y) = tile_grid(w, h);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let mut padded = extract_padded(coeffs, w, h, tx, ty);
            inverse_2d(filter, &mut padded, PADDED_W, PADDED_H, params.decomp_levels);
            crop_core(&padded, &mut plane, w, h, tx, ty);
        }
    }
    plane
}

/// Subband of the coefficient at frame position `(x, y)`. In tiled mode
/// the geometry is that of the padded tile, not the frame.
fn quant_geometry(params: &CodecParams, x: usize, y: usize) -> (u8, crate::quant::Orientation) {
    if params.is_monoblock() {
        classify(x, y, params.width, params.height, params.decomp_levels)
    } else {
        classify(
            x % crate::tile::TILE_W + MARGIN,
            y % crate::tile::TILE_H + MARGIN,
            PADDED_W,
            PADDED_H,
            params.decomp_levels,
        )
    }
}

fn step_at(params: &CodecParams, plane_idx: usize, q_idx: u8, x: usize, y: usize) -> f32 {
    let base = f32::from(QLUT[usize::from(q_idx)]);
    let (level, orientation) = quant_geometry(params, x, y);
    base * subband_weight(plane_idx, level, orientation, params.perceptual)
}

fn dead_zone_at(params: &CodecParams, x: usize, y: usize) -> f32 {
    if quant_geometry(params, x, y).1 == crate::quant::Orientation::Ll {
        0.0
    } else {
        params.dead_zone
    }
}

/// Quantises a full-frame coefficient plane.
pub(crate) fn quantise_frame_plane(
    params: &CodecParams,
    coeffs: &[f32],
    plane_idx: usize,
    q_idx: u8,
) -> Vec<i16> {
    let w = params.width;
    let mut out = Vec::with_capacity(coeffs.len());
    for (i, &c) in coeffs.iter().enumerate() {
        let (x, y) = (i % w, i / w);
        let step = step_at(params, plane_idx, q_idx, x, y);
        let dz = dead_zone_at(params, x, y);
        let magnitude = ((c.abs() - step * dz).max(0.0) / step + 0.5).floor();
        let q = (magnitude.copysign(c) as i32).clamp(i32::from(i16::MIN), i32::from(i16::MAX));
        out.push(q as i16);
    }
    out
}

/// Inverse of [`quantise_frame_plane`].
pub(crate) fn dequantise_frame_plane(
    params: &CodecParams,
    quantised: &[i16],
    plane_idx: usize,
    q_idx: u8,
) -> Vec<f32> {
    let w = params.width;
    quantised
        .iter()
        .enumerate()
        .map(|(i, &q)| {
            let (x, y) = (i % w, i / w);
            f32::from(q) * step_at(params, plane_idx, q_idx, x, y)
        })
        .collect()
}

/// Entropy-encodes one quantised plane with the coder the stream selects.
pub(crate) fn encode_plane_stream(params: &CodecParams, quantised: &[i16]) -> Vec<u8> {
    match params.entropy_coder {
        EntropyCoder::TwobitMap => entropy::encode_twobit(quantised),
        EntropyCoder::Ezbc => entropy::encode_ezbc(quantised, params.width, params.height),
        EntropyCoder::Raw => entropy::encode_raw(quantised),
    }
}

pub(crate) fn decode_plane_stream(params: &CodecParams, data: &[u8]) -> Result<Vec<i16>> {
    let count = params.pixel_count();
    Ok(match params.entropy_coder {
        EntropyCoder::TwobitMap => entropy::decode_twobit(data, count)?,
        EntropyCoder::Ezbc => entropy::decode_ezbc(data, params.width, params.height)?,
        EntropyCoder::Raw => entropy::decode_raw(data, count)?,
    })
}

/// Assembles a frame blob: mode byte, three quantiser override bytes, then
/// one length-prefixed entropy stream per channel (none for SKIP).
pub(crate) fn write_frame_blob(
    mode: FrameMode,
    overrides: [u8; 3],
    channel_streams: &[Vec<u8>],
) -> Vec<u8> {
    let payload: usize = channel_streams.iter().map(|s| s.len() + 4).sum();
    let mut blob = Vec::with_capacity(4 + payload);
    blob.push(mode.to_u8());
    blob.extend_from_slice(&overrides);
    for stream in channel_streams {
        blob.write_u32::<LittleEndian>(stream.len() as u32).unwrap();
        blob.extend_from_slice(stream);
    }
    blob
}

/// Parses a frame blob into its mode, override bytes and channel streams.
pub(crate) fn parse_frame_blob(blob: &[u8]) -> Result<(FrameMode, [u8; 3], Vec<&[u8]>)> {
    if blob.len() < 4 {
        return Err(Error::TruncatedBlob);
    }
    let mode = FrameMode::from_u8(blob[0]).ok_or(Error::BadFrameMode(blob[0]))?;
    let overrides = [blob[1], blob[2], blob[3]];
    let mut streams = Vec::new();
    if mode != FrameMode::Skip {
        let mut rest = &blob[4..];
        while !rest.is_empty() {
            if rest.len() < 4 {
                return Err(Error::TruncatedBlob);
            }
            let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
            rest = &rest[4..];
            if rest.len() < len {
                return Err(Error::TruncatedBlob);
            }
            streams.push(&rest[..len]);
            rest = &rest[len..];
        }
    }
    Ok((mode, overrides, streams))
}

/// Zstd envelope around a frame blob (or the identity when the stream is
/// flagged uncompressed).
pub(crate) fn compress_payload(params: &CodecParams, blob: &[u8]) -> Result<Vec<u8>> {
    match params.zstd_level {
        Some(level) => zstd::stream::encode_all(blob, level).map_err(Error::Zstd),
        None => Ok(blob.to_vec()),
    }
}

pub(crate) fn decompress_payload(params: &CodecParams, data: &[u8]) -> Result<Vec<u8>> {
    match params.zstd_level {
        Some(_) => zstd::stream::decode_all(data).map_err(Error::Zstd),
        None => Ok(data.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tav_container::{ChannelLayout, WaveletFilter};

    fn params() -> CodecParams {
        CodecParams {
            width: 32,
            height: 24,
            wavelet_filter: WaveletFilter::Cdf97,
            decomp_levels: 3,
            temporal_filter: WaveletFilter::Haar,
            temporal_levels: 2,
            entropy_coder: EntropyCoder::TwobitMap,
            channel_layout: ChannelLayout::LumaChroma,
            quantiser: [10, 10, 10],
            perceptual: true,
            ictcp: false,
            lossless: false,
            monoblock: false,
            dead_zone: 0.15,
            zstd_level: Some(3),
        }
    }

    #[test]
    fn blob_framing_round_trips() {
        let streams = vec![vec![1u8, 2, 3], vec![], vec![9u8; 10]];
        let blob = write_frame_blob(FrameMode::Delta, [5, 0, 7], &streams);
        let (mode, overrides, parsed) = parse_frame_blob(&blob).unwrap();
        assert_eq!(mode, FrameMode::Delta);
        assert_eq!(overrides, [5, 0, 7]);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0], &[1, 2, 3]);
        assert_eq!(parsed[2], &[9u8; 10]);
    }

    #[test]
    fn skip_blob_is_header_only() {
        let blob = write_frame_blob(FrameMode::Skip, [0; 3], &[]);
        assert_eq!(blob.len(), 4);
        let (mode, _, streams) = parse_frame_blob(&blob).unwrap();
        assert_eq!(mode, FrameMode::Skip);
        assert!(streams.is_empty());
    }

    #[test]
    fn bad_mode_is_rejected() {
        assert!(matches!(
            parse_frame_blob(&[9, 0, 0, 0]),
            Err(Error::BadFrameMode(9))
        ));
    }

    #[test]
    fn zstd_envelope_round_trips() {
        let params = params();
        let blob: Vec<u8> = (0..500).map(|i| (i % 7) as u8).collect();
        let packed = compress_payload(&params, &blob).unwrap();
        assert!(packed.len() < blob.len());
        assert_eq!(decompress_payload(&params, &packed).unwrap(), blob);
    }

    #[test]
    fn spatial_transform_round_trips_monoblock() {
        let params = params();
        let plane: Vec<f32> = (0..32 * 24).map(|i| (i % 200) as f32).collect();
        let coeffs = forward_spatial(&params, &plane);
        let back = inverse_spatial(&params, &coeffs);
        for (a, b) in back.iter().zip(&plane) {
            assert!((a - b).abs() < 1e-2);
        }
    }

    #[test]
    fn quantised_plane_round_trips_within_step() {
        let params = params();
        let coeffs: Vec<f32> = (0..32 * 24).map(|i| ((i % 101) as f32 - 50.0) * 3.0).collect();
        let q = quantise_frame_plane(&params, &coeffs, 0, 4);
        let back = dequantise_frame_plane(&params, &q, 0, 4);
        // QLUT[4] = 5; worst-case error is half a step plus the dead zone.
        let max_step = 5.0 * 3.2 * std::f32::consts::SQRT_2;
        for (a, b) in back.iter().zip(&coeffs) {
            assert!((a - b).abs() <= max_step * 0.65 + 0.501, "{a} vs {b}");
        }
    }
}
