//! GOP-unified coding: one packet carries 8-24 frames whose coefficient
//! planes are additionally transformed along the time axis.
//!
//! Decompressed body layout: `u8 gop_size`, then for each temporal-subband
//! frame the channels in planar order, each plane a length-prefixed
//! entropy stream. The motion variant (`0x13`) inserts
//! `u32 mv_size ∥ mv ∥ u32 cv_size` between the GOP size and the volume;
//! this decoder parses and discards the motion block, falling back to the
//! plain path when it is unreadable.

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::warn;
use tsvm_codec_dwt::{forward_temporal, inverse_temporal};

use crate::decoder::planes_to_rgb;
use crate::encoder::rgb_planes;
use crate::frame::{
    compress_payload, decode_plane_stream, decompress_payload, dequantise_frame_plane,
    encode_plane_stream, forward_spatial, inverse_spatial, quantise_frame_plane,
};
use crate::params::{dwt_filter, CodecParams};
use crate::{Error, Result, GOP_SIZE_MAX, GOP_SIZE_MIN};

pub(crate) fn encode_gop(params: &CodecParams, frames: &[Vec<u8>]) -> Result<Vec<u8>> {
    let gop_size = frames.len();
    debug_assert!(
        (usize::from(GOP_SIZE_MIN)..=usize::from(GOP_SIZE_MAX)).contains(&gop_size),
        "GOP size {gop_size} out of range"
    );

    let plane_count = params.plane_count();
    // volume[plane][frame] holds spatially transformed coefficient planes.
    let mut volume: Vec<Vec<Vec<f32>>> = vec![Vec::with_capacity(gop_size); plane_count];
    for rgb in frames {
        let planes = rgb_planes(params, rgb);
        for (idx, plane) in planes.into_iter().enumerate().take(plane_count) {
            volume[idx].push(forward_spatial(params, &plane));
        }
    }

    let temporal = dwt_filter(params.temporal_filter);
    for planes in volume.iter_mut() {
        forward_temporal(temporal, planes, params.temporal_levels);
    }

    let mut body = vec![gop_size as u8];
    for t in 0..gop_size {
        for (idx, planes) in volume.iter().enumerate() {
            let q_idx = params.quantiser[idx.min(2)];
            let quantised = quantise_frame_plane(params, &planes[t], idx, q_idx);
            let stream = encode_plane_stream(params, &quantised);
            body.write_u32::<LittleEndian>(stream.len() as u32).unwrap();
            body.extend_from_slice(&stream);
        }
    }

    compress_payload(params, &body)
}

pub(crate) fn decode_gop(
    params: &CodecParams,
    payload: &[u8],
    has_motion: bool,
) -> Result<Vec<Vec<u8>>> {
    let body = decompress_payload(params, payload)?;
    let (&gop_byte, mut rest) = body.split_first().ok_or(Error::TruncatedBlob)?;
    if gop_byte == 0 {
        return Err(Error::GopSizeOutOfRange(gop_byte));
    }
    let gop_size = if (GOP_SIZE_MIN..=GOP_SIZE_MAX).contains(&gop_byte) {
        gop_byte
    } else {
        // An oversized count is capped (trailing frames are ignored); an
        // undersized one is decoded as-is since the volume holds no more.
        let clamped = gop_byte.min(GOP_SIZE_MAX);
        warn!(gop_byte, clamped, "GOP size out of range, clamping");
        clamped
    } as usize;

    if has_motion {
        rest = skip_motion_block(rest);
    }

    let plane_count = params.plane_count();
    let mut volume: Vec<Vec<Vec<f32>>> = vec![Vec::with_capacity(gop_size); plane_count];
    for _ in 0..gop_size {
        for (idx, planes) in volume.iter_mut().enumerate() {
            if rest.len() < 4 {
                return Err(Error::TruncatedBlob);
            }
            let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
            rest = &rest[4..];
            if rest.len() < len {
                return Err(Error::TruncatedBlob);
            }
            let quantised = decode_plane_stream(params, &rest[..len])?;
            rest = &rest[len..];
            let q_idx = params.quantiser[idx.min(2)];
            planes.push(dequantise_frame_plane(params, &quantised, idx, q_idx));
        }
    }

    let temporal = dwt_filter(params.temporal_filter);
    for planes in volume.iter_mut() {
        inverse_temporal(temporal, planes, params.temporal_levels);
    }

    let mut frames = Vec::with_capacity(gop_size);
    for t in 0..gop_size {
        let planes: Vec<Vec<f32>> = volume
            .iter()
            .map(|channel| inverse_spatial(params, &channel[t]))
            .collect();
        frames.push(planes_to_rgb(params, &planes));
    }
    Ok(frames)
}

/// Parses past the motion-vector block of an `0x13` body. An unreadable
/// block falls back to treating the remainder as the coefficient volume.
fn skip_motion_block(rest: &[u8]) -> &[u8] {
    let Some(mv_size) = read_u32(rest) else { return rest };
    let after_mv = &rest[4..];
    if after_mv.len() < mv_size as usize {
        warn!("motion block exceeds packet, falling back to motion-free decode");
        return rest;
    }
    let after_mv = &after_mv[mv_size as usize..];
    let Some(cv_size) = read_u32(after_mv) else {
        warn!("missing coefficient-volume size, falling back to motion-free decode");
        return rest;
    };
    let volume = &after_mv[4..];
    if volume.len() < cv_size as usize {
        warn!("coefficient volume exceeds packet, falling back to motion-free decode");
        return rest;
    }
    &volume[..cv_size as usize]
}

fn read_u32(data: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes([
        *data.first()?,
        *data.get(1)?,
        *data.get(2)?,
        *data.get(3)?,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tav_container::{ChannelLayout, EntropyCoder, WaveletFilter};

    fn params() -> CodecParams {
        CodecParams {
            width: 16,
            height: 16,
            wavelet_filter: WaveletFilter::Cdf97,
            decomp_levels: 2,
            temporal_filter: WaveletFilter::Haar,
            temporal_levels: 2,
            entropy_coder: EntropyCoder::Ezbc,
            channel_layout: ChannelLayout::LumaChroma,
            quantiser: [2, 2, 2],
            perceptual: false,
            ictcp: false,
            lossless: false,
            monoblock: false,
            dead_zone: 0.0,
            zstd_level: Some(3),
        }
    }

    #[test]
    fn gop_body_starts_with_the_frame_count() {
        let params = params();
        let frames: Vec<Vec<u8>> = (0..8).map(|i| vec![(i * 32) as u8; 16 * 16 * 3]).collect();
        let payload = encode_gop(&params, &frames).unwrap();
        let body = decompress_payload(&params, &payload).unwrap();
        assert_eq!(body[0], 8);
    }

    #[test]
    fn zero_gop_size_is_rejected() {
        let params = params();
        let payload = compress_payload(&params, &[0u8]).unwrap();
        assert!(matches!(
            decode_gop(&params, &payload, false),
            Err(Error::GopSizeOutOfRange(0))
        ));
    }

    #[test]
    fn motion_block_skip_finds_the_volume() {
        // mv_size=2, mv bytes, cv_size=3, volume
        let mut body = Vec::new();
        body.extend_from_slice(&2u32.to_le_bytes());
        body.extend_from_slice(&[0xAA, 0xBB]);
        body.extend_from_slice(&3u32.to_le_bytes());
        body.extend_from_slice(&[1, 2, 3]);
        assert_eq!(skip_motion_block(&body), &[1, 2, 3]);

        // Unreadable motion block: fall back to the whole remainder.
        let broken = [9u8, 0, 0];
        assert_eq!(skip_motion_block(&broken), &broken);
    }
}
