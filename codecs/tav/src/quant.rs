//! Scalar quantisation with per-subband perceptual weighting.

use crate::params::CodecParams;

/// Quantiser index → step lookup. Strictly increasing, 256 entries, copied
/// verbatim from the reference inspector.
pub const QLUT: [u16; 256] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
    26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48,
    49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 60, 61, 62, 63, 64, 66, 68, 70, 72, 74, 76, 78,
    80, 82, 84, 86, 88, 90, 92, 94, 96, 98, 100, 102, 104, 106, 108, 110, 112, 114, 116, 118,
    120, 122, 124, 126, 128, 132, 136, 140, 144, 148, 152, 156, 160, 164, 168, 172, 176, 180,
    184, 188, 192, 196, 200, 204, 208, 212, 216, 220, 224, 228, 232, 236, 240, 244, 248, 252,
    256, 264, 272, 280, 288, 296, 304, 312, 320, 328, 336, 344, 352, 360, 368, 376, 384, 392,
    400, 408, 416, 424, 432, 440, 448, 456, 464, 472, 480, 488, 496, 504, 512, 528, 544, 560,
    576, 592, 608, 624, 640, 656, 672, 688, 704, 720, 736, 752, 768, 784, 800, 816, 832, 848,
    864, 880, 896, 912, 928, 944, 960, 976, 992, 1008, 1024, 1056, 1088, 1120, 1152, 1184,
    1216, 1248, 1280, 1312, 1344, 1376, 1408, 1440, 1472, 1504, 1536, 1568, 1600, 1632, 1664,
    1696, 1728, 1760, 1792, 1824, 1856, 1888, 1920, 1952, 1984, 2016, 2048, 2112, 2176, 2240,
    2304, 2368, 2432, 2496, 2560, 2624, 2688, 2752, 2816, 2880, 2944, 3008, 3072, 3136, 3200,
    3264, 3328, 3392, 3456, 3520, 3584, 3648, 3712, 3776, 3840, 3904, 3968, 4032, 4096,
];

/// Orientation of a Mallat subband.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Orientation {
    Ll,
    Lh,
    Hl,
    Hh,
}

/// Locates the subband containing coefficient `(x, y)` of a `w`×`h` plane
/// decomposed `levels` times. Returns the level (1 = finest) and the
/// orientation; the residual LL band reports `(levels, Ll)`.
pub(crate) fn classify(x: usize, y: usize, w: usize, h: usize, levels: u8) -> (u8, Orientation) {
    for level in 0..levels {
        let cw = w >> level;
        let ch = h >> level;
        if cw < 2 && ch < 2 {
            return (level.max(1), Orientation::Ll);
        }
        let half_w = if cw >= 2 { cw.div_ceil(2) } else { cw.max(1) };
        let half_h = if ch >= 2 { ch.div_ceil(2) } else { ch.max(1) };
        let high_x = x >= half_w;
        let high_y = y >= half_h;
        match (high_x, high_y) {
            (false, false) => continue,
            (true, false) => return (level + 1, Orientation::Hl),
            (false, true) => return (level + 1, Orientation::Lh),
            (true, true) => return (level + 1, Orientation::Hh),
        }
    }
    (levels.max(1), Orientation::Ll)
}

// Detail-band step multipliers indexed by level, finest first. Chroma highs
// take the largest steps; diagonal bands a further sqrt(2).
const LUMA_LEVEL_WEIGHTS: [f32; 8] = [2.0, 1.6, 1.3, 1.1, 1.0, 1.0, 1.0, 1.0];
const CHROMA_LEVEL_WEIGHTS: [f32; 8] = [3.2, 2.4, 1.8, 1.4, 1.2, 1.0, 1.0, 1.0];
const HH_EXTRA: f32 = std::f32::consts::SQRT_2;

pub(crate) fn subband_weight(
    plane: usize,
    level: u8,
    orientation: Orientation,
    perceptual: bool,
) -> f32 {
    if !perceptual || orientation == Orientation::Ll {
        return 1.0;
    }
    let idx = usize::from(level.saturating_sub(1)).min(7);
    let base = if plane == 0 {
        LUMA_LEVEL_WEIGHTS[idx]
    } else {
        CHROMA_LEVEL_WEIGHTS[idx]
    };
    if orientation == Orientation::Hh {
        base * HH_EXTRA
    } else {
        base
    }
}

/// Dead-zone quantisation of one coefficient plane.
///
/// `q = sign(c) * floor(max(|c| - s*dz, 0) / s + 0.5)` with the effective
/// step `s` = `QLUT[q_idx]` times the subband weight. The LL band carries
/// no dead zone.
pub fn quantise_plane(
    coeffs: &[f32],
    w: usize,
    h: usize,
    params: &CodecParams,
    plane: usize,
    q_idx: u8,
) -> Vec<i16> {
    let base_step = f32::from(QLUT[usize::from(q_idx)]);
    let mut out = Vec::with_capacity(coeffs.len());
    for y in 0..h {
        for x in 0..w {
            let c = coeffs[y * w + x];
            let (level, orientation) = classify(x, y, w, h, params.decomp_levels);
            let step = base_step * subband_weight(plane, level, orientation, params.perceptual);
            let dz = if orientation == Orientation::Ll { 0.0 } else { params.dead_zone };
            let magnitude = ((c.abs() - step * dz).max(0.0) / step + 0.5).floor();
            let q = (magnitude.copysign(c) as i32).clamp(i32::from(i16::MIN), i32::from(i16::MAX));
            out.push(q as i16);
        }
    }
    out
}

/// Inverse of [`quantise_plane`]: `c' = q * s`.
pub fn dequantise_plane(
    quantised: &[i16],
    w: usize,
    h: usize,
    params: &CodecParams,
    plane: usize,
    q_idx: u8,
) -> Vec<f32> {
    let base_step = f32::from(QLUT[usize::from(q_idx)]);
    let mut out = Vec::with_capacity(quantised.len());
    for y in 0..h {
        for x in 0..w {
            let q = quantised[y * w + x];
            let (level, orientation) = classify(x, y, w, h, params.decomp_levels);
            let step = base_step * subband_weight(plane, level, orientation, params.perceptual);
            out.push(f32::from(q) * step);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tav_container::{ChannelLayout, EntropyCoder, WaveletFilter};

    fn params(perceptual: bool, dead_zone: f32) -> CodecParams {
        CodecParams {
            width: 16,
            height: 16,
            wavelet_filter: WaveletFilter::Cdf97,
            decomp_levels: 2,
            temporal_filter: WaveletFilter::Haar,
            temporal_levels: 2,
            entropy_coder: EntropyCoder::TwobitMap,
            channel_layout: ChannelLayout::LumaChroma,
            quantiser: [0, 0, 0],
            perceptual,
            ictcp: false,
            lossless: false,
            monoblock: false,
            dead_zone,
            zstd_level: None,
        }
    }

    #[test]
    fn qlut_is_strictly_increasing_and_anchored() {
        assert_eq!(QLUT[0], 1);
        assert_eq!(QLUT[63], 64);
        assert_eq!(QLUT[64], 66);
        assert_eq!(QLUT[255], 4096);
        for pair in QLUT.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn unit_step_no_dead_zone_is_lossless_on_integers() {
        let params = params(false, 0.0);
        let coeffs: Vec<f32> = (0..256).map(|i| (i as f32) - 128.0).collect();
        let q = quantise_plane(&coeffs, 16, 16, &params, 0, 0);
        let back = dequantise_plane(&q, 16, 16, &params, 0, 0);
        assert_eq!(back, coeffs);
    }

    #[test]
    fn dead_zone_flushes_small_detail_coefficients() {
        let params = params(false, 0.5);
        // Detail band coefficients just below half a step must round to 0.
        let mut coeffs = vec![0.0f32; 256];
        coeffs[15] = 0.9; // HL band of level 1 at (15, 0)
        let q = quantise_plane(&coeffs, 16, 16, &params, 0, 0);
        assert_eq!(q[15], 0);
        // But the LL band keeps them (no dead zone there).
        coeffs[15] = 0.0;
        coeffs[0] = 0.9;
        let q = quantise_plane(&coeffs, 16, 16, &params, 0, 0);
        assert_eq!(q[0], 1);
    }

    #[test]
    fn perceptual_steps_are_coarser_for_chroma_detail() {
        let params = params(true, 0.0);
        let (level, orientation) = classify(15, 15, 16, 16, 2);
        assert_eq!((level, orientation), (1, Orientation::Hh));
        let luma = subband_weight(0, level, orientation, true);
        let chroma = subband_weight(2, level, orientation, true);
        assert!(chroma > luma);
        assert!(luma > 1.0);
        assert_eq!(subband_weight(0, 2, Orientation::Ll, true), 1.0);
    }

    #[test]
    fn classify_finds_the_ll_corner() {
        assert_eq!(classify(0, 0, 16, 16, 2), (2, Orientation::Ll));
        assert_eq!(classify(3, 3, 16, 16, 2), (2, Orientation::Ll));
        assert_eq!(classify(4, 0, 16, 16, 2), (2, Orientation::Hl));
        assert_eq!(classify(0, 12, 16, 16, 2), (1, Orientation::Lh));
        assert_eq!(classify(12, 12, 16, 16, 2), (1, Orientation::Hh));
    }
}
