//! Temporal transform across the frame axis of a GOP volume.
//!
//! The volume is a slice of equally-sized coefficient planes; every spatial
//! position is transformed independently along time. After the forward pass
//! plane `0..ceil(n/2)` hold the temporal low band, the rest the high band.

use crate::{forward_multi_1d, inverse_multi_1d, Filter};

/// Forward temporal transform of `levels` cascaded decompositions.
pub fn forward_temporal(filter: Filter, frames: &mut [Vec<f32>], levels: u8) {
    transform_temporal(frames, |series| forward_multi_1d(filter, series, levels));
}

/// Inverse of [`forward_temporal`].
pub fn inverse_temporal(filter: Filter, frames: &mut [Vec<f32>], levels: u8) {
    transform_temporal(frames, |series| inverse_multi_1d(filter, series, levels));
}

fn transform_temporal(frames: &mut [Vec<f32>], kernel: impl Fn(&mut [f32])) {
    let gop = frames.len();
    if gop < 2 {
        return;
    }
    let plane_len = frames[0].len();
    debug_assert!(frames.iter().all(|f| f.len() == plane_len));

    let mut series = vec![0.0f32; gop];
    for i in 0..plane_len {
        for (t, frame) in frames.iter().enumerate() {
            series[t] = frame[i];
        }
        kernel(&mut series);
        for (t, frame) in frames.iter_mut().enumerate() {
            frame[i] = series[t];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gop(frames: usize, plane: usize) -> Vec<Vec<f32>> {
        (0..frames)
            .map(|t| {
                (0..plane)
                    .map(|i| ((i * 13 + t * 101) % 223) as f32 - 111.0)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn round_trips_all_gop_sizes() {
        for filter in [Filter::Haar, Filter::Cdf53] {
            for gop_size in [2usize, 8, 12, 24] {
                let original = gop(gop_size, 16);
                let mut frames = original.clone();
                forward_temporal(filter, &mut frames, 2);
                inverse_temporal(filter, &mut frames, 2);
                for (a, b) in frames.iter().flatten().zip(original.iter().flatten()) {
                    assert!((a - b).abs() < 1e-4, "{filter:?} gop {gop_size}");
                }
            }
        }
    }

    #[test]
    fn static_gop_concentrates_into_low_band() {
        let mut frames = vec![vec![7.0f32; 4]; 8];
        forward_temporal(Filter::Haar, &mut frames, 1);
        for frame in &frames[4..] {
            assert!(frame.iter().all(|v| v.abs() < 1e-5));
        }
    }
}
