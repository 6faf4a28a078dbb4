//! 2-D separable transforms over row-major planes.

use crate::{forward_1d, inverse_1d, Filter};

/// Forward multi-level 2-D transform of a `width`×`height` plane, producing
/// the Mallat subband pyramid in place. Level `k` operates on the top-left
/// `(width >> k) × (height >> k)` region: rows first, then columns, so that
/// [`inverse_2d`] (columns first) exactly mirrors it.
pub fn forward_2d(filter: Filter, data: &mut [f32], width: usize, height: usize, levels: u8) {
    debug_assert_eq!(data.len(), width * height);
    let mut scratch = vec![0.0f32; width.max(height)];

    for level in 0..levels {
        let cw = width >> level;
        let ch = height >> level;
        if cw < 2 && ch < 2 {
            break;
        }

        for y in 0..ch {
            let row = &mut data[y * width..y * width + cw];
            forward_1d(filter, row);
        }

        for x in 0..cw {
            let col = &mut scratch[..ch];
            for (y, value) in col.iter_mut().enumerate() {
                *value = data[y * width + x];
            }
            forward_1d(filter, col);
            for (y, value) in col.iter().enumerate() {
                data[y * width + x] = *value;
            }
        }
    }
}

/// Inverse of [`forward_2d`].
pub fn inverse_2d(filter: Filter, data: &mut [f32], width: usize, height: usize, levels: u8) {
    debug_assert_eq!(data.len(), width * height);
    let mut scratch = vec![0.0f32; width.max(height)];

    for level in (0..levels).rev() {
        let cw = width >> level;
        let ch = height >> level;
        if cw < 2 && ch < 2 {
            continue;
        }

        for x in 0..cw {
            let col = &mut scratch[..ch];
            for (y, value) in col.iter_mut().enumerate() {
                *value = data[y * width + x];
            }
            inverse_1d(filter, col);
            for (y, value) in col.iter().enumerate() {
                data[y * width + x] = *value;
            }
        }

        for y in 0..ch {
            let row = &mut data[y * width..y * width + cw];
            inverse_1d(filter, row);
        }
    }
}
