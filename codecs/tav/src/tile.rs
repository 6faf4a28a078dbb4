//! The tile engine.
//!
//! Frames larger than the monoblock threshold are processed as 640×540
//! tiles. Each tile is lifted into a 704×604 working buffer with a
//! 32-pixel mirrored margin so the wavelet transform sees no hard frame
//! edges, then the core region is cropped back out. The decoder applies
//! the same padding to the coefficient plane before the inverse transform,
//! which keeps tile seams within quantisation noise.

pub const TILE_W: usize = 640;
pub const TILE_H: usize = 540;
pub const MARGIN: usize = 32;
pub const PADDED_W: usize = TILE_W + 2 * MARGIN;
pub const PADDED_H: usize = TILE_H + 2 * MARGIN;

/// Number of tile columns and rows covering a `w`×`h` frame.
pub fn tile_grid(w: usize, h: usize) -> (usize, usize) {
    (w.div_ceil(TILE_W), h.div_ceil(TILE_H))
}

/// Core dimensions of the tile at `(tile_x, tile_y)`; edge tiles shrink.
pub fn tile_dimensions(w: usize, h: usize, tile_x: usize, tile_y: usize) -> (usize, usize) {
    let start_x = tile_x * TILE_W;
    let start_y = tile_y * TILE_H;
    ((w - start_x).min(TILE_W), (h - start_y).min(TILE_H))
}

/// Mirrors a source coordinate into `[0, limit)`.
fn mirror(coord: isize, limit: usize) -> usize {
    let limit = limit as isize;
    let mut c = coord;
    if c < 0 {
        c = -c;
    }
    if c >= limit {
        c = limit - 1 - (c - limit);
    }
    c.clamp(0, limit - 1) as usize
}

/// Extracts the padded working buffer for one tile from a full-frame plane.
pub fn extract_padded(plane: &[f32], w: usize, h: usize, tile_x: usize, tile_y: usize) -> Vec<f32> {
    let core_x = (tile_x * TILE_W) as isize;
    let core_y = (tile_y * TILE_H) as isize;
    let mut padded = vec![0.0f32; PADDED_W * PADDED_H];
    for py in 0..PADDED_H {
        let sy = mirror(core_y + py as isize - MARGIN as isize, h);
        let src_row = sy * w;
        let dst_row = py * PADDED_W;
        for px in 0..PADDED_W {
            let sx = mirror(core_x + px as isize - MARGIN as isize, w);
            padded[dst_row + px] = plane[src_row + sx];
        }
    }
    padded
}

/// Writes the core region of a padded buffer back into a full-frame plane.
pub fn crop_core(
    padded: &[f32],
    plane: &mut [f32],
    w: usize,
    h: usize,
    tile_x: usize,
    tile_y: usize,
) {
    let (tw, th) = tile_dimensions(w, h, tile_x, tile_y);
    let core_x = tile_x * TILE_W;
    let core_y = tile_y * TILE_H;
    for y in 0..th {
        let src = (y + MARGIN) * PADDED_W + MARGIN;
        let dst = (core_y + y) * w + core_x;
        plane[dst..dst + tw].copy_from_slice(&padded[src..src + tw]);
    }
}
