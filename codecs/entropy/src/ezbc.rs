//! EZBC: embedded zero-block coding.
//!
//! Coefficient magnitudes are coded bitplane by bitplane, most significant
//! first. Within a plane a quadtree significance pass locates coefficients
//! whose magnitude first exceeds the plane threshold (emitting a sign bit
//! as each one appears), then a raster-order refinement pass emits the
//! current bit of every coefficient that was already significant. Coding
//! runs down to plane zero, so reconstruction is exact.
//!
//! Stream layout: one `u8` top-plane index (`0xFF` = every coefficient is
//! zero) followed by MSB-first packed bits.

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};
use std::io::Cursor;

use crate::{Error, Result};

const EMPTY_PLANE: u8 = 0xFF;

#[derive(Clone, Copy)]
struct Rect {
    x: usize,
    y: usize,
    w: usize,
    h: usize,
}

impl Rect {
    fn children(self) -> [Rect; 4] {
        let half_w = self.w.div_ceil(2);
        let half_h = self.h.div_ceil(2);
        [
            Rect { x: self.x, y: self.y, w: half_w, h: half_h },
            Rect { x: self.x + half_w, y: self.y, w: self.w - half_w, h: half_h },
            Rect { x: self.x, y: self.y + half_h, w: half_w, h: self.h - half_h },
            Rect {
                x: self.x + half_w,
                y: self.y + half_h,
                w: self.w - half_w,
                h: self.h - half_h,
            },
        ]
    }

    fn is_empty(self) -> bool {
        self.w == 0 || self.h == 0
    }

    fn is_leaf(self) -> bool {
        self.w == 1 && self.h == 1
    }
}

/// Encodes a `width`×`height` coefficient plane.
pub fn encode_ezbc(plane: &[i16], width: usize, height: usize) -> Vec<u8> {
    debug_assert_eq!(plane.len(), width * height);

    let max_mag = plane.iter().map(|v| u32::from(v.unsigned_abs())).max().unwrap_or(0);
    if max_mag == 0 {
        return vec![EMPTY_PLANE];
    }
    let top_plane = 31 - max_mag.leading_zeros() as u8;

    let mut out = vec![top_plane];
    let mut writer = BitWriter::endian(&mut out, BigEndian);
    let root = Rect { x: 0, y: 0, w: width, h: height };

    for bitplane in (0..=top_plane).rev() {
        let threshold = 1u32 << bitplane;
        encode_sig_pass(&mut writer, plane, width, root, threshold);
        // Refinement: coefficients that were significant before this plane.
        for &value in plane.iter() {
            let mag = u32::from(value.unsigned_abs());
            if mag >= threshold << 1 {
                writer.write_bit(mag & threshold != 0).unwrap();
            }
        }
    }

    writer.byte_align().unwrap();
    drop(writer);
    out
}

fn encode_sig_pass<W: std::io::Write>(
    writer: &mut BitWriter<W, BigEndian>,
    plane: &[i16],
    width: usize,
    rect: Rect,
    threshold: u32,
) {
    if rect.is_empty() {
        return;
    }
    let max = rect_max(plane, width, rect);
    if max >= threshold << 1 {
        // Already significant at a coarser plane: no node bit, descend.
        if !rect.is_leaf() {
            for child in rect.children() {
                encode_sig_pass(writer, plane, width, child, threshold);
            }
        }
        return;
    }

    let becomes = max >= threshold;
    writer.write_bit(becomes).unwrap();
    if !becomes {
        return;
    }
    if rect.is_leaf() {
        let value = plane[rect.y * width + rect.x];
        writer.write_bit(value < 0).unwrap();
    } else {
        for child in rect.children() {
            encode_sig_pass(writer, plane, width, child, threshold);
        }
    }
}

fn rect_max(plane: &[i16], width: usize, rect: Rect) -> u32 {
    let mut max = 0u32;
    for y in rect.y..rect.y + rect.h {
        for x in rect.x..rect.x + rect.w {
            max = max.max(u32::from(plane[y * width + x].unsigned_abs()));
        }
    }
    max
}

/// Decodes a `width`×`height` coefficient plane.
pub fn decode_ezbc(data: &[u8], width: usize, height: usize) -> Result<Vec<i16>> {
    let count = width * height;
    let Some((&top_plane, bits)) = data.split_first() else {
        return Err(Error::Truncated);
    };
    if top_plane == EMPTY_PLANE {
        return Ok(vec![0i16; count]);
    }
    if top_plane > 15 {
        return Err(Error::InvalidBitplane(top_plane));
    }

    let mut reader = BitReader::endian(Cursor::new(bits), BigEndian);
    let mut magnitudes = vec![0u32; count];
    let mut negative = vec![false; count];
    let root = Rect { x: 0, y: 0, w: width, h: height };

    for bitplane in (0..=top_plane).rev() {
        let threshold = 1u32 << bitplane;
        // Snapshot of which coefficients were significant before this
        // plane; the significance pass must not see its own insertions.
        let sig_before: Vec<bool> = magnitudes.iter().map(|&m| m > 0).collect();
        decode_sig_pass(
            &mut reader,
            &mut magnitudes,
            &mut negative,
            &sig_before,
            width,
            root,
            threshold,
        )?;
        for (i, was_significant) in sig_before.iter().enumerate() {
            if *was_significant && reader.read_bit()? {
                magnitudes[i] |= threshold;
            }
        }
    }

    Ok(magnitudes
        .iter()
        .zip(&negative)
        .map(|(&mag, &neg)| {
            let value = if neg { -(mag as i32) } else { mag as i32 };
            value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
        })
        .collect())
}

fn decode_sig_pass<R: std::io::Read>(
    reader: &mut BitReader<R, BigEndian>,
    magnitudes: &mut [u32],
    negative: &mut [bool],
    sig_before: &[bool],
    width: usize,
    rect: Rect,
    threshold: u32,
) -> Result<()> {
    if rect.is_empty() {
        return Ok(());
    }
    if rect_any_significant(sig_before, width, rect) {
        if !rect.is_leaf() {
            for child in rect.children() {
                decode_sig_pass(reader, magnitudes, negative, sig_before, width, child, threshold)?;
            }
        }
        return Ok(());
    }

    if !reader.read_bit()? {
        return Ok(());
    }
    if rect.is_leaf() {
        let index = rect.y * width + rect.x;
        magnitudes[index] = threshold;
        negative[index] = reader.read_bit()?;
    } else {
        for child in rect.children() {
            decode_sig_pass(reader, magnitudes, negative, sig_before, width, child, threshold)?;
        }
    }
    Ok(())
}

fn rect_any_significant(sig_before: &[bool], width: usize, rect: Rect) -> bool {
    (rect.y..rect.y + rect.h)
        .any(|y| (rect.x..rect.x + rect.w).any(|x| sig_before[y * width + x]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(plane: &[i16], width: usize, height: usize) {
        let encoded = encode_ezbc(plane, width, height);
        let decoded = decode_ezbc(&encoded, width, height).unwrap();
        assert_eq!(decoded, plane);
    }

    #[test]
    fn all_zero_plane_is_one_byte() {
        let plane = vec![0i16; 64];
        let encoded = encode_ezbc(&plane, 8, 8);
        assert_eq!(encoded, vec![0xFF]);
        assert_eq!(decode_ezbc(&encoded, 8, 8).unwrap(), plane);
    }

    #[test]
    fn round_trips_sparse_plane() {
        let mut plane = vec![0i16; 16 * 16];
        plane[0] = 1000;
        plane[5] = -3;
        plane[100] = 1;
        plane[255] = -32768;
        round_trip(&plane, 16, 16);
    }

    #[test]
    fn round_trips_dense_plane() {
        let plane: Vec<i16> = (0..24 * 17)
            .map(|i| (((i * 2654435761u64) >> 7) % 4001) as i16 - 2000)
            .collect();
        round_trip(&plane, 24, 17);
    }

    #[test]
    fn round_trips_single_coefficient() {
        round_trip(&[-7], 1, 1);
        round_trip(&[0], 1, 1);
        round_trip(&[i16::MAX], 1, 1);
    }

    #[test]
    fn round_trips_odd_rectangles() {
        let plane: Vec<i16> = (0..13 * 7).map(|i| ((i % 5) as i16 - 2) * 100).collect();
        round_trip(&plane, 13, 7);
        round_trip(&plane[..21], 3, 7);
        round_trip(&plane[..21], 21, 1);
    }

    #[test]
    fn truncated_stream_is_detected() {
        let mut plane = vec![0i16; 256];
        for (i, value) in plane.iter_mut().enumerate() {
            *value = (i as i16 % 7) * 31 - 93;
        }
        let encoded = encode_ezbc(&plane, 16, 16);
        assert!(matches!(
            decode_ezbc(&encoded[..encoded.len() / 2], 16, 16),
            Err(Error::Truncated)
        ));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(decode_ezbc(&[], 4, 4), Err(Error::Truncated)));
    }
}
