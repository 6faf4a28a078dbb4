//! The twobit-map coder.
//!
//! One two-bit symbol per coefficient: `00` = 0, `01` = +1, `10` = -1,
//! `11` = escape. An escape is followed by the zig-zag mapped value in
//! 16-bit little-endian groups of 15 payload bits; bit 15 of a group marks
//! that another group follows. Symbols pack LSB-first.

use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, LittleEndian};
use std::io::Cursor;

use crate::{Error, Result};

const SYM_ZERO: u8 = 0b00;
const SYM_PLUS_ONE: u8 = 0b01;
const SYM_MINUS_ONE: u8 = 0b10;
const SYM_ESCAPE: u8 = 0b11;

fn zigzag(value: i16) -> u16 {
    ((value as u16) << 1) ^ ((value >> 15) as u16)
}

fn unzigzag(value: u16) -> i16 {
    ((value >> 1) as i16) ^ -((value & 1) as i16)
}

/// Encodes `values` into a byte-aligned twobit-map stream.
pub fn encode_twobit(values: &[i16]) -> Vec<u8> {
    let mut writer = BitWriter::endian(Vec::new(), LittleEndian);
    for &value in values {
        match value {
            0 => writer.write(2, SYM_ZERO).unwrap(),
            1 => writer.write(2, SYM_PLUS_ONE).unwrap(),
            -1 => writer.write(2, SYM_MINUS_ONE).unwrap(),
            other => {
                writer.write(2, SYM_ESCAPE).unwrap();
                let mut mapped = u32::from(zigzag(other));
                loop {
                    let payload = mapped & 0x7FFF;
                    mapped >>= 15;
                    let group = payload | if mapped != 0 { 0x8000 } else { 0 };
                    writer.write(16, group).unwrap();
                    if mapped == 0 {
                        break;
                    }
                }
            }
        }
    }
    writer.byte_align().unwrap();
    writer.into_writer()
}

/// Decodes exactly `count` coefficients from `data`.
pub fn decode_twobit(data: &[u8], count: usize) -> Result<Vec<i16>> {
    let mut reader = BitReader::endian(Cursor::new(data), LittleEndian);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let symbol: u8 = reader.read(2)?;
        values.push(match symbol {
            SYM_ZERO => 0,
            SYM_PLUS_ONE => 1,
            SYM_MINUS_ONE => -1,
            _ => {
                let mut mapped: u32 = 0;
                let mut shift = 0u32;
                loop {
                    let group: u32 = reader.read(16)?;
                    mapped |= (group & 0x7FFF) << shift;
                    if group & 0x8000 == 0 {
                        break;
                    }
                    shift += 15;
                    if shift > 30 {
                        return Err(Error::ValueOverflow);
                    }
                }
                if mapped > u32::from(u16::MAX) {
                    return Err(Error::ValueOverflow);
                }
                unzigzag(mapped as u16)
            }
        });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_maps_small_magnitudes_low() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(i16::MIN), u16::MAX);
        for v in [-3, -2, 2, 3, 100, -100, i16::MAX, i16::MIN] {
            assert_eq!(unzigzag(zigzag(v)), v);
        }
    }

    #[test]
    fn round_trips_mixed_streams() {
        let values: Vec<i16> = vec![
            0, 0, 1, -1, 0, 2, -2, 127, -128, 255, -256, 0, 1, 32767, -32768, 0, -1, 5000,
        ];
        let encoded = encode_twobit(&values);
        assert_eq!(decode_twobit(&encoded, values.len()).unwrap(), values);
    }

    #[test]
    fn zero_run_packs_four_per_byte() {
        let values = vec![0i16; 64];
        let encoded = encode_twobit(&values);
        assert_eq!(encoded.len(), 16);
        assert!(encoded.iter().all(|&b| b == 0));
        assert_eq!(decode_twobit(&encoded, 64).unwrap(), values);
    }

    #[test]
    fn escape_uses_one_group_for_i16_range() {
        // 2 bits + 16-bit group = 18 bits, byte-aligned to 3 bytes.
        let encoded = encode_twobit(&[1234]);
        assert_eq!(encoded.len(), 3);
    }

    #[test]
    fn truncated_stream_is_detected() {
        let encoded = encode_twobit(&[900, 900, 900]);
        assert!(matches!(
            decode_twobit(&encoded[..encoded.len() - 2], 3),
            Err(Error::Truncated)
        ));
    }

    #[test]
    fn empty_stream_decodes_zero_coefficients() {
        assert_eq!(decode_twobit(&[], 0).unwrap(), Vec::<i16>::new());
    }
}
