//! The extended key-value header (packet type `0xEF`).
//!
//! Carries creation time, encoder identification and similar metadata as
//! four-byte keys with typed values. Unknown keys round-trip verbatim.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::{Error, Result};

/// The keys this implementation knows about. Anything else is preserved
/// untouched.
pub mod keys {
    /// Stream begin time, nanoseconds.
    pub const BGNT: [u8; 4] = *b"BGNT";
    /// Stream end time, nanoseconds; patched at encode finalisation.
    pub const ENDT: [u8; 4] = *b"ENDT";
    /// Creation date, microseconds since the Unix epoch.
    pub const CDAT: [u8; 4] = *b"CDAT";
    /// Encoder vendor string.
    pub const VNDR: [u8; 4] = *b"VNDR";
    /// Media-pipeline identification string.
    pub const FMPG: [u8; 4] = *b"FMPG";
    /// Extended frame rate as an ASCII `num/den` fraction; consulted when
    /// the fixed header carries `fps = 0xFF`.
    pub const XFPS: [u8; 4] = *b"XFPS";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvValue {
    U64(u64),
    Bytes(Vec<u8>),
}

impl KvValue {
    fn type_byte(&self) -> u8 {
        match self {
            KvValue::U64(_) => 0x04,
            KvValue::Bytes(_) => 0x10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedHeader {
    pairs: Vec<([u8; 4], KvValue)>,
}

impl ExtendedHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pairs(&self) -> &[([u8; 4], KvValue)] {
        &self.pairs
    }

    /// Returns the first value stored under `key`.
    pub fn get(&self, key: [u8; 4]) -> Option<&KvValue> {
        self.pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Replaces the value under `key`, or appends it if absent.
    pub fn set(&mut self, key: [u8; 4], value: KvValue) {
        if let Some(slot) = self.pairs.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.pairs.push((key, value));
        }
    }

    /// Parses the `XFPS` pair into a `num/den` fraction, if present and
    /// well-formed.
    pub fn extended_frame_rate(&self) -> Option<(u32, u32)> {
        let bytes = match self.get(keys::XFPS)? {
            KvValue::Bytes(bytes) => bytes,
            KvValue::U64(_) => return None,
        };
        let text = std::str::from_utf8(bytes).ok()?;
        let (num, den) = text.trim_end_matches('\0').split_once('/')?;
        let num = num.trim().parse().ok()?;
        let den: u32 = den.trim().parse().ok()?;
        if den == 0 {
            return None;
        }
        Some((num, den))
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let count = r.read_u16::<LittleEndian>().map_err(Error::from_body_io)?;
        let mut pairs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut key = [0u8; 4];
            r.read_exact(&mut key).map_err(Error::from_body_io)?;
            let value_type = r.read_u8().map_err(Error::from_body_io)?;
            let value = match value_type {
                0x04 => KvValue::U64(r.read_u64::<LittleEndian>().map_err(Error::from_body_io)?),
                0x10 => {
                    let len = r.read_u16::<LittleEndian>().map_err(Error::from_body_io)?;
                    let mut bytes = vec![0u8; len as usize];
                    r.read_exact(&mut bytes).map_err(Error::from_body_io)?;
                    KvValue::Bytes(bytes)
                }
                other => return Err(Error::UnknownValueType(other)),
            };
            pairs.push((key, value));
        }
        Ok(Self { pairs })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u16::<LittleEndian>(self.pairs.len() as u16)?;
        for (key, value) in &self.pairs {
            w.write_all(key)?;
            w.write_u8(value.type_byte())?;
            match value {
                KvValue::U64(v) => w.write_u64::<LittleEndian>(*v)?,
                KvValue::Bytes(bytes) => {
                    w.write_u16::<LittleEndian>(bytes.len() as u16)?;
                    w.write_all(bytes)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_known_and_unknown_keys() {
        let mut header = ExtendedHeader::new();
        header.set(keys::CDAT, KvValue::U64(1_700_000_000_000_000));
        header.set(keys::VNDR, KvValue::Bytes(b"tav-tool 0.1.0".to_vec()));
        header.set(*b"ZZZZ", KvValue::Bytes(vec![1, 2, 3]));

        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        let parsed = ExtendedHeader::read_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.get(*b"ZZZZ"), Some(&KvValue::Bytes(vec![1, 2, 3])));
    }

    #[test]
    fn parses_extended_frame_rate() {
        let mut header = ExtendedHeader::new();
        header.set(keys::XFPS, KvValue::Bytes(b"30000/1001".to_vec()));
        assert_eq!(header.extended_frame_rate(), Some((30000, 1001)));

        header.set(keys::XFPS, KvValue::Bytes(b"garbage".to_vec()));
        assert_eq!(header.extended_frame_rate(), None);
    }

    #[test]
    fn rejects_unknown_value_type() {
        // count=1, key, value_type=0x07
        let bytes = [1, 0, b'A', b'B', b'C', b'D', 0x07];
        assert!(matches!(
            ExtendedHeader::read_from(&mut Cursor::new(&bytes)),
            Err(Error::UnknownValueType(0x07))
        ));
    }
}
