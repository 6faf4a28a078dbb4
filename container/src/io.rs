//! Small helpers shared by the reader and writer.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::{Error, Result};

/// Reads a 24-bit little-endian unsigned integer.
pub fn read_u24<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 3];
    r.read_exact(&mut buf)?;
    Ok(u32::from(buf[0]) | u32::from(buf[1]) << 8 | u32::from(buf[2]) << 16)
}

/// Writes a 24-bit little-endian unsigned integer. The top byte of `value`
/// is discarded.
pub fn write_u24<W: Write>(w: &mut W, value: u32) -> std::io::Result<()> {
    w.write_all(&[value as u8, (value >> 8) as u8, (value >> 16) as u8])
}

/// Reads a length-prefixed (`u32`) body, mapping short reads to
/// [`Error::TruncatedPacket`].
pub fn read_sized_body<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let size = r.read_u32::<LittleEndian>().map_err(Error::from_body_io)?;
    read_exact_body(r, size as usize)
}

/// Reads exactly `len` bytes of packet body.
pub fn read_exact_body<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut body = vec![0u8; len];
    r.read_exact(&mut body).map_err(Error::from_body_io)?;
    Ok(body)
}

/// Writes a `u32` length prefix followed by the body.
pub fn write_sized_body<W: Write>(w: &mut W, body: &[u8]) -> Result<()> {
    w.write_u32::<LittleEndian>(body.len() as u32)?;
    w.write_all(body)?;
    Ok(())
}
