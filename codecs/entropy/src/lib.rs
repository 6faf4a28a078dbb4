//! Entropy coders for quantised wavelet coefficients.
//!
//! Two schemes share this crate: the twobit-map significance coder (two
//! bits per coefficient with a variable-length escape) and EZBC, a
//! quadtree bitplane coder. Both are exact: decode reproduces the encoded
//! `i16` values bit for bit. Zstd is applied by the callers on top of
//! these streams, not here.

mod ezbc;
mod twobit;

pub use ezbc::{decode_ezbc, encode_ezbc};
pub use twobit::{decode_twobit, encode_twobit};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The coded stream ended before the declared coefficient count was
    /// reached.
    #[error("entropy stream truncated")]
    Truncated,

    /// An escape value does not fit the 16-bit coefficient range.
    #[error("escaped coefficient overflows i16")]
    ValueOverflow,

    /// An EZBC stream names a bitplane outside the representable range.
    #[error("invalid top bitplane {0}")]
    InvalidBitplane(u8),
}

impl From<std::io::Error> for Error {
    fn from(_: std::io::Error) -> Self {
        // The only I/O the coders perform is against in-memory buffers, so
        // every failure is an early end of input.
        Error::Truncated
    }
}

/// Plain little-endian `i16` serialisation, used when the container header
/// selects the raw coder.
pub fn encode_raw(values: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 2);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Inverse of [`encode_raw`].
pub fn decode_raw(data: &[u8], count: usize) -> Result<Vec<i16>> {
    if data.len() < count * 2 {
        return Err(Error::Truncated);
    }
    Ok(data[..count * 2]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}
