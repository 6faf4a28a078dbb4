//! Forward error correction primitives for the TAV-DT tape format.
//!
//! Three independent pieces: the reflected CRC-32 that seals DT headers,
//! a systematic rate-1/2 LDPC code with a bit-flipping decoder for the
//! headers themselves, and Reed-Solomon(255,223) over GF(2^8) for the
//! payloads.

mod crc32;
mod ldpc;
mod rs;

pub use crc32::crc32;
pub use ldpc::{ldpc_decode, ldpc_encode, LDPC_MAX_DATA_BYTES, LDPC_MAX_ITERATIONS};
pub use rs::{
    rs_decode, rs_decode_blocks, rs_encode, rs_encode_blocks, RS_BLOCK_SIZE, RS_DATA_SIZE,
    RS_MAX_ERRORS, RS_PARITY_SIZE,
};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The LDPC bit-flipping decoder did not converge. The best-effort
    /// data bytes are carried so framing can still proceed.
    #[error("LDPC decode did not converge")]
    LdpcUndecodable { best_effort: Vec<u8> },

    /// A Reed-Solomon block holds more errors than the code can correct.
    #[error("Reed-Solomon block uncorrectable")]
    RsUncorrectable,

    /// Input length outside what the codec accepts.
    #[error("invalid block length {0}")]
    BadLength(usize),
}
