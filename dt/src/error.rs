use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The very first packet of a stream failed its header CRC. Later CRC
    /// failures are only counted.
    #[error("first packet header CRC does not verify")]
    FirstPacketCorrupt,

    /// No sync pattern anywhere in the remaining input.
    #[error("no sync pattern found")]
    NoSync,

    /// Payload too large for the wire format.
    #[error("payload of {0} bytes exceeds the RS block budget")]
    PayloadTooLarge(usize),

    #[error(transparent)]
    Fec(#[from] tsvm_fec::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
