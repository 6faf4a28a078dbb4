use std::io;
use thiserror::Error;

/// Type returned by all container read/write operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The first eight bytes of the stream are not the TAV magic.
    #[error("not a TAV stream (bad magic)")]
    BadMagic,

    /// The header names a layout revision this implementation does not know.
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u8),

    /// A packet body ended before its declared size.
    #[error("truncated packet")]
    TruncatedPacket,

    /// An extended-header pair uses a value type that cannot be skipped.
    #[error("unknown extended header value type {0:#04x}")]
    UnknownValueType(u8),

    /// The header says `fps = 0xFF` but no `XFPS` pair is present.
    #[error("extended frame rate promised by the header but missing")]
    MissingExtendedFrameRate,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Maps an unexpected end of stream in the middle of a packet body to
    /// [`Error::TruncatedPacket`]; any other I/O failure passes through.
    pub(crate) fn from_body_io(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::TruncatedPacket
        } else {
            Error::Io(err)
        }
    }
}
