use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The Zstd layer rejected a frame payload.
    #[error("payload decompression failed: {0}")]
    Zstd(std::io::Error),

    #[error(transparent)]
    Entropy(#[from] tsvm_codec_entropy::Error),

    /// A frame blob ended before all channel streams were read.
    #[error("frame blob truncated")]
    TruncatedBlob,

    /// The mode byte of a frame blob is not SKIP/INTRA/DELTA.
    #[error("unknown frame mode {0:#04x}")]
    BadFrameMode(u8),

    /// A P-frame arrived before any reference frame was decoded.
    #[error("predicted frame without a reference")]
    MissingReference,

    /// A GOP packet's size is outside 8..=24 even after clamping.
    #[error("GOP size {0} out of range")]
    GopSizeOutOfRange(u8),
}
