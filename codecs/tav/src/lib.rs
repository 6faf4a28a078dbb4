//! The TAV wavelet video codec.
//!
//! The container crate moves packets; this crate turns frame packets into
//! pixels and back. The pipeline per channel is colour transform → (tiled
//! or whole-frame) spatial DWT → perceptual dead-zone quantisation →
//! entropy coding → Zstd, with an optional temporal DWT across a GOP.

mod color;
mod decoder;
mod encoder;
mod error;
mod frame;
mod gop;
mod params;
mod quant;
mod tile;

pub use color::{ictcp_to_rgb_pixels, rgb_to_ictcp_planes, rgb_to_ycocg_planes, ycocg_to_rgb_pixels};
pub use decoder::{DecodedFrames, TavDecoder};
pub use encoder::TavEncoder;
pub use error::{Error, Result};
pub use frame::FrameMode;
pub use params::{CodecParams, CodecStats};
pub use quant::{dequantise_plane, quantise_plane, QLUT};

/// GOP-unified packets carry between 8 and 24 frames.
pub const GOP_SIZE_MIN: u8 = 8;
pub const GOP_SIZE_MAX: u8 = 24;
