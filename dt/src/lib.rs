//! TAV-DT: the headerless "digital tape" streaming variant of TAV.
//!
//! A DT stream is a run of fixed-layout packets, each opened by a
//! big-endian sync pattern and protected end to end: LDPC rate-1/2 on the
//! sub-headers, Reed-Solomon(255,223) on the payloads. There is no file
//! header; geometry comes from the sync pattern and the codec parameters
//! are fixed by the format.

mod demux;
mod error;
mod mux;

pub use demux::{DtPacket, DtReader, DtStats, DtSubPacket};
pub use error::{Error, Result};
pub use mux::DtWriter;

use tav_container::{ChannelLayout, EntropyCoder, WaveletFilter};
use tsvm_codec_tav::CodecParams;

/// NTSC main sync, 720×480.
pub const SYNC_NTSC: u32 = 0xE353_7A1F;
/// PAL main sync, 720×576.
pub const SYNC_PAL: u32 = 0xD193_A745;
/// Sync pattern opening the TAV sub-packet inside a DT packet.
pub const SYNC_TAV_SUBPACKET: u32 = 0xA3F7_C91E;

pub const MAIN_HEADER_RAW: usize = 28;
pub const MAIN_HEADER_LDPC: usize = 56;
pub const SUB_HEADER_RAW: usize = 14;
pub const SUB_HEADER_LDPC: usize = 28;

/// Upper bound on `rs_block_count` accepted from a (possibly damaged)
/// sub-header before the packet is abandoned for resynchronisation.
pub const MAX_RS_BLOCKS: u32 = 16_384;

/// Quality index (0-5) → quantiser index per plane, from the reference
/// decoder's tables.
pub const QUALITY_Y: [u8; 7] = [79, 47, 23, 11, 5, 2, 0];
pub const QUALITY_CO: [u8; 7] = [123, 108, 91, 76, 59, 29, 3];
pub const QUALITY_CG: [u8; 7] = [148, 133, 113, 99, 76, 39, 5];

/// Tape geometry, derived from the main sync pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtStandard {
    Ntsc,
    Pal,
}

impl DtStandard {
    pub fn from_sync(sync: u32) -> Option<Self> {
        match sync {
            SYNC_NTSC => Some(Self::Ntsc),
            SYNC_PAL => Some(Self::Pal),
            _ => None,
        }
    }

    pub fn sync_pattern(self) -> u32 {
        match self {
            Self::Ntsc => SYNC_NTSC,
            Self::Pal => SYNC_PAL,
        }
    }

    pub fn dimensions(self) -> (usize, usize) {
        match self {
            Self::Ntsc => (720, 480),
            Self::Pal => (720, 576),
        }
    }
}

/// The fixed codec parameters of a DT stream: CDF 9/7 spatial at 4 levels,
/// Haar temporal at 2 levels, EZBC, YCoCg-R, perceptual quantisation at
/// the given quality index. Nothing of this is stored per packet.
pub fn video_params(standard: DtStandard, quality: u8) -> CodecParams {
    let (width, height) = standard.dimensions();
    let q = usize::from(quality.min(5));
    CodecParams {
        width,
        height,
        wavelet_filter: WaveletFilter::Cdf97,
        decomp_levels: 4,
        temporal_filter: WaveletFilter::Haar,
        temporal_levels: 2,
        entropy_coder: EntropyCoder::Ezbc,
        channel_layout: ChannelLayout::LumaChroma,
        quantiser: [QUALITY_Y[q], QUALITY_CO[q], QUALITY_CG[q]],
        perceptual: true,
        ictcp: false,
        lossless: false,
        monoblock: true,
        dead_zone: 0.15,
        zstd_level: Some(15),
    }
}
