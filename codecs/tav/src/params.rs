//! Codec-level parameters, derived from (but independent of) the container
//! header so the codec can also run under TAV-DT, which has no header.

use tav_container::{ChannelLayout, EntropyCoder, FileHeader, VideoFlags, WaveletFilter};
use tsvm_codec_dwt::Filter;

/// Default Zstd level for frame payloads.
pub const ZSTD_LEVEL: i32 = 15;

/// Frames no larger than one tile core are transformed as a single block;
/// anything bigger goes through the tile engine.
pub const MONOBLOCK_MAX_WIDTH: usize = 640;
pub const MONOBLOCK_MAX_HEIGHT: usize = 540;

pub(crate) fn dwt_filter(filter: WaveletFilter) -> Filter {
    match filter {
        WaveletFilter::Cdf53 => Filter::Cdf53,
        WaveletFilter::Cdf97 => Filter::Cdf97,
        WaveletFilter::Cdf137 => Filter::Cdf137,
        WaveletFilter::Dd4 => Filter::Dd4,
        WaveletFilter::Haar => Filter::Haar,
    }
}

/// Everything the codec needs to encode or decode one stream.
#[derive(Debug, Clone)]
pub struct CodecParams {
    pub width: usize,
    pub height: usize,
    pub wavelet_filter: WaveletFilter,
    pub decomp_levels: u8,
    pub temporal_filter: WaveletFilter,
    pub temporal_levels: u8,
    pub entropy_coder: EntropyCoder,
    pub channel_layout: ChannelLayout,
    /// Base quantiser indices for the Y/Co/Cg (or I/Ct/Cp) planes.
    pub quantiser: [u8; 3],
    pub perceptual: bool,
    pub ictcp: bool,
    pub lossless: bool,
    /// Single-block transforms declared by the stream (header versions
    /// 3-6; always set for DT tapes), even above the tile threshold.
    pub monoblock: bool,
    /// Dead-zone fraction applied to detail subbands.
    pub dead_zone: f32,
    /// `None` = payloads are stored raw (`video_flags` bit 4).
    pub zstd_level: Option<i32>,
}

impl CodecParams {
    pub fn from_header(header: &FileHeader) -> Self {
        let lossless = header.video_flags.contains(VideoFlags::LOSSLESS);
        Self {
            width: usize::from(header.width),
            height: usize::from(header.height),
            wavelet_filter: header.wavelet_filter,
            decomp_levels: header.decomp_levels,
            temporal_filter: header.temporal_filter(),
            temporal_levels: 2,
            entropy_coder: header.entropy_coder,
            channel_layout: header.channel_layout,
            quantiser: [header.quantiser_y, header.quantiser_co, header.quantiser_cg],
            perceptual: header.is_perceptual() && !lossless,
            ictcp: header.is_ictcp(),
            lossless,
            monoblock: header.is_monoblock(),
            dead_zone: if lossless { 0.0 } else { 0.15 },
            zstd_level: if header.video_flags.contains(VideoFlags::NO_ZSTD) {
                None
            } else {
                Some(ZSTD_LEVEL)
            },
        }
    }

    /// The header version byte matching these parameters. Base versions 1-8
    /// encode colour space, tiling and quantiser shape; 9-16 add the CDF
    /// 5/3 temporal wavelet.
    pub fn header_version(&self, monoblock: bool) -> u8 {
        let base = match (monoblock, self.perceptual) {
            (false, false) => 1,
            (true, false) => 3,
            (true, true) => 5,
            (false, true) => 7,
        } + u8::from(self.ictcp);
        if self.temporal_filter == WaveletFilter::Cdf53 {
            base + 8
        } else {
            base
        }
    }

    /// Whether frames are transformed without tiling: either the stream
    /// declares monoblock layout, or the frame fits inside one tile core
    /// so there is nothing to split.
    pub fn is_monoblock(&self) -> bool {
        self.monoblock
            || (self.width <= MONOBLOCK_MAX_WIDTH && self.height <= MONOBLOCK_MAX_HEIGHT)
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn plane_count(&self) -> usize {
        self.channel_layout.plane_count()
    }

    /// Resolves the quantiser index for a plane, honouring a per-frame
    /// override byte (zero means "use the stream default").
    pub fn quantiser_for(&self, plane: usize, override_byte: u8) -> u8 {
        if override_byte != 0 {
            override_byte
        } else {
            self.quantiser[plane.min(2)]
        }
    }
}

/// Non-fatal error counters. Damaged packets are counted and skipped
/// rather than aborting the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecStats {
    pub zstd_errors: u64,
    pub entropy_errors: u64,
    pub skipped_packets: u64,
    pub quantiser_clamps: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tav_container::ExtraFlags;

    fn header() -> FileHeader {
        FileHeader {
            version: 7,
            width: 1280,
            height: 720,
            fps: 30,
            total_frames: 0,
            wavelet_filter: WaveletFilter::Cdf97,
            decomp_levels: 4,
            quantiser_y: 23,
            quantiser_co: 91,
            quantiser_cg: 113,
            extra_flags: ExtraFlags::empty(),
            video_flags: VideoFlags::empty(),
            encoder_quality: 0,
            channel_layout: ChannelLayout::LumaChroma,
            entropy_coder: EntropyCoder::TwobitMap,
            encoder_preset: 0,
        }
    }

    #[test]
    fn derives_parameters_from_header() {
        let params = CodecParams::from_header(&header());
        assert!(params.perceptual);
        assert!(!params.ictcp);
        assert!(!params.is_monoblock());
        assert_eq!(params.quantiser_for(0, 0), 23);
        assert_eq!(params.quantiser_for(0, 42), 42);
        assert_eq!(params.header_version(false), 7);
    }

    #[test]
    fn lossless_disables_perceptual_and_dead_zone() {
        let mut h = header();
        h.video_flags = VideoFlags::LOSSLESS;
        h.wavelet_filter = WaveletFilter::Cdf53;
        let params = CodecParams::from_header(&h);
        assert!(!params.perceptual);
        assert_eq!(params.dead_zone, 0.0);
    }

    #[test]
    fn monoblock_threshold_sits_at_one_tile_core() {
        let mut h = header();
        // Version 7 declares a tiled layout, so only the frame size decides.
        for (w, hgt, expected) in [
            (640u16, 540u16, true),
            (641, 540, false),
            (640, 541, false),
            (1, 1, true),
            (704, 576, false),
        ] {
            h.width = w;
            h.height = hgt;
            let params = CodecParams::from_header(&h);
            assert_eq!(params.is_monoblock(), expected, "{w}x{hgt}");
        }
    }

    #[test]
    fn declared_monoblock_wins_above_the_threshold() {
        let mut h = header();
        h.version = 5; // YCoCg monoblock perceptual
        h.width = 720;
        h.height = 576;
        assert!(h.is_monoblock());
        let params = CodecParams::from_header(&h);
        assert!(params.monoblock);
        assert!(params.is_monoblock());
        assert_eq!(params.header_version(params.is_monoblock()), 5);
    }

    #[test]
    fn version_byte_covers_the_table() {
        let mut params = CodecParams::from_header(&header());
        params.perceptual = false;
        params.ictcp = false;
        assert_eq!(params.header_version(false), 1);
        params.ictcp = true;
        assert_eq!(params.header_version(true), 4);
        params.perceptual = true;
        assert_eq!(params.header_version(true), 6);
        params.temporal_filter = WaveletFilter::Cdf53;
        assert_eq!(params.header_version(false), 16);
    }
}
