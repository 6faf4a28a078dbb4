//! The fixed 32-byte TAV file header.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::{Error, Result};

/// `\x1F` followed by `TSVMTAV`.
pub const MAGIC: [u8; 8] = [0x1F, b'T', b'S', b'V', b'M', b'T', b'A', b'V'];

/// Spatial wavelet filter selector (header byte 18).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveletFilter {
    /// LGT/CDF 5/3 reversible filter. The only filter valid for lossless
    /// streams.
    Cdf53,
    /// CDF 9/7 irreversible filter.
    Cdf97,
    /// CDF 13/7 filter.
    Cdf137,
    /// Deslauriers-Dubuc 4-point interpolating filter.
    Dd4,
    /// Haar butterfly.
    Haar,
}

impl WaveletFilter {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Cdf53),
            1 => Some(Self::Cdf97),
            2 => Some(Self::Cdf137),
            16 => Some(Self::Dd4),
            255 => Some(Self::Haar),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Cdf53 => 0,
            Self::Cdf97 => 1,
            Self::Cdf137 => 2,
            Self::Dd4 => 16,
            Self::Haar => 255,
        }
    }
}

/// Which coefficient planes a frame carries (header byte 26).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    LumaChroma,
    LumaChromaAlpha,
    Luma,
    LumaAlpha,
    Chroma,
    ChromaAlpha,
}

impl ChannelLayout {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::LumaChroma),
            1 => Some(Self::LumaChromaAlpha),
            2 => Some(Self::Luma),
            3 => Some(Self::LumaAlpha),
            4 => Some(Self::Chroma),
            5 => Some(Self::ChromaAlpha),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::LumaChroma => 0,
            Self::LumaChromaAlpha => 1,
            Self::Luma => 2,
            Self::LumaAlpha => 3,
            Self::Chroma => 4,
            Self::ChromaAlpha => 5,
        }
    }

    /// Number of coefficient planes carried per frame.
    pub fn plane_count(self) -> usize {
        match self {
            Self::Luma => 1,
            Self::LumaAlpha | Self::Chroma => 2,
            Self::LumaChroma | Self::ChromaAlpha => 3,
            Self::LumaChromaAlpha => 4,
        }
    }
}

/// Coefficient entropy coder selector (header byte 27).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyCoder {
    TwobitMap,
    Ezbc,
    Raw,
}

impl EntropyCoder {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::TwobitMap),
            1 => Some(Self::Ezbc),
            2 => Some(Self::Raw),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::TwobitMap => 0,
            Self::Ezbc => 1,
            Self::Raw => 2,
        }
    }
}

bitflags::bitflags! {
    /// Header byte 23.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExtraFlags: u8 {
        const HAS_AUDIO = 0b0000_0001;
        const HAS_SUBTITLES = 0b0000_0010;
        const PROGRESSIVE_TRANSMISSION = 0b0000_0100;
        const ROI_CODING = 0b0000_1000;
    }
}

bitflags::bitflags! {
    /// Header byte 24.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VideoFlags: u8 {
        const INTERLACED = 0b0000_0001;
        const NTSC_FRAMERATE = 0b0000_0010;
        const LOSSLESS = 0b0000_0100;
        const NO_ZSTD = 0b0001_0000;
        const NO_VIDEO = 0b1000_0000;
    }
}

/// The parsed 32-byte file header. Immutable for the lifetime of a session
/// once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Layout revision. Base versions 1-8 select the colour space
    /// (odd = YCoCg-R, even = ICtCp), the tiling mode (3-6 = monoblock) and
    /// the quantiser shape (5-8 = perceptual); versions 9-16 are the same
    /// with a CDF 5/3 temporal wavelet instead of Haar.
    pub version: u8,
    pub width: u16,
    pub height: u16,
    /// Integer frame rate. `0` marks a still image, `0xFF` defers to the
    /// `XFPS` pair of the extended header.
    pub fps: u8,
    pub total_frames: u32,
    pub wavelet_filter: WaveletFilter,
    pub decomp_levels: u8,
    pub quantiser_y: u8,
    pub quantiser_co: u8,
    pub quantiser_cg: u8,
    pub extra_flags: ExtraFlags,
    pub video_flags: VideoFlags,
    /// `0` = not recorded, otherwise `quality + 1`.
    pub encoder_quality: u8,
    pub channel_layout: ChannelLayout,
    pub entropy_coder: EntropyCoder,
    /// Opaque encoder hint bits (sports, anime); never consulted on decode.
    pub encoder_preset: u8,
}

impl FileHeader {
    pub const SIZE: usize = 32;

    /// The version with the temporal-wavelet bias removed.
    pub fn base_version(&self) -> u8 {
        if self.version > 8 {
            self.version - 8
        } else {
            self.version
        }
    }

    /// Whether frames are coded as a single full-frame transform block.
    pub fn is_monoblock(&self) -> bool {
        (3..=6).contains(&self.base_version())
    }

    /// Whether subband quantiser steps carry perceptual weighting.
    pub fn is_perceptual(&self) -> bool {
        (5..=8).contains(&self.base_version())
    }

    /// Whether the colour space is ICtCp rather than YCoCg-R.
    pub fn is_ictcp(&self) -> bool {
        self.base_version() % 2 == 0
    }

    /// Temporal wavelet used by GOP-unified packets.
    pub fn temporal_filter(&self) -> WaveletFilter {
        if self.version > 8 {
            WaveletFilter::Cdf53
        } else {
            WaveletFilter::Haar
        }
    }

    pub fn is_still_image(&self) -> bool {
        self.fps == 0
    }

    pub fn has_extended_frame_rate(&self) -> bool {
        self.fps == 0xFF
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::BadMagic);
        }

        let version = r.read_u8()?;
        if version == 0 || version > 16 {
            return Err(Error::UnsupportedVersion(version));
        }

        let width = r.read_u16::<LittleEndian>()?;
        let height = r.read_u16::<LittleEndian>()?;
        let fps = r.read_u8()?;
        let total_frames = r.read_u32::<LittleEndian>()?;
        let wavelet = r.read_u8()?;
        let wavelet_filter =
            WaveletFilter::from_u8(wavelet).ok_or(Error::UnsupportedVersion(version))?;
        let decomp_levels = r.read_u8()?;
        let quantiser_y = r.read_u8()?;
        let quantiser_co = r.read_u8()?;
        let quantiser_cg = r.read_u8()?;
        let extra_flags = ExtraFlags::from_bits_retain(r.read_u8()?);
        let video_flags = VideoFlags::from_bits_retain(r.read_u8()?);
        let encoder_quality = r.read_u8()?;
        let channel_layout = ChannelLayout::from_u8(r.read_u8()?)
            .ok_or(Error::UnsupportedVersion(version))?;
        let entropy_coder =
            EntropyCoder::from_u8(r.read_u8()?).ok_or(Error::UnsupportedVersion(version))?;
        let encoder_preset = r.read_u8()?;
        let mut reserved = [0u8; 3];
        r.read_exact(&mut reserved)?;

        Ok(Self {
            version,
            width,
            height,
            fps,
            total_frames,
            wavelet_filter,
            decomp_levels,
            quantiser_y,
            quantiser_co,
            quantiser_cg,
            extra_flags,
            video_flags,
            encoder_quality,
            channel_layout,
            entropy_coder,
            encoder_preset,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&MAGIC)?;
        w.write_u8(self.version)?;
        w.write_u16::<LittleEndian>(self.width)?;
        w.write_u16::<LittleEndian>(self.height)?;
        w.write_u8(self.fps)?;
        w.write_u32::<LittleEndian>(self.total_frames)?;
        w.write_u8(self.wavelet_filter.to_u8())?;
        w.write_u8(self.decomp_levels)?;
        w.write_u8(self.quantiser_y)?;
        w.write_u8(self.quantiser_co)?;
        w.write_u8(self.quantiser_cg)?;
        w.write_u8(self.extra_flags.bits())?;
        w.write_u8(self.video_flags.bits())?;
        w.write_u8(self.encoder_quality)?;
        w.write_u8(self.channel_layout.to_u8())?;
        w.write_u8(self.entropy_coder.to_u8())?;
        w.write_u8(self.encoder_preset)?;
        w.write_all(&[0u8; 3])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header() -> FileHeader {
        FileHeader {
            version: 7,
            width: 1280,
            height: 720,
            fps: 30,
            total_frames: 900,
            wavelet_filter: WaveletFilter::Cdf97,
            decomp_levels: 4,
            quantiser_y: 23,
            quantiser_co: 91,
            quantiser_cg: 113,
            extra_flags: ExtraFlags::HAS_AUDIO,
            video_flags: VideoFlags::empty(),
            encoder_quality: 3,
            channel_layout: ChannelLayout::LumaChroma,
            entropy_coder: EntropyCoder::TwobitMap,
            encoder_preset: 0,
        }
    }

    #[test]
    fn round_trips_through_bytes() {
        let header = sample_header();
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), FileHeader::SIZE);
        let parsed = FileHeader::read_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn still_image_header_matches_reference_bytes() {
        // 1x1 lossless still image, version 1, one frame.
        let header = FileHeader {
            version: 1,
            width: 1,
            height: 1,
            fps: 0,
            total_frames: 1,
            wavelet_filter: WaveletFilter::Cdf53,
            decomp_levels: 1,
            quantiser_y: 0,
            quantiser_co: 0,
            quantiser_cg: 0,
            extra_flags: ExtraFlags::empty(),
            video_flags: VideoFlags::LOSSLESS,
            encoder_quality: 0,
            channel_layout: ChannelLayout::LumaChroma,
            entropy_coder: EntropyCoder::TwobitMap,
            encoder_preset: 0,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(
            &buf[..14],
            &[0x1F, 0x54, 0x53, 0x56, 0x4D, 0x54, 0x41, 0x56, 0x01, 0x01, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(&buf[14..18], &[0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; 32];
        buf[0] = 0x1F;
        assert!(matches!(
            FileHeader::read_from(&mut Cursor::new(&buf)),
            Err(Error::BadMagic)
        ));
    }

    #[test]
    fn version_semantics() {
        let mut header = sample_header();
        assert!(header.is_perceptual());
        assert!(!header.is_monoblock());
        assert!(!header.is_ictcp());
        assert_eq!(header.temporal_filter(), WaveletFilter::Haar);

        header.version = 14; // base 6: ICtCp monoblock perceptual, 5/3 temporal
        assert_eq!(header.base_version(), 6);
        assert!(header.is_monoblock());
        assert!(header.is_perceptual());
        assert!(header.is_ictcp());
        assert_eq!(header.temporal_filter(), WaveletFilter::Cdf53);
    }
}
