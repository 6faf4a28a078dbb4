//! The typed packet stream that follows the file header.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::extended::ExtendedHeader;
use crate::io::{read_exact_body, read_sized_body, read_u24, write_sized_body, write_u24};
use crate::{Error, Result};

/// Raw packet type bytes.
pub mod packet_type {
    pub const NOOP: u8 = 0x00;
    pub const IFRAME: u8 = 0x10;
    pub const PFRAME: u8 = 0x11;
    pub const GOP_UNIFIED: u8 = 0x12;
    pub const GOP_UNIFIED_MOTION: u8 = 0x13;
    pub const AUDIO_MP2: u8 = 0x20;
    pub const AUDIO_PCM8: u8 = 0x21;
    pub const AUDIO_TAD: u8 = 0x24;
    pub const SUBTITLE: u8 = 0x30;
    pub const SUBTITLE_TC: u8 = 0x31;
    pub const VIDEOTEX: u8 = 0x3F;
    pub const AUDIO_TRACK: u8 = 0x40;
    pub const MUX_VIDEO_FIRST: u8 = 0x70;
    pub const MUX_VIDEO_LAST: u8 = 0x7F;
    pub const EXIF: u8 = 0xE0;
    pub const ID3V1: u8 = 0xE1;
    pub const ID3V2: u8 = 0xE2;
    pub const VORBIS_COMMENT: u8 = 0xE3;
    pub const CD_TEXT: u8 = 0xE4;
    pub const EXTENDED_HDR: u8 = 0xEF;
    pub const LOOP_START: u8 = 0xF0;
    pub const LOOP_END: u8 = 0xF1;
    pub const SCREEN_MASK: u8 = 0xF2;
    pub const GOP_SYNC: u8 = 0xFC;
    pub const TIMECODE: u8 = 0xFD;
    pub const SYNC_NTSC: u8 = 0xFE;
    pub const SYNC: u8 = 0xFF;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Exif,
    Id3v1,
    Id3v2,
    VorbisComment,
    CdText,
}

impl MetadataKind {
    fn from_type(ty: u8) -> Option<Self> {
        match ty {
            packet_type::EXIF => Some(Self::Exif),
            packet_type::ID3V1 => Some(Self::Id3v1),
            packet_type::ID3V2 => Some(Self::Id3v2),
            packet_type::VORBIS_COMMENT => Some(Self::VorbisComment),
            packet_type::CD_TEXT => Some(Self::CdText),
            _ => None,
        }
    }

    fn type_byte(self) -> u8 {
        match self {
            Self::Exif => packet_type::EXIF,
            Self::Id3v1 => packet_type::ID3V1,
            Self::Id3v2 => packet_type::ID3V2,
            Self::VorbisComment => packet_type::VORBIS_COMMENT,
            Self::CdText => packet_type::CD_TEXT,
        }
    }
}

/// Parsed framing of a subtitle packet. The payload after the opcode is an
/// opaque blob (text for SHOW opcodes, glyph data for font uploads).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleBody {
    pub index: u32,
    /// Present for `SUBTITLE_TC` (0x31) packets only.
    pub timecode_ns: Option<u64>,
    pub opcode: u8,
    pub data: Vec<u8>,
}

/// One container packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    NoOp,
    /// Zstd-framed intra frame blob.
    IFrame(Vec<u8>),
    /// Zstd-framed predicted frame blob.
    PFrame(Vec<u8>),
    /// Zstd-framed GOP volume (`u8 gop_size` + coefficient volume inside).
    GopUnified(Vec<u8>),
    /// Like [`Packet::GopUnified`] with a motion-vector block prepended
    /// inside the compressed body.
    GopUnifiedMotion(Vec<u8>),
    AudioMp2(Vec<u8>),
    AudioPcm8(Vec<u8>),
    /// TAD audio chunk. `sample_count` repeats the chunk-internal count so
    /// the chunk can be skipped without parsing it.
    AudioTad { sample_count: u16, chunk: Vec<u8> },
    Subtitle(SubtitleBody),
    Videotex(Vec<u8>),
    AudioTrack(Vec<u8>),
    /// Multiplexed secondary video channel (types 0x70-0x7F). Carried but
    /// not decoded by this implementation.
    MuxVideo { channel: u8, keyframe: bool, body: Vec<u8> },
    Metadata { kind: MetadataKind, body: Vec<u8> },
    ExtendedHeader(ExtendedHeader),
    LoopStart,
    LoopEnd,
    ScreenMask { frame: u32, top: u16, right: u16, bottom: u16, left: u16 },
    GopSync { frame_count: u8 },
    Timecode { timecode_ns: u64 },
    SyncNtsc,
    Sync,
    /// A type byte this implementation does not know, skipped by its size
    /// field.
    Unknown { packet_type: u8, body: Vec<u8> },
}

impl Packet {
    /// Reads one packet. Returns `Ok(None)` on a clean end of stream (EOF
    /// exactly at a packet boundary); EOF inside a body is
    /// [`Error::TruncatedPacket`].
    pub fn read_from<R: Read>(r: &mut R) -> Result<Option<Self>> {
        let ty = match r.read_u8() {
            Ok(ty) => ty,
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Self::read_body(ty, r).map(Some)
    }

    fn read_body<R: Read>(ty: u8, r: &mut R) -> Result<Self> {
        Ok(match ty {
            packet_type::NOOP => Packet::NoOp,
            packet_type::SYNC => Packet::Sync,
            packet_type::SYNC_NTSC => Packet::SyncNtsc,
            packet_type::LOOP_START => Packet::LoopStart,
            packet_type::LOOP_END => Packet::LoopEnd,
            packet_type::IFRAME => Packet::IFrame(read_sized_body(r)?),
            packet_type::PFRAME => Packet::PFrame(read_sized_body(r)?),
            packet_type::GOP_UNIFIED => Packet::GopUnified(read_sized_body(r)?),
            packet_type::GOP_UNIFIED_MOTION => Packet::GopUnifiedMotion(read_sized_body(r)?),
            packet_type::AUDIO_MP2 => Packet::AudioMp2(read_sized_body(r)?),
            packet_type::AUDIO_PCM8 => Packet::AudioPcm8(read_sized_body(r)?),
            packet_type::AUDIO_TRACK => Packet::AudioTrack(read_sized_body(r)?),
            packet_type::VIDEOTEX => Packet::Videotex(read_sized_body(r)?),
            packet_type::AUDIO_TAD => {
                let sample_count = r.read_u16::<LittleEndian>().map_err(Error::from_body_io)?;
                let chunk_len = r.read_u32::<LittleEndian>().map_err(Error::from_body_io)?;
                let chunk = read_exact_body(r, chunk_len as usize)?;
                Packet::AudioTad { sample_count, chunk }
            }
            packet_type::SUBTITLE | packet_type::SUBTITLE_TC => {
                let body = read_sized_body(r)?;
                Packet::Subtitle(parse_subtitle(ty, &body)?)
            }
            packet_type::EXTENDED_HDR => Packet::ExtendedHeader(ExtendedHeader::read_from(r)?),
            packet_type::SCREEN_MASK => Packet::ScreenMask {
                frame: r.read_u32::<LittleEndian>().map_err(Error::from_body_io)?,
                top: r.read_u16::<LittleEndian>().map_err(Error::from_body_io)?,
                right: r.read_u16::<LittleEndian>().map_err(Error::from_body_io)?,
                bottom: r.read_u16::<LittleEndian>().map_err(Error::from_body_io)?,
                left: r.read_u16::<LittleEndian>().map_err(Error::from_body_io)?,
            },
            packet_type::GOP_SYNC => Packet::GopSync {
                frame_count: r.read_u8().map_err(Error::from_body_io)?,
            },
            packet_type::TIMECODE => Packet::Timecode {
                timecode_ns: r.read_u64::<LittleEndian>().map_err(Error::from_body_io)?,
            },
            ty if (packet_type::MUX_VIDEO_FIRST..=packet_type::MUX_VIDEO_LAST).contains(&ty) => {
                Packet::MuxVideo {
                    channel: (ty - packet_type::MUX_VIDEO_FIRST) / 2 + 2,
                    keyframe: ty % 2 == 0,
                    body: read_sized_body(r)?,
                }
            }
            ty => {
                if let Some(kind) = MetadataKind::from_type(ty) {
                    Packet::Metadata { kind, body: read_sized_body(r)? }
                } else {
                    // Unknown types carry a size field per the container
                    // skip-safety rule.
                    tracing::debug!(packet_type = ty, "skipping unknown packet type");
                    Packet::Unknown { packet_type: ty, body: read_sized_body(r)? }
                }
            }
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        match self {
            Packet::NoOp => w.write_u8(packet_type::NOOP)?,
            Packet::Sync => w.write_u8(packet_type::SYNC)?,
            Packet::SyncNtsc => w.write_u8(packet_type::SYNC_NTSC)?,
            Packet::LoopStart => w.write_u8(packet_type::LOOP_START)?,
            Packet::LoopEnd => w.write_u8(packet_type::LOOP_END)?,
            Packet::IFrame(body) => {
                w.write_u8(packet_type::IFRAME)?;
                write_sized_body(w, body)?;
            }
            Packet::PFrame(body) => {
                w.write_u8(packet_type::PFRAME)?;
                write_sized_body(w, body)?;
            }
            Packet::GopUnified(body) => {
                w.write_u8(packet_type::GOP_UNIFIED)?;
                write_sized_body(w, body)?;
            }
            Packet::GopUnifiedMotion(body) => {
                w.write_u8(packet_type::GOP_UNIFIED_MOTION)?;
                write_sized_body(w, body)?;
            }
            Packet::AudioMp2(body) => {
                w.write_u8(packet_type::AUDIO_MP2)?;
                write_sized_body(w, body)?;
            }
            Packet::AudioPcm8(body) => {
                w.write_u8(packet_type::AUDIO_PCM8)?;
                write_sized_body(w, body)?;
            }
            Packet::AudioTrack(body) => {
                w.write_u8(packet_type::AUDIO_TRACK)?;
                write_sized_body(w, body)?;
            }
            Packet::Videotex(body) => {
                w.write_u8(packet_type::VIDEOTEX)?;
                write_sized_body(w, body)?;
            }
            Packet::AudioTad { sample_count, chunk } => {
                w.write_u8(packet_type::AUDIO_TAD)?;
                w.write_u16::<LittleEndian>(*sample_count)?;
                w.write_u32::<LittleEndian>(chunk.len() as u32)?;
                w.write_all(chunk)?;
            }
            Packet::Subtitle(body) => {
                let ty = if body.timecode_ns.is_some() {
                    packet_type::SUBTITLE_TC
                } else {
                    packet_type::SUBTITLE
                };
                w.write_u8(ty)?;
                let mut framed = Vec::with_capacity(body.data.len() + 12);
                write_u24(&mut framed, body.index)?;
                if let Some(tc) = body.timecode_ns {
                    framed.write_u64::<LittleEndian>(tc)?;
                }
                framed.write_u8(body.opcode)?;
                framed.extend_from_slice(&body.data);
                write_sized_body(w, &framed)?;
            }
            Packet::MuxVideo { channel, keyframe, body } => {
                let base = packet_type::MUX_VIDEO_FIRST + (channel - 2) * 2;
                w.write_u8(if *keyframe { base } else { base + 1 })?;
                write_sized_body(w, body)?;
            }
            Packet::Metadata { kind, body } => {
                w.write_u8(kind.type_byte())?;
                write_sized_body(w, body)?;
            }
            Packet::ExtendedHeader(header) => {
                w.write_u8(packet_type::EXTENDED_HDR)?;
                header.write_to(w)?;
            }
            Packet::ScreenMask { frame, top, right, bottom, left } => {
                w.write_u8(packet_type::SCREEN_MASK)?;
                w.write_u32::<LittleEndian>(*frame)?;
                w.write_u16::<LittleEndian>(*top)?;
                w.write_u16::<LittleEndian>(*right)?;
                w.write_u16::<LittleEndian>(*bottom)?;
                w.write_u16::<LittleEndian>(*left)?;
            }
            Packet::GopSync { frame_count } => {
                w.write_u8(packet_type::GOP_SYNC)?;
                w.write_u8(*frame_count)?;
            }
            Packet::Timecode { timecode_ns } => {
                w.write_u8(packet_type::TIMECODE)?;
                w.write_u64::<LittleEndian>(*timecode_ns)?;
            }
            Packet::Unknown { packet_type, body } => {
                w.write_u8(*packet_type)?;
                write_sized_body(w, body)?;
            }
        }
        Ok(())
    }

    /// How many frames this packet advances the presentation clock.
    pub fn frame_advance(&self) -> u32 {
        match self {
            Packet::IFrame(_) | Packet::PFrame(_) => 1,
            Packet::GopSync { frame_count } => u32::from(*frame_count),
            _ => 0,
        }
    }
}

fn parse_subtitle(ty: u8, body: &[u8]) -> Result<SubtitleBody> {
    let timecoded = ty == packet_type::SUBTITLE_TC;
    let header_len = if timecoded { 12 } else { 4 };
    if body.len() < header_len {
        return Err(Error::TruncatedPacket);
    }
    let mut cursor = std::io::Cursor::new(body);
    let index = read_u24(&mut cursor)?;
    let timecode_ns = if timecoded {
        Some(cursor.read_u64::<LittleEndian>()?)
    } else {
        None
    };
    let opcode = cursor.read_u8()?;
    Ok(SubtitleBody {
        index,
        timecode_ns,
        opcode,
        data: body[header_len..].to_vec(),
    })
}
