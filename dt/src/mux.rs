//! DT packet writer.

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::io::Write;

use tsvm_fec::{crc32, ldpc_encode, rs_encode_blocks};

use crate::{
    DtStandard, Error, Result, MAIN_HEADER_RAW, MAX_RS_BLOCKS, SUB_HEADER_RAW, SYNC_TAV_SUBPACKET,
};

/// Writes DT packets: one GOP of video plus its aligned audio chunk per
/// packet.
pub struct DtWriter<W> {
    output: W,
    standard: DtStandard,
    fps: u8,
    flags: u8,
}

impl<W: Write> DtWriter<W> {
    pub fn new(output: W, standard: DtStandard, fps: u8, interlaced: bool, quality: u8) -> Self {
        let mut flags = (quality.min(5)) << 4;
        if interlaced {
            flags |= 0x01;
        }
        if standard == DtStandard::Ntsc {
            flags |= 0x02;
        }
        Self { output, standard, fps, flags }
    }

    /// Writes one packet. `tad_chunk` is a serialised TAD chunk;
    /// `tav_body` is a compressed GOP volume (the body of an `0x12`
    /// packet) of `gop_size` frames.
    pub fn write_packet(
        &mut self,
        timecode_ns: u64,
        tad_chunk: &[u8],
        tad_sample_count: u16,
        tad_quant_bits: u8,
        tav_body: &[u8],
        gop_size: u8,
    ) -> Result<()> {
        let tad_rs = rs_encode_blocks(tad_chunk)?;
        let tav_rs = rs_encode_blocks(tav_body)?;
        for rs in [&tad_rs, &tav_rs] {
            if (rs.len() / 255) as u32 > MAX_RS_BLOCKS {
                return Err(Error::PayloadTooLarge(rs.len()));
            }
        }

        let sub_headers = 2 * (SUB_HEADER_RAW * 2);
        let packet_size = (sub_headers + tad_rs.len() + 4 + tav_rs.len()) as u32;
        let offset_to_video = (SUB_HEADER_RAW * 2 + tad_rs.len()) as u32;

        // Main header: fps, flags, reserved, size, timecode, video offset,
        // reserved, crc over everything before the crc field.
        let mut main = Vec::with_capacity(MAIN_HEADER_RAW);
        main.write_u8(self.fps)?;
        main.write_u8(self.flags)?;
        main.write_u16::<LittleEndian>(0)?;
        main.write_u32::<LittleEndian>(packet_size)?;
        main.write_u64::<LittleEndian>(timecode_ns)?;
        main.write_u32::<LittleEndian>(offset_to_video)?;
        main.write_u32::<LittleEndian>(0)?;
        let crc = crc32(&main);
        main.write_u32::<LittleEndian>(crc)?;

        let tad_header = sub_header(
            u32::from(tad_sample_count) | u32::from(tad_quant_bits) << 16,
            tad_chunk.len() as u32,
            (tad_rs.len() / 255) as u32,
        )?;
        let tav_header = sub_header(
            u32::from(gop_size),
            tav_body.len() as u32,
            (tav_rs.len() / 255) as u32,
        )?;

        self.output.write_u32::<BigEndian>(self.standard.sync_pattern())?;
        self.output.write_all(&ldpc_encode(&main)?)?;
        self.output.write_all(&ldpc_encode(&tad_header)?)?;
        self.output.write_all(&tad_rs)?;
        self.output.write_u32::<BigEndian>(SYNC_TAV_SUBPACKET)?;
        self.output.write_all(&ldpc_encode(&tav_header)?)?;
        self.output.write_all(&tav_rs)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

/// Builds a 14-byte sub-header: three leading ID bytes (sample count +
/// quant bits for TAD, GOP size + reserved for TAV), compressed size,
/// 24-bit RS block count and a CRC over the first ten bytes.
fn sub_header(id_bits: u32, compressed_size: u32, rs_blocks: u32) -> Result<Vec<u8>> {
    let mut header = Vec::with_capacity(SUB_HEADER_RAW);
    header.write_u8(id_bits as u8)?;
    header.write_u8((id_bits >> 8) as u8)?;
    header.write_u8((id_bits >> 16) as u8)?;
    header.write_u32::<LittleEndian>(compressed_size)?;
    header.write_u8(rs_blocks as u8)?;
    header.write_u8((rs_blocks >> 8) as u8)?;
    header.write_u8((rs_blocks >> 16) as u8)?;
    let crc = crc32(&header);
    header.write_u32::<LittleEndian>(crc)?;
    Ok(header)
}
