//! DT packet reader with byte-wise resynchronisation.

use byteorder::{ByteOrder, LittleEndian};
use std::io::Read;
use tracing::warn;

use tsvm_fec::{crc32, ldpc_decode, rs_decode_blocks};

use crate::{
    DtStandard, Error, Result, MAIN_HEADER_LDPC, MAX_RS_BLOCKS, SUB_HEADER_LDPC,
    SYNC_TAV_SUBPACKET,
};

/// Error counters accumulated over a stream; none of these stop decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DtStats {
    pub packets: u64,
    pub crc_errors: u64,
    pub sync_losses: u64,
    pub ldpc_failures: u64,
    pub rs_failures: u64,
    pub rs_bytes_corrected: u64,
}

/// One FEC-decoded sub-packet. `payload` is `None` when Reed-Solomon gave
/// up on it; callers substitute silence or repeat the reference frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtSubPacket {
    pub payload: Option<Vec<u8>>,
}

/// One demultiplexed DT packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtPacket {
    pub standard: DtStandard,
    pub fps: u8,
    pub interlaced: bool,
    pub ntsc_rate: bool,
    pub quality: u8,
    pub timecode_ns: u64,
    /// Serialised TAD chunk, when recoverable.
    pub tad: DtSubPacket,
    pub tad_sample_count: u16,
    pub tad_quant_bits: u8,
    /// Compressed GOP volume (an `0x12` packet body), when recoverable.
    pub tav: DtSubPacket,
    pub gop_size: u8,
}

/// Streaming DT demultiplexer. Every read scans to the next main sync, so
/// arbitrary garbage between packets only costs a `sync_losses` bump.
pub struct DtReader<R> {
    input: R,
    stats: DtStats,
}

impl<R: Read> DtReader<R> {
    pub fn new(input: R) -> Self {
        Self { input, stats: DtStats::default() }
    }

    pub fn stats(&self) -> DtStats {
        self.stats
    }

    /// Reads the next packet, resynchronising past damage. `Ok(None)` at
    /// end of stream.
    pub fn next_packet(&mut self) -> Result<Option<DtPacket>> {
        loop {
            let standard = match self.find_main_sync()? {
                Some(standard) => standard,
                None => return Ok(None),
            };
            match self.read_packet_after_sync(standard) {
                Ok(packet) => {
                    self.stats.packets += 1;
                    return Ok(Some(packet));
                }
                Err(PacketFault::Fatal(err)) => return Err(err),
                Err(PacketFault::Eof) => return Ok(None),
                Err(PacketFault::Lost) => {
                    // Framing gone; scan for the next sync.
                    self.stats.sync_losses += 1;
                    continue;
                }
            }
        }
    }

    /// Scans byte by byte until an NTSC or PAL sync pattern goes past.
    fn find_main_sync(&mut self) -> Result<Option<DtStandard>> {
        let mut window = [0u8; 4];
        let mut filled = 0usize;
        let mut slid = false;
        loop {
            if filled == 4 {
                let sync = u32::from_be_bytes(window);
                if let Some(standard) = DtStandard::from_sync(sync) {
                    if slid {
                        warn!("recovered sync after scanning past garbage");
                    }
                    return Ok(Some(standard));
                }
                window.copy_within(1.., 0);
                filled = 3;
                slid = true;
            }
            let mut byte = [0u8; 1];
            match self.input.read_exact(&mut byte) {
                Ok(()) => {
                    window[filled] = byte[0];
                    filled += 1;
                }
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn read_packet_after_sync(
        &mut self,
        standard: DtStandard,
    ) -> std::result::Result<DtPacket, PacketFault> {
        let main_raw = self.read_ldpc_block(MAIN_HEADER_LDPC)?;

        let crc_ok = crc32(&main_raw[..24]) == LittleEndian::read_u32(&main_raw[24..28]);
        if !crc_ok {
            if self.stats.packets == 0 {
                return Err(PacketFault::Fatal(Error::FirstPacketCorrupt));
            }
            self.stats.crc_errors += 1;
            warn!("main header CRC mismatch, continuing best-effort");
        }

        let fps = main_raw[0];
        let flags = main_raw[1];
        let timecode_ns = LittleEndian::read_u64(&main_raw[8..16]);

        // TAD sub-packet.
        let tad_raw = self.read_ldpc_block(SUB_HEADER_LDPC)?;
        let (tad_ids, tad_size, tad_blocks) = self.parse_sub_header(&tad_raw)?;
        let tad = self.read_rs_payload(tad_size, tad_blocks)?;

        // TAV sub-packet sync.
        let mut sync = [0u8; 4];
        self.read_exact(&mut sync)?;
        if u32::from_be_bytes(sync) != SYNC_TAV_SUBPACKET {
            warn!("TAV sub-packet sync missing");
            return Err(PacketFault::Lost);
        }

        let tav_raw = self.read_ldpc_block(SUB_HEADER_LDPC)?;
        let (tav_ids, tav_size, tav_blocks) = self.parse_sub_header(&tav_raw)?;
        let tav = self.read_rs_payload(tav_size, tav_blocks)?;

        Ok(DtPacket {
            standard,
            fps,
            interlaced: flags & 0x01 != 0,
            ntsc_rate: flags & 0x02 != 0,
            quality: flags >> 4 & 0x0F,
            timecode_ns,
            tad: DtSubPacket { payload: tad },
            tad_sample_count: (tad_ids & 0xFFFF) as u16,
            tad_quant_bits: (tad_ids >> 16) as u8,
            tav: DtSubPacket { payload: tav },
            gop_size: (tav_ids & 0xFF) as u8,
        })
    }

    /// Reads and LDPC-decodes a header block; decode failure is counted
    /// and the best-effort bytes are used.
    fn read_ldpc_block(&mut self, encoded_len: usize) -> std::result::Result<Vec<u8>, PacketFault> {
        let mut encoded = vec![0u8; encoded_len];
        self.read_exact(&mut encoded)?;
        match ldpc_decode(&encoded) {
            Ok(raw) => Ok(raw),
            Err(tsvm_fec::Error::LdpcUndecodable { best_effort }) => {
                self.stats.ldpc_failures += 1;
                warn!("LDPC header decode failed, using best-effort bytes");
                Ok(best_effort)
            }
            Err(err) => Err(PacketFault::Fatal(err.into())),
        }
    }

    /// Splits a raw sub-header into its ID bytes, compressed size and RS
    /// block count, checking the CRC and the block-count sanity bound.
    fn parse_sub_header(
        &mut self,
        raw: &[u8],
    ) -> std::result::Result<(u32, u32, u32), PacketFault> {
        let crc_ok = crc32(&raw[..10]) == LittleEndian::read_u32(&raw[10..14]);
        if !crc_ok {
            self.stats.crc_errors += 1;
            warn!("sub-header CRC mismatch");
        }
        let ids =
            u32::from(raw[0]) | u32::from(raw[1]) << 8 | u32::from(raw[2]) << 16;
        let size = LittleEndian::read_u32(&raw[3..7]);
        let blocks =
            u32::from(raw[7]) | u32::from(raw[8]) << 8 | u32::from(raw[9]) << 16;
        if blocks > MAX_RS_BLOCKS || u64::from(size) > u64::from(blocks) * 223 {
            warn!(blocks, size, "implausible sub-header, abandoning packet");
            return Err(PacketFault::Lost);
        }
        Ok((ids, size, blocks))
    }

    /// Reads `blocks` RS codewords and decodes them to `size` bytes.
    /// Uncorrectable payloads are consumed and reported as `None`.
    fn read_rs_payload(
        &mut self,
        size: u32,
        blocks: u32,
    ) -> std::result::Result<Option<Vec<u8>>, PacketFault> {
        let mut encoded = vec![0u8; blocks as usize * 255];
        self.read_exact(&mut encoded)?;
        match rs_decode_blocks(&mut encoded, size as usize) {
            Ok((payload, corrected)) => {
                self.stats.rs_bytes_corrected += corrected as u64;
                Ok(Some(payload))
            }
            Err(tsvm_fec::Error::RsUncorrectable) => {
                self.stats.rs_failures += 1;
                warn!("RS payload uncorrectable");
                Ok(None)
            }
            Err(err) => Err(PacketFault::Fatal(err.into())),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> std::result::Result<(), PacketFault> {
        self.input.read_exact(buf).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                PacketFault::Eof
            } else {
                PacketFault::Fatal(err.into())
            }
        })
    }
}

/// Internal disposition of a packet read attempt.
enum PacketFault {
    /// Framing lost; caller rescans for sync.
    Lost,
    /// Clean end of input mid-packet.
    Eof,
    Fatal(Error),
}
