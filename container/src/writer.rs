//! Convenience writer that lays down the header and packet stream.

use std::io::{Seek, SeekFrom, Write};

use crate::extended::{keys, ExtendedHeader, KvValue};
use crate::{FileHeader, Packet, Result};

/// Writes a TAV stream: header first, then packets in submission order.
pub struct TavWriter<W> {
    output: W,
    /// Offset of the extended-header packet, when one was written, so the
    /// `ENDT` pair can be patched at finalisation.
    extended_offset: Option<u64>,
    extended: Option<ExtendedHeader>,
}

impl<W: Write> TavWriter<W> {
    pub fn create(mut output: W, header: &FileHeader) -> Result<Self> {
        header.write_to(&mut output)?;
        Ok(Self { output, extended_offset: None, extended: None })
    }

    pub fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        packet.write_to(&mut self.output)
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<W: Write + Seek> TavWriter<W> {
    /// Writes the extended header immediately (recommended right after the
    /// fixed header) and remembers its offset so [`TavWriter::finalize`]
    /// can patch the end-time pair in place.
    pub fn write_extended_header(&mut self, extended: ExtendedHeader) -> Result<()> {
        let offset = self.output.stream_position()?;
        Packet::ExtendedHeader(extended.clone()).write_to(&mut self.output)?;
        self.extended_offset = Some(offset);
        self.extended = Some(extended);
        Ok(())
    }

    /// Patches the `ENDT` pair (if the extended header carried one) and
    /// returns the underlying stream. The rewrite keeps the packet length
    /// identical, so the rest of the stream is untouched.
    pub fn finalize(mut self, end_time_ns: u64) -> Result<W> {
        if let (Some(offset), Some(mut extended)) = (self.extended_offset, self.extended.take()) {
            if extended.get(keys::ENDT).is_some() {
                extended.set(keys::ENDT, KvValue::U64(end_time_ns));
                let end = self.output.stream_position()?;
                self.output.seek(SeekFrom::Start(offset))?;
                Packet::ExtendedHeader(extended).write_to(&mut self.output)?;
                self.output.seek(SeekFrom::Start(end))?;
            }
        }
        self.output.flush()?;
        Ok(self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ChannelLayout, EntropyCoder, ExtraFlags, TavReader, VideoFlags, WaveletFilter,
    };
    use std::io::Cursor;

    #[test]
    fn end_time_is_patched_in_place() {
        let header = FileHeader {
            version: 1,
            width: 8,
            height: 8,
            fps: 10,
            total_frames: 1,
            wavelet_filter: WaveletFilter::Cdf53,
            decomp_levels: 2,
            quantiser_y: 0,
            quantiser_co: 0,
            quantiser_cg: 0,
            extra_flags: ExtraFlags::empty(),
            video_flags: VideoFlags::empty(),
            encoder_quality: 0,
            channel_layout: ChannelLayout::LumaChroma,
            entropy_coder: EntropyCoder::TwobitMap,
            encoder_preset: 0,
        };

        let mut extended = ExtendedHeader::new();
        extended.set(keys::BGNT, KvValue::U64(0));
        extended.set(keys::ENDT, KvValue::U64(0));

        let mut writer = TavWriter::create(Cursor::new(Vec::new()), &header).unwrap();
        writer.write_extended_header(extended).unwrap();
        writer.write_packet(&Packet::IFrame(vec![1, 2, 3])).unwrap();
        let cursor = writer.finalize(5_000_000_000).unwrap();

        let mut reader = TavReader::open(Cursor::new(cursor.into_inner())).unwrap();
        let ext = match reader.next_packet().unwrap().unwrap() {
            Packet::ExtendedHeader(ext) => ext,
            other => panic!("expected extended header, got {other:?}"),
        };
        assert_eq!(ext.get(keys::ENDT), Some(&KvValue::U64(5_000_000_000)));
        assert_eq!(reader.next_packet().unwrap(), Some(Packet::IFrame(vec![1, 2, 3])));
    }
}
