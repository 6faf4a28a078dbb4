//! Convenience reader owning a stream positioned at the start of a TAV file.

use std::io::Read;

use crate::{Error, ExtendedHeader, FileHeader, Packet, Result, MAGIC};

/// Parses the file header at construction and then yields packets in stream
/// order. Sync bytes are *not* filtered here; callers that only care about
/// payload packets can match them away.
pub struct TavReader<R> {
    input: R,
    header: FileHeader,
    /// The first extended header seen in the stream, kept for frame-rate
    /// resolution.
    extended: Option<ExtendedHeader>,
}

impl<R: Read> TavReader<R> {
    pub fn open(mut input: R) -> Result<Self> {
        let header = FileHeader::read_from(&mut input)?;
        Ok(Self { input, header, extended: None })
    }

    /// Like [`TavReader::open`], but scans byte by byte for the container
    /// magic first, so a stream with leading garbage (or a capture that
    /// starts mid-tape) can still be opened. Returns the reader and the
    /// number of bytes skipped. [`Error::BadMagic`] if the magic never
    /// appears.
    pub fn open_scanning(mut input: R) -> Result<(Self, u64)> {
        let mut window = [0u8; 8];
        let mut filled = 0usize;
        let mut skipped = 0u64;
        loop {
            if filled == 8 {
                if window == MAGIC {
                    break;
                }
                window.copy_within(1.., 0);
                filled = 7;
                skipped += 1;
            }
            let mut byte = [0u8; 1];
            match input.read_exact(&mut byte) {
                Ok(()) => {
                    window[filled] = byte[0];
                    filled += 1;
                }
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(Error::BadMagic);
                }
                Err(err) => return Err(err.into()),
            }
        }

        // The magic is already consumed; replay it in front of the rest
        // of the header.
        let header = FileHeader::read_from(&mut (&MAGIC[..]).chain(&mut input))?;
        Ok((Self { input, header, extended: None }, skipped))
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn extended_header(&self) -> Option<&ExtendedHeader> {
        self.extended.as_ref()
    }

    /// Reads the next packet, remembering extended headers as they pass.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        let packet = Packet::read_from(&mut self.input)?;
        if let Some(Packet::ExtendedHeader(ext)) = &packet {
            if self.extended.is_none() {
                self.extended = Some(ext.clone());
            }
        }
        Ok(packet)
    }

    /// Resolves the stream frame rate as a `num/den` fraction.
    ///
    /// A header `fps` of `0xFF` defers to the `XFPS` extended-header pair;
    /// if the pair has not been seen (or does not parse) this is
    /// [`Error::MissingExtendedFrameRate`]. A still image reports `0/1`.
    pub fn frame_rate(&self) -> Result<(u32, u32)> {
        match self.header.fps {
            0xFF => self
                .extended
                .as_ref()
                .and_then(|ext| ext.extended_frame_rate())
                .ok_or(Error::MissingExtendedFrameRate),
            fps => Ok((u32::from(fps), 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{keys, ChannelLayout, EntropyCoder, ExtraFlags, KvValue, VideoFlags, WaveletFilter};
    use std::io::Cursor;

    fn header_with_fps(fps: u8) -> FileHeader {
        FileHeader {
            version: 1,
            width: 64,
            height: 48,
            fps,
            total_frames: 2,
            wavelet_filter: WaveletFilter::Cdf53,
            decomp_levels: 3,
            quantiser_y: 0,
            quantiser_co: 0,
            quantiser_cg: 0,
            extra_flags: ExtraFlags::empty(),
            video_flags: VideoFlags::empty(),
            encoder_quality: 0,
            channel_layout: ChannelLayout::LumaChroma,
            entropy_coder: EntropyCoder::TwobitMap,
            encoder_preset: 0,
        }
    }

    #[test]
    fn reads_header_then_packets() {
        let mut buf = Vec::new();
        header_with_fps(30).write_to(&mut buf).unwrap();
        Packet::Sync.write_to(&mut buf).unwrap();
        Packet::IFrame(vec![1, 2]).write_to(&mut buf).unwrap();

        let mut reader = TavReader::open(Cursor::new(buf)).unwrap();
        assert_eq!(reader.header().width, 64);
        assert_eq!(reader.next_packet().unwrap(), Some(Packet::Sync));
        assert_eq!(reader.next_packet().unwrap(), Some(Packet::IFrame(vec![1, 2])));
        assert_eq!(reader.next_packet().unwrap(), None);
        assert_eq!(reader.frame_rate().unwrap(), (30, 1));
    }

    #[test]
    fn scanning_open_skips_leading_garbage() {
        let mut buf = vec![0xAB; 123];
        header_with_fps(25).write_to(&mut buf).unwrap();
        Packet::IFrame(vec![7]).write_to(&mut buf).unwrap();

        let (mut reader, skipped) = TavReader::open_scanning(Cursor::new(buf)).unwrap();
        assert_eq!(skipped, 123);
        assert_eq!(reader.header().fps, 25);
        assert_eq!(reader.next_packet().unwrap(), Some(Packet::IFrame(vec![7])));

        assert!(matches!(
            TavReader::open_scanning(Cursor::new(vec![0u8; 64])),
            Err(Error::BadMagic)
        ));
    }

    #[test]
    fn extended_frame_rate_resolution() {
        let mut buf = Vec::new();
        header_with_fps(0xFF).write_to(&mut buf).unwrap();
        let mut ext = ExtendedHeader::new();
        ext.set(keys::XFPS, KvValue::Bytes(b"24000/1001".to_vec()));
        Packet::ExtendedHeader(ext).write_to(&mut buf).unwrap();

        let mut reader = TavReader::open(Cursor::new(buf)).unwrap();
        assert!(matches!(reader.frame_rate(), Err(Error::MissingExtendedFrameRate)));
        reader.next_packet().unwrap();
        assert_eq!(reader.frame_rate().unwrap(), (24000, 1001));
    }
}
