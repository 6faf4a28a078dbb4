//! Reader and writer for the TAV packet container.
//!
//! A TAV file is a fixed 32-byte header followed by a stream of typed
//! packets until end of file. Everything that is not the header is a
//! packet; single-byte sync markers may appear between packets and are
//! skipped transparently.

mod error;
mod extended;
mod header;
mod io;
mod packet;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use extended::{ExtendedHeader, KvValue, keys};
pub use header::{
    ChannelLayout, EntropyCoder, ExtraFlags, FileHeader, VideoFlags, WaveletFilter, MAGIC,
};
pub use packet::{MetadataKind, Packet, SubtitleBody, packet_type};
pub use reader::TavReader;
pub use writer::TavWriter;
