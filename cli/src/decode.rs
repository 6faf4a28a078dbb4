//! TAV decoding front-end.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use anyhow::Context;
use tracing::{info, warn};

use tav_container::{Packet, TavReader, VideoFlags};
use tsvm_codec_tad as tad;
use tsvm_codec_tav::{CodecParams, TavDecoder};

use crate::DecodeOpt;

pub fn run(opt: DecodeOpt) -> anyhow::Result<()> {
    let input = BufReader::new(File::open(&opt.input).context("opening input")?);
    let mut reader = TavReader::open(input).context("parsing TAV header")?;
    let header = reader.header().clone();
    info!(
        width = header.width,
        height = header.height,
        version = header.version,
        total_frames = header.total_frames,
        "decoding TAV stream"
    );

    let params = CodecParams::from_header(&header);
    let mut decoder = TavDecoder::new(params);

    let mut video_out = BufWriter::new(File::create(&opt.output).context("creating output")?);
    let mut audio_out = opt
        .audio
        .as_ref()
        .map(|path| File::create(path).map(BufWriter::new))
        .transpose()
        .context("creating audio output")?;

    let mut frames_decoded = 0u64;
    let mut bytes_read_packets = 0u64;
    while let Some(packet) = reader.next_packet()? {
        match &packet {
            Packet::AudioTad { sample_count, chunk } => {
                bytes_read_packets += chunk.len() as u64;
                if let Some(audio_out) = audio_out.as_mut() {
                    let decoded = match tad::decode_chunk(chunk) {
                        Ok(decoded) => decoded,
                        Err(err) => {
                            warn!(error = %err, "TAD chunk undecodable, emitting silence");
                            tad::DecodedChunk::silence(usize::from(*sample_count))
                        }
                    };
                    write_pcm16(audio_out, &decoded.to_pcm16())?;
                }
            }
            Packet::Timecode { .. }
            | Packet::GopSync { .. }
            | Packet::Sync
            | Packet::SyncNtsc
            | Packet::NoOp => {}
            other => {
                let frames = decoder.decode_packet(other);
                for frame in frames {
                    video_out.write_all(&frame)?;
                    frames_decoded += 1;
                }
            }
        }
    }

    video_out.flush()?;
    if let Some(mut audio_out) = audio_out {
        audio_out.flush()?;
    }

    if frames_decoded == 0
        && header.total_frames > 0
        && !header.video_flags.contains(VideoFlags::NO_VIDEO)
    {
        anyhow::bail!("{bytes_read_packets} payload bytes read but no frames decoded");
    }

    let stats = decoder.stats();
    info!(
        frames_decoded,
        skipped_packets = stats.skipped_packets,
        zstd_errors = stats.zstd_errors,
        entropy_errors = stats.entropy_errors,
        "decode complete"
    );
    Ok(())
}

pub(crate) fn write_pcm16<W: Write>(out: &mut W, samples: &[i16]) -> anyhow::Result<()> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    out.write_all(&bytes)?;
    Ok(())
}
