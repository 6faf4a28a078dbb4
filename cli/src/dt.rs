//! TAV-DT packing and unpacking.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use anyhow::{bail, Context};
use tracing::{info, warn};

use tsvm_codec_tad as tad;
use tsvm_codec_tav::{TavDecoder, TavEncoder};
use tsvm_tavdt::{video_params, DtReader, DtWriter};

use crate::decode::write_pcm16;
use crate::{DtPackOpt, DtUnpackOpt};

/// Frames per DT packet; the tape format always carries one fixed-size
/// GOP per packet.
const DT_GOP_SIZE: usize = 8;

pub fn pack(opt: DtPackOpt) -> anyhow::Result<()> {
    if opt.fps == 0 || opt.fps == 0xFF {
        bail!("DT streams need a plain integer frame rate");
    }
    let standard = opt.standard.to_dt();
    let (width, height) = standard.dimensions();
    let params = video_params(standard, opt.quality);
    let frame_size = width * height * 3;

    let input = File::open(&opt.input).context("opening frame input")?;
    let total_frames = input.metadata()?.len() / frame_size as u64;
    if total_frames == 0 {
        bail!("input holds no complete {width}x{height} frame");
    }
    let mut frames_in = BufReader::new(input);

    let audio: Vec<i16> = match &opt.audio {
        Some(path) => std::fs::read(path)
            .context("reading audio input")?
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
        None => Vec::new(),
    };

    let mut writer = DtWriter::new(
        BufWriter::new(File::create(&opt.output).context("creating output")?),
        standard,
        opt.fps,
        false,
        opt.quality,
    );
    let mut encoder = TavEncoder::new(params);

    let samples_per_packet =
        (DT_GOP_SIZE as u64 * u64::from(tad::SAMPLE_RATE) / u64::from(opt.fps)) as usize;
    let mut audio_cursor = 0usize;
    let mut frame_index = 0u64;

    while frame_index < total_frames {
        let mut gop = Vec::with_capacity(DT_GOP_SIZE);
        while gop.len() < DT_GOP_SIZE {
            if frame_index + (gop.len() as u64) < total_frames {
                let mut frame = vec![0u8; frame_size];
                frames_in.read_exact(&mut frame)?;
                gop.push(frame);
            } else {
                // Pad the tail by repeating the last frame.
                let last = gop.last().cloned().unwrap_or_else(|| vec![0u8; frame_size]);
                gop.push(last);
            }
        }
        let frames_consumed = (total_frames - frame_index).min(DT_GOP_SIZE as u64);

        let tav_body = encoder.encode_gop(&gop)?;

        // One audio chunk per packet, padded with silence when the PCM
        // runs dry.
        let wanted = samples_per_packet.max(tad::MIN_CHUNK_SIZE) * tad::CHANNELS;
        let end = (audio_cursor + wanted).min(audio.len());
        let mut slice = audio[audio_cursor..end].to_vec();
        audio_cursor = end;
        slice.resize(wanted, 0);
        let chunk = tad::encode_chunk_pcm16(&slice, opt.quality, Some(tad::ZSTD_LEVEL))?;
        let sample_count = (slice.len() / tad::CHANNELS) as u16;
        let quant_bits = chunk[2];

        let timecode_ns = frame_index * 1_000_000_000 / u64::from(opt.fps);
        writer.write_packet(
            timecode_ns,
            &chunk,
            sample_count,
            quant_bits,
            &tav_body,
            DT_GOP_SIZE as u8,
        )?;
        frame_index += frames_consumed;
    }

    writer.into_inner().flush()?;
    info!(packets = frame_index.div_ceil(DT_GOP_SIZE as u64), "DT pack complete");
    Ok(())
}

pub fn unpack(opt: DtUnpackOpt) -> anyhow::Result<()> {
    let input = BufReader::new(File::open(&opt.input).context("opening input")?);
    let mut reader = DtReader::new(input);

    let mut video_out = BufWriter::new(File::create(&opt.output).context("creating output")?);
    let mut audio_out = opt
        .audio
        .as_ref()
        .map(|path| File::create(path).map(BufWriter::new))
        .transpose()
        .context("creating audio output")?;

    let mut decoder: Option<TavDecoder> = None;
    let mut frames_decoded = 0u64;

    while let Some(packet) = reader.next_packet().context("reading DT stream")? {
        let decoder = decoder.get_or_insert_with(|| {
            info!(
                standard = ?packet.standard,
                fps = packet.fps,
                quality = packet.quality,
                "first DT packet"
            );
            TavDecoder::new(video_params(packet.standard, packet.quality))
        });

        if let Some(audio_out) = audio_out.as_mut() {
            let decoded = match &packet.tad.payload {
                Some(chunk) => match tad::decode_chunk(chunk) {
                    Ok(decoded) => decoded,
                    Err(err) => {
                        warn!(error = %err, "TAD chunk undecodable, emitting silence");
                        tad::DecodedChunk::silence(usize::from(packet.tad_sample_count))
                    }
                },
                None => tad::DecodedChunk::silence(usize::from(packet.tad_sample_count)),
            };
            write_pcm16(audio_out, &decoded.to_pcm16())?;
        }

        match &packet.tav.payload {
            Some(body) => match decoder.decode_gop(body, false) {
                Ok(frames) => {
                    for frame in frames {
                        video_out.write_all(&frame)?;
                        frames_decoded += 1;
                    }
                }
                Err(err) => warn!(error = %err, "GOP undecodable, dropping packet"),
            },
            None => warn!("video payload lost to RS failure, dropping packet"),
        }
    }

    video_out.flush()?;
    if let Some(mut audio_out) = audio_out {
        audio_out.flush()?;
    }

    let stats = reader.stats();
    info!(
        frames_decoded,
        packets = stats.packets,
        crc_errors = stats.crc_errors,
        sync_losses = stats.sync_losses,
        rs_failures = stats.rs_failures,
        "DT unpack complete"
    );
    Ok(())
}
