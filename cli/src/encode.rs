//! TAV encoding front-end.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};
use tracing::info;

use tav_container::{
    keys, ChannelLayout, ExtendedHeader, ExtraFlags, FileHeader, KvValue, Packet, TavWriter,
    VideoFlags, WaveletFilter,
};
use tsvm_codec_tad as tad;
use tsvm_codec_tav::{CodecParams, TavEncoder, GOP_SIZE_MAX, GOP_SIZE_MIN};
use tsvm_tavdt::{QUALITY_CG, QUALITY_CO, QUALITY_Y};

use crate::orchestrator;
use crate::EncodeOpt;

const VENDOR: &str = concat!("tav-tool ", env!("CARGO_PKG_VERSION"));

pub fn run(opt: EncodeOpt) -> anyhow::Result<()> {
    if opt.width == 0 || opt.height == 0 {
        bail!("frame dimensions must be non-zero");
    }
    if opt.width > 8192 || opt.height > 8192 {
        bail!("frame dimensions exceed the 8192x8192 maximum");
    }
    if opt.gop != 0 && !(GOP_SIZE_MIN..=GOP_SIZE_MAX).contains(&opt.gop) {
        bail!("GOP size must be 0 or within {GOP_SIZE_MIN}..={GOP_SIZE_MAX}");
    }

    let quality = opt.quality.min(5);
    let (wavelet, quantiser, video_flags) = if opt.lossless {
        (WaveletFilter::Cdf53, [0u8; 3], VideoFlags::LOSSLESS)
    } else {
        (
            opt.wavelet.to_container(),
            [
                QUALITY_Y[usize::from(quality)],
                QUALITY_CO[usize::from(quality)],
                QUALITY_CG[usize::from(quality)],
            ],
            VideoFlags::empty(),
        )
    };

    let params = CodecParams {
        width: usize::from(opt.width),
        height: usize::from(opt.height),
        wavelet_filter: wavelet,
        decomp_levels: opt.levels,
        temporal_filter: WaveletFilter::Haar,
        temporal_levels: 2,
        entropy_coder: opt.entropy.to_container(),
        channel_layout: ChannelLayout::LumaChroma,
        quantiser,
        perceptual: !opt.lossless,
        ictcp: opt.ictcp,
        lossless: opt.lossless,
        monoblock: false,
        dead_zone: if opt.lossless { 0.0 } else { 0.15 },
        zstd_level: Some(15),
    };

    let frame_size = params.pixel_count() * 3;
    let input = File::open(&opt.input).context("opening frame input")?;
    let input_len = input.metadata()?.len();
    let total_frames = (input_len / frame_size as u64) as u32;
    if total_frames == 0 {
        bail!("input holds no complete {}x{} frame", opt.width, opt.height);
    }
    let mut frames_in = BufReader::new(input);

    let audio = opt
        .audio
        .as_ref()
        .map(|path| read_pcm16(path))
        .transpose()?
        .unwrap_or_default();

    let mut extra_flags = ExtraFlags::empty();
    if !audio.is_empty() {
        extra_flags |= ExtraFlags::HAS_AUDIO;
    }

    let header = FileHeader {
        version: params.header_version(params.is_monoblock()),
        width: opt.width,
        height: opt.height,
        fps: opt.fps,
        total_frames,
        wavelet_filter: params.wavelet_filter,
        decomp_levels: params.decomp_levels,
        quantiser_y: params.quantiser[0],
        quantiser_co: params.quantiser[1],
        quantiser_cg: params.quantiser[2],
        extra_flags,
        video_flags,
        encoder_quality: quality + 1,
        channel_layout: params.channel_layout,
        entropy_coder: params.entropy_coder,
        encoder_preset: 0,
    };

    let out = BufWriter::new(File::create(&opt.output).context("creating output")?);
    let mut writer = TavWriter::create(out, &header)?;

    let now_us = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);
    let mut extended = ExtendedHeader::new();
    extended.set(keys::VNDR, KvValue::Bytes(VENDOR.as_bytes().to_vec()));
    extended.set(keys::CDAT, KvValue::U64(now_us));
    extended.set(keys::BGNT, KvValue::U64(0));
    extended.set(keys::ENDT, KvValue::U64(0));
    writer.write_extended_header(extended)?;

    let mut audio_feed = AudioFeed::new(&audio, opt.fps, quality);

    if opt.gop == 0 {
        encode_ip(&mut writer, &params, &mut frames_in, total_frames, &opt, &mut audio_feed)?;
    } else {
        encode_gops(&mut writer, &params, &mut frames_in, total_frames, &opt, &mut audio_feed)?;
    }

    audio_feed.flush(&mut writer)?;

    let end_ns = if opt.fps > 0 && opt.fps != 0xFF {
        u64::from(total_frames) * 1_000_000_000 / u64::from(opt.fps)
    } else {
        0
    };
    let mut out = writer.finalize(end_ns)?;
    out.flush()?;
    info!(total_frames, "encode complete");
    Ok(())
}

fn encode_ip<W: Write + Seek>(
    writer: &mut TavWriter<W>,
    params: &CodecParams,
    frames_in: &mut impl Read,
    total_frames: u32,
    opt: &EncodeOpt,
    audio: &mut AudioFeed<'_>,
) -> anyhow::Result<()> {
    let mut encoder = TavEncoder::new(params.clone());
    let frame_size = params.pixel_count() * 3;
    let mut frame = vec![0u8; frame_size];
    for index in 0..total_frames {
        frames_in.read_exact(&mut frame)?;
        audio.interleave_until(writer, index)?;
        let keyframe = index % opt.keyframe_interval.max(1) == 0;
        let body = if keyframe {
            encoder.encode_iframe(&frame)?
        } else {
            encoder.encode_pframe(&frame)?
        };
        let packet = if keyframe { Packet::IFrame(body) } else { Packet::PFrame(body) };
        writer.write_packet(&packet)?;
        writer.write_packet(&Packet::Sync)?;
    }
    Ok(())
}

fn encode_gops<W: Write + Seek>(
    writer: &mut TavWriter<W>,
    params: &CodecParams,
    frames_in: &mut impl Read,
    total_frames: u32,
    opt: &EncodeOpt,
    audio: &mut AudioFeed<'_>,
) -> anyhow::Result<()> {
    let frame_size = params.pixel_count() * 3;
    let gop_len = usize::from(opt.gop);

    // Group input frames into GOPs of the requested length; a short tail
    // is padded by repeating its last frame up to the minimum.
    let mut gops: Vec<Vec<Vec<u8>>> = Vec::new();
    let mut remaining = total_frames as usize;
    while remaining > 0 {
        let take = remaining.min(gop_len);
        let mut gop = Vec::with_capacity(gop_len);
        for _ in 0..take {
            let mut frame = vec![0u8; frame_size];
            frames_in.read_exact(&mut frame)?;
            gop.push(frame);
        }
        remaining -= take;
        while gop.len() < usize::from(GOP_SIZE_MIN) {
            let last = gop.last().cloned().unwrap_or_else(|| vec![0u8; frame_size]);
            gop.push(last);
        }
        gops.push(gop);
    }

    let mut frame_counter = 0u32;
    orchestrator::encode_gops(params, opt.threads, gops.into_iter(), |result| {
        audio.interleave_until(writer, frame_counter)?;
        writer.write_packet(&Packet::GopUnified(result.body))?;
        writer.write_packet(&Packet::GopSync { frame_count: result.frame_count })?;
        writer.write_packet(&Packet::Sync)?;
        frame_counter += u32::from(result.frame_count);
        Ok(())
    })
}

fn read_pcm16(path: &std::path::Path) -> anyhow::Result<Vec<i16>> {
    let bytes = std::fs::read(path).context("reading audio input")?;
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntropyOpt, WaveletOpt};
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tav-tool-test-{}-{name}", std::process::id()))
    }

    fn encode_one_black_frame(width: u16, height: u16, tag: &str) -> FileHeader {
        let input = temp_path(&format!("{tag}.rgb"));
        let output = temp_path(&format!("{tag}.tav"));
        std::fs::write(&input, vec![0u8; usize::from(width) * usize::from(height) * 3])
            .unwrap();

        run(EncodeOpt {
            input: input.clone(),
            output: output.clone(),
            width,
            height,
            fps: 30,
            quality: 3,
            lossless: false,
            ictcp: false,
            wavelet: WaveletOpt::Cdf97,
            entropy: EntropyOpt::Twobit,
            levels: 3,
            gop: 0,
            keyframe_interval: 60,
            audio: None,
            threads: 1,
        })
        .unwrap();

        let bytes = std::fs::read(&output).unwrap();
        let header = FileHeader::read_from(&mut &bytes[..]).unwrap();
        let _ = std::fs::remove_file(input);
        let _ = std::fs::remove_file(output);
        header
    }

    #[test]
    fn version_byte_tracks_the_transform_mode() {
        // One tile core exactly: transformed as a single block, and the
        // header must say so (version 5 = YCoCg monoblock perceptual).
        let monoblock = encode_one_black_frame(640, 540, "monoblock");
        assert_eq!(monoblock.version, 5);
        assert!(monoblock.is_monoblock());

        // Just past the tile core in both directions: tiled layout
        // (version 7 = YCoCg tiled perceptual).
        let tiled = encode_one_black_frame(704, 600, "tiled");
        assert_eq!(tiled.version, 7);
        assert!(!tiled.is_monoblock());
    }
}

/// Paces TAD chunks so that audio stays slightly ahead of the video
/// packets it accompanies.
struct AudioFeed<'a> {
    samples: &'a [i16],
    cursor: usize,
    samples_per_frame: u64,
    written_samples: u64,
    quality: u8,
}

impl<'a> AudioFeed<'a> {
    fn new(samples: &'a [i16], fps: u8, quality: u8) -> Self {
        let samples_per_frame = if fps == 0 || fps == 0xFF {
            0
        } else {
            u64::from(tad::SAMPLE_RATE) / u64::from(fps)
        };
        Self { samples, cursor: 0, samples_per_frame, written_samples: 0, quality }
    }

    /// Emits chunks until the audio clock covers `frame_index`.
    fn interleave_until<W: Write>(
        &mut self,
        writer: &mut TavWriter<W>,
        frame_index: u32,
    ) -> anyhow::Result<()> {
        if self.samples.is_empty() || self.samples_per_frame == 0 {
            return Ok(());
        }
        let target = u64::from(frame_index + 1) * self.samples_per_frame;
        while self.written_samples < target && self.cursor < self.samples.len() {
            self.write_chunk(writer, tad::DEFAULT_CHUNK_SIZE)?;
        }
        Ok(())
    }

    fn flush<W: Write>(&mut self, writer: &mut TavWriter<W>) -> anyhow::Result<()> {
        while self.cursor < self.samples.len() {
            self.write_chunk(writer, tad::DEFAULT_CHUNK_SIZE)?;
        }
        Ok(())
    }

    fn write_chunk<W: Write>(
        &mut self,
        writer: &mut TavWriter<W>,
        chunk_samples: usize,
    ) -> anyhow::Result<()> {
        let available = (self.samples.len() - self.cursor) / tad::CHANNELS;
        if available == 0 {
            // A trailing odd sample cannot form a stereo frame.
            self.cursor = self.samples.len();
            return Ok(());
        }
        let take = available.min(chunk_samples);
        let mut slice =
            self.samples[self.cursor..self.cursor + take * tad::CHANNELS].to_vec();
        self.cursor += take * tad::CHANNELS;
        // The codec floor is 1024 samples; zero-pad a short tail.
        if take < tad::MIN_CHUNK_SIZE {
            slice.resize(tad::MIN_CHUNK_SIZE * tad::CHANNELS, 0);
        }
        let sample_count = slice.len() / tad::CHANNELS;
        let chunk = tad::encode_chunk_pcm16(&slice, self.quality, Some(tad::ZSTD_LEVEL))?;
        writer.write_packet(&Packet::AudioTad {
            sample_count: sample_count as u16,
            chunk,
        })?;
        self.written_samples += take.max(tad::MIN_CHUNK_SIZE) as u64;
        Ok(())
    }
}
