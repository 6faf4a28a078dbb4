//! Stream inspector: walks a TAV or TAV-DT stream and describes every
//! packet, then prints summary statistics.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use anyhow::Context;

use tav_container::{MetadataKind, Packet, TavReader, WaveletFilter};
use tsvm_codec_tav::QLUT;
use tsvm_tavdt::{DtReader, DtStandard};

use crate::InspectOpt;

pub fn run(opt: InspectOpt) -> anyhow::Result<()> {
    let mut file = File::open(&opt.input).context("opening input")?;
    let mut probe = [0u8; 4];
    file.read_exact(&mut probe).context("reading stream probe")?;
    file.seek(SeekFrom::Start(0))?;

    if DtStandard::from_sync(u32::from_be_bytes(probe)).is_some() {
        inspect_dt(file, &opt)
    } else {
        inspect_tav(file, &opt)
    }
}

#[derive(Default)]
struct Totals {
    packets: u64,
    iframes: u64,
    pframes: u64,
    gops: u64,
    gop_frames: u64,
    audio_packets: u64,
    video_bytes: u64,
    audio_bytes: u64,
    subtitles: u64,
    metadata: u64,
    sync: u64,
    unknown: u64,
}

fn inspect_tav(file: File, opt: &InspectOpt) -> anyhow::Result<()> {
    let mut reader = TavReader::open(BufReader::new(file)).context("parsing TAV header")?;
    let header = reader.header().clone();

    let wavelet_name = match header.wavelet_filter {
        WaveletFilter::Cdf53 => "LGT 5/3",
        WaveletFilter::Cdf97 => "CDF 9/7",
        WaveletFilter::Cdf137 => "CDF 13/7",
        WaveletFilter::Dd4 => "DD-4",
        WaveletFilter::Haar => "Haar",
    };
    let layout_name = ["Luma-Chroma", "Luma-Chroma-Alpha", "Luma", "Luma-Alpha", "Chroma", "Chroma-Alpha"]
        [usize::from(header.channel_layout.to_u8())];

    println!("TAV Header:");
    println!(
        "  Version:        {} ({}{}, {} temporal)",
        header.version,
        if header.is_ictcp() { "ICtCp" } else { "YCoCg" },
        if header.is_monoblock() { " monoblock" } else { " tiled" },
        if header.temporal_filter() == WaveletFilter::Haar { "Haar" } else { "CDF 5/3" },
    );
    println!("  Resolution:     {}x{}", header.width, header.height);
    match header.fps {
        0 => println!("  Frame rate:     (still image)"),
        0xFF => println!("  Frame rate:     (extended, see XFPS)"),
        fps => println!("  Frame rate:     {fps} fps"),
    }
    println!("  Total frames:   {}", header.total_frames);
    println!("  Wavelet:        {wavelet_name}, {} levels", header.decomp_levels);
    println!(
        "  Quantisers:     Y={} Co={} Cg={} (indices {},{},{})",
        QLUT[usize::from(header.quantiser_y)],
        QLUT[usize::from(header.quantiser_co)],
        QLUT[usize::from(header.quantiser_cg)],
        header.quantiser_y,
        header.quantiser_co,
        header.quantiser_cg,
    );
    println!("  Channel layout: {layout_name}");
    println!(
        "  Entropy coder:  {}",
        match header.entropy_coder.to_u8() {
            0 => "Twobit-map",
            1 => "EZBC",
            _ => "Raw",
        }
    );
    println!();

    let mut totals = Totals::default();
    let mut current_frame = 0u64;
    while let Some(packet) = reader.next_packet()? {
        describe(&packet, &mut totals, &mut current_frame, opt.summary);
    }

    print_totals(&totals);
    Ok(())
}

fn describe(packet: &Packet, totals: &mut Totals, current_frame: &mut u64, summary: bool) {
    let index = totals.packets;
    totals.packets += 1;
    let line = match packet {
        Packet::IFrame(body) => {
            totals.iframes += 1;
            totals.video_bytes += body.len() as u64;
            *current_frame += 1;
            format!("I-FRAME         size={}", body.len())
        }
        Packet::PFrame(body) => {
            totals.pframes += 1;
            totals.video_bytes += body.len() as u64;
            *current_frame += 1;
            format!("P-FRAME         size={}", body.len())
        }
        Packet::GopUnified(body) => {
            totals.gops += 1;
            totals.video_bytes += body.len() as u64;
            format!("GOP (3D DWT)    size={}", body.len())
        }
        Packet::GopUnifiedMotion(body) => {
            totals.gops += 1;
            totals.video_bytes += body.len() as u64;
            format!("GOP (motion)    size={}", body.len())
        }
        Packet::GopSync { frame_count } => {
            totals.gop_frames += u64::from(*frame_count);
            *current_frame += u64::from(*frame_count);
            format!("GOP SYNC        {frame_count} frames")
        }
        Packet::AudioMp2(body) => {
            totals.audio_packets += 1;
            totals.audio_bytes += body.len() as u64;
            format!("AUDIO MP2       size={}", body.len())
        }
        Packet::AudioPcm8(body) => {
            totals.audio_packets += 1;
            totals.audio_bytes += body.len() as u64;
            format!("AUDIO PCM8      size={}", body.len())
        }
        Packet::AudioTad { sample_count, chunk } => {
            totals.audio_packets += 1;
            totals.audio_bytes += chunk.len() as u64;
            format!("AUDIO TAD       samples={sample_count} size={}", chunk.len())
        }
        Packet::AudioTrack(body) => {
            totals.audio_packets += 1;
            totals.audio_bytes += body.len() as u64;
            format!("AUDIO TRACK     size={}", body.len())
        }
        Packet::Subtitle(sub) => {
            totals.subtitles += 1;
            let mut line = format!("SUBTITLE        index={} opcode={:#04x}", sub.index, sub.opcode);
            if let Some(tc) = sub.timecode_ns {
                line.push_str(&format!(" time={:.3}s", tc as f64 / 1e9));
            }
            line
        }
        Packet::Videotex(body) => {
            // The body is Zstd(rows, cols, attribute and character planes).
            match zstd::stream::decode_all(&body[..]) {
                Ok(grid) if grid.len() >= 2 => format!(
                    "VIDEOTEX        size={} grid={}x{}",
                    body.len(),
                    grid[1],
                    grid[0]
                ),
                _ => format!("VIDEOTEX        size={} (undecodable)", body.len()),
            }
        }
        Packet::MuxVideo { channel, keyframe, body } => {
            totals.video_bytes += body.len() as u64;
            format!(
                "MUX VIDEO       channel={channel} {} size={}",
                if *keyframe { "I" } else { "P" },
                body.len()
            )
        }
        Packet::Metadata { kind, body } => {
            totals.metadata += 1;
            let name = match kind {
                MetadataKind::Exif => "EXIF",
                MetadataKind::Id3v1 => "ID3v1",
                MetadataKind::Id3v2 => "ID3v2",
                MetadataKind::VorbisComment => "Vorbis",
                MetadataKind::CdText => "CD-Text",
            };
            format!("METADATA        {name} size={}", body.len())
        }
        Packet::ExtendedHeader(ext) => {
            format!("EXTENDED HDR    {} pairs", ext.pairs().len())
        }
        Packet::Timecode { timecode_ns } => {
            format!("TIMECODE        {:.6}s (frame {current_frame})", *timecode_ns as f64 / 1e9)
        }
        Packet::ScreenMask { frame, top, right, bottom, left } => {
            format!("SCREEN MASK     frame={frame} [{top},{right},{bottom},{left}]")
        }
        Packet::LoopStart => "LOOP START".to_string(),
        Packet::LoopEnd => "LOOP END".to_string(),
        Packet::Sync | Packet::SyncNtsc => {
            totals.sync += 1;
            return;
        }
        Packet::NoOp => "NO-OP".to_string(),
        Packet::Unknown { packet_type, body } => {
            totals.unknown += 1;
            format!("UNKNOWN {packet_type:#04x}  size={}", body.len())
        }
    };
    if !summary {
        println!("Packet {index}: {line}");
    }
}

fn print_totals(totals: &Totals) {
    println!();
    println!("Summary:");
    println!("  Packets:        {}", totals.packets);
    println!("  I-frames:       {}", totals.iframes);
    println!("  P-frames:       {}", totals.pframes);
    println!("  GOP packets:    {} ({} frames)", totals.gops, totals.gop_frames);
    println!("  Audio packets:  {}", totals.audio_packets);
    println!("  Subtitles:      {}", totals.subtitles);
    println!("  Metadata:       {}", totals.metadata);
    println!("  Sync bytes:     {}", totals.sync);
    println!("  Unknown:        {}", totals.unknown);
    println!("  Video bytes:    {}", totals.video_bytes);
    println!("  Audio bytes:    {}", totals.audio_bytes);
}

fn inspect_dt(file: File, opt: &InspectOpt) -> anyhow::Result<()> {
    let mut reader = DtReader::new(BufReader::new(file));
    let mut first = true;
    let mut index = 0u64;
    while let Some(packet) = reader.next_packet().context("reading DT stream")? {
        if first {
            let (width, height) = packet.standard.dimensions();
            println!("TAV-DT Header (Digital Tape):");
            println!("  Format:         {:?} {width}x{height}", packet.standard);
            println!(
                "  Frame rate:     {} fps{}",
                packet.fps,
                if packet.ntsc_rate { " (NTSC)" } else { "" }
            );
            println!("  Quality index:  {}", packet.quality);
            println!("  Codec:          CDF 9/7 x4 spatial, Haar x2 temporal, EZBC");
            println!();
            first = false;
        }
        if !opt.summary {
            println!(
                "Packet {index}: time={:.3}s tad[samples={} size={}] tav[gop={} size={}]",
                packet.timecode_ns as f64 / 1e9,
                packet.tad_sample_count,
                packet.tad.payload.as_ref().map_or(0, Vec::len),
                packet.gop_size,
                packet.tav.payload.as_ref().map_or(0, Vec::len),
            );
        }
        index += 1;
    }

    let stats = reader.stats();
    println!();
    println!("Summary:");
    println!("  Packets:        {}", stats.packets);
    println!("  CRC errors:     {}", stats.crc_errors);
    println!("  Sync losses:    {}", stats.sync_losses);
    println!("  LDPC failures:  {}", stats.ldpc_failures);
    println!("  RS failures:    {}", stats.rs_failures);
    println!("  RS corrected:   {} bytes", stats.rs_bytes_corrected);
    Ok(())
}
