//! `tav-tool`: encode, decode and inspect TAV and TAV-DT streams.
//!
//! Frame input and output are raw RGB24 (pipe them to or from a media
//! tool); audio is raw interleaved stereo PCM16LE at 32 kHz.

mod decode;
mod dt;
mod encode;
mod inspect;
mod orchestrator;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tav-tool", version, about)]
struct Opt {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode raw RGB24 frames (and optionally PCM16 audio) into a TAV
    /// file.
    Encode(EncodeOpt),
    /// Decode a TAV file back to raw RGB24 frames (and PCM16 audio).
    Decode(DecodeOpt),
    /// Walk a TAV or TAV-DT stream and describe every packet.
    Inspect(InspectOpt),
    /// Encode raw frames and audio into a TAV-DT tape stream.
    DtPack(DtPackOpt),
    /// Decode a TAV-DT tape stream to raw frames and audio.
    DtUnpack(DtUnpackOpt),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum WaveletOpt {
    Cdf53,
    Cdf97,
    Cdf137,
    Dd4,
    Haar,
}

impl WaveletOpt {
    fn to_container(self) -> tav_container::WaveletFilter {
        match self {
            Self::Cdf53 => tav_container::WaveletFilter::Cdf53,
            Self::Cdf97 => tav_container::WaveletFilter::Cdf97,
            Self::Cdf137 => tav_container::WaveletFilter::Cdf137,
            Self::Dd4 => tav_container::WaveletFilter::Dd4,
            Self::Haar => tav_container::WaveletFilter::Haar,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EntropyOpt {
    Twobit,
    Ezbc,
    Raw,
}

impl EntropyOpt {
    fn to_container(self) -> tav_container::EntropyCoder {
        match self {
            Self::Twobit => tav_container::EntropyCoder::TwobitMap,
            Self::Ezbc => tav_container::EntropyCoder::Ezbc,
            Self::Raw => tav_container::EntropyCoder::Raw,
        }
    }
}

#[derive(clap::Args, Debug)]
struct EncodeOpt {
    /// Raw RGB24 frame stream.
    input: PathBuf,

    /// Output TAV file.
    output: PathBuf,

    #[arg(long)]
    width: u16,

    #[arg(long)]
    height: u16,

    /// Integer frame rate; 0 encodes a still image.
    #[arg(long, default_value_t = 30)]
    fps: u8,

    /// Quality 0 (coarsest) to 5 (finest).
    #[arg(short, long, default_value_t = 3)]
    quality: u8,

    /// Lossless mode: forces the 5/3 wavelet and unit quantisers.
    #[arg(long)]
    lossless: bool,

    /// Use the ICtCp colour space instead of YCoCg-R.
    #[arg(long)]
    ictcp: bool,

    #[arg(long, value_enum, default_value_t = WaveletOpt::Cdf97)]
    wavelet: WaveletOpt,

    #[arg(long, value_enum, default_value_t = EntropyOpt::Twobit)]
    entropy: EntropyOpt,

    /// Spatial decomposition levels.
    #[arg(long, default_value_t = 4)]
    levels: u8,

    /// Frames per GOP-unified packet (8-24); 0 selects I/P coding.
    #[arg(long, default_value_t = 0)]
    gop: u8,

    /// Keyframe interval for I/P coding.
    #[arg(long, default_value_t = 60)]
    keyframe_interval: u32,

    /// Raw interleaved stereo PCM16LE audio at 32 kHz.
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Worker threads for GOP encoding; 0 = one per logical core.
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

#[derive(clap::Args, Debug)]
struct DecodeOpt {
    /// Input TAV file.
    input: PathBuf,

    /// Output raw RGB24 frame stream.
    output: PathBuf,

    /// Destination for decoded PCM16 audio, if the stream carries any.
    #[arg(long)]
    audio: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct InspectOpt {
    input: PathBuf,

    /// Only print the summary statistics.
    #[arg(long)]
    summary: bool,
}

#[derive(clap::Args, Debug)]
struct DtPackOpt {
    /// Raw RGB24 frame stream at the tape geometry.
    input: PathBuf,

    /// Output TAV-DT stream.
    output: PathBuf,

    /// Tape standard: NTSC (720x480) or PAL (720x576).
    #[arg(long, value_enum, default_value_t = StandardOpt::Ntsc)]
    standard: StandardOpt,

    #[arg(long, default_value_t = 30)]
    fps: u8,

    #[arg(short, long, default_value_t = 3)]
    quality: u8,

    /// Raw interleaved stereo PCM16LE audio at 32 kHz.
    #[arg(long)]
    audio: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct DtUnpackOpt {
    /// Input TAV-DT stream.
    input: PathBuf,

    /// Output raw RGB24 frame stream.
    output: PathBuf,

    /// Destination for decoded PCM16 audio.
    #[arg(long)]
    audio: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StandardOpt {
    Ntsc,
    Pal,
}

impl StandardOpt {
    fn to_dt(self) -> tsvm_tavdt::DtStandard {
        match self {
            Self::Ntsc => tsvm_tavdt::DtStandard::Ntsc,
            Self::Pal => tsvm_tavdt::DtStandard::Pal,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let opt = Opt::parse();
    match opt.command {
        Command::Encode(opt) => encode::run(opt),
        Command::Decode(opt) => decode::run(opt),
        Command::Inspect(opt) => inspect::run(opt),
        Command::DtPack(opt) => dt::pack(opt),
        Command::DtUnpack(opt) => dt::unpack(opt),
    }
}
