//! TAD (Terrarum Advanced Audio): a lossy stereo codec built on a 9-level
//! 1-D CDF 9/7 wavelet over mid/side-decorrelated PCM, perceptual
//! quantisation and twobit-map entropy coding, packetised to align with
//! video frames.
//!
//! Chunk wire layout:
//!
//! ```text
//! u16 sample_count        samples per channel
//! u8  quant_bits          bit width of the largest |index| actually used
//! u32 payload_size        MSB set = payload is not Zstd-compressed
//! payload                 f32 quantiser scale, then the mid and side
//!                         twobit streams, each u32-length-prefixed
//! ```

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use thiserror::Error;
use tsvm_codec_dwt::{forward_multi_1d, inverse_multi_1d, Filter};
use tsvm_codec_entropy::{decode_twobit, encode_twobit};

pub const SAMPLE_RATE: u32 = 32_000;
pub const CHANNELS: usize = 2;
/// Chunks below this many samples per channel are rejected.
pub const MIN_CHUNK_SIZE: usize = 1024;
/// Default chunk length: roughly one second at 32 kHz.
pub const DEFAULT_CHUNK_SIZE: usize = 31_991;
pub const DWT_LEVELS: u8 = 9;
pub const ZSTD_LEVEL: i32 = 15;
pub const QUALITY_MAX: u8 = 5;

/// Subband gain normalisers for CDF 9/7 at 9 levels: LL first, then the
/// high bands from the deepest (31 Hz) to the finest (8 kHz).
const COEFF_SCALARS: [f32; 10] =
    [64.0, 45.255, 32.0, 22.627, 16.0, 11.314, 8.0, 5.657, 4.0, 2.828];

/// Base quantiser weights per subband, mid channel then side channel.
const BASE_WEIGHTS: [[f32; 10]; 2] = [
    [4.0, 2.0, 1.8, 1.6, 1.4, 1.2, 1.0, 1.0, 1.3, 2.0],
    [6.0, 5.0, 2.6, 2.4, 1.8, 1.3, 1.0, 1.0, 1.6, 3.2],
];

/// Quality level → largest quantiser index the scale is budgeted for.
const QUALITY_INDEX_CAPS: [u16; 6] = [21, 31, 44, 63, 89, 127];

/// Dead-zone fraction applied to the high bands.
const DEAD_ZONE: f32 = 0.08;

/// Bit set in `payload_size` when the payload bypasses Zstd.
const RAW_PAYLOAD_FLAG: u32 = 0x8000_0000;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("chunk truncated")]
    Truncated,

    #[error("chunk of {0} samples is below the {MIN_CHUNK_SIZE}-sample minimum")]
    ChunkTooShort(usize),

    #[error("chunk of {0} samples exceeds the 16-bit sample counter")]
    ChunkTooLong(usize),

    #[error("payload decompression failed: {0}")]
    Zstd(std::io::Error),

    #[error(transparent)]
    Entropy(#[from] tsvm_codec_entropy::Error),
}

/// One decoded chunk.
#[derive(Debug, Clone)]
pub struct DecodedChunk {
    /// Samples per channel.
    pub sample_count: usize,
    /// The `quant_bits` field as stored.
    pub quant_bits: u8,
    /// Interleaved stereo samples in `[-1, 1]`.
    pub samples: Vec<f32>,
    /// Bytes consumed from the input slice.
    pub bytes_consumed: usize,
}

impl DecodedChunk {
    /// Interleaved signed 16-bit PCM.
    pub fn to_pcm16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
            .collect()
    }

    /// Interleaved unsigned 8-bit PCM (silence at 128), the TAV-DT output
    /// format.
    pub fn to_pcmu8(&self) -> Vec<u8> {
        self.samples
            .iter()
            .map(|&s| ((s * 127.0) + 128.0).clamp(0.0, 255.0) as u8)
            .collect()
    }

    /// A silent chunk, emitted in place of undecodable audio.
    pub fn silence(sample_count: usize) -> Self {
        Self {
            sample_count,
            quant_bits: 0,
            samples: vec![0.0; sample_count * CHANNELS],
            bytes_consumed: 0,
        }
    }
}

/// Encodes interleaved stereo `f32` samples (`[-1, 1]`) into one chunk.
/// `zstd_level` of `None` stores the payload raw and flags it in the size
/// field.
pub fn encode_chunk(samples: &[f32], quality: u8, zstd_level: Option<i32>) -> Result<Vec<u8>> {
    let sample_count = samples.len() / CHANNELS;
    if sample_count < MIN_CHUNK_SIZE {
        return Err(Error::ChunkTooShort(sample_count));
    }
    if sample_count > usize::from(u16::MAX) {
        return Err(Error::ChunkTooLong(sample_count));
    }

    // Mid/side decorrelation.
    let mut mid = Vec::with_capacity(sample_count);
    let mut side = Vec::with_capacity(sample_count);
    for frame in samples.chunks_exact(CHANNELS) {
        mid.push((frame[0] + frame[1]) / 2.0);
        side.push((frame[0] - frame[1]) / 2.0);
    }

    forward_multi_1d(Filter::Cdf97, &mut mid, DWT_LEVELS);
    forward_multi_1d(Filter::Cdf97, &mut side, DWT_LEVELS);

    let cap = QUALITY_INDEX_CAPS[usize::from(quality.min(QUALITY_MAX))];
    let scale = 1.0 / f32::from(cap);

    let mut peak_index = 0u16;
    let mid_q = quantise_channel(&mid, 0, scale, &mut peak_index);
    let side_q = quantise_channel(&side, 1, scale, &mut peak_index);
    let quant_bits = (16 - peak_index.leading_zeros()) as u8;

    let mut payload = Vec::new();
    payload.write_f32::<LittleEndian>(scale).unwrap();
    let mid_stream = encode_twobit(&mid_q);
    payload.write_u32::<LittleEndian>(mid_stream.len() as u32).unwrap();
    payload.extend_from_slice(&mid_stream);
    let side_stream = encode_twobit(&side_q);
    payload.write_u32::<LittleEndian>(side_stream.len() as u32).unwrap();
    payload.extend_from_slice(&side_stream);

    let (payload, size_field) = match zstd_level {
        Some(level) => {
            let packed = zstd::stream::encode_all(&payload[..], level).map_err(Error::Zstd)?;
            let size = packed.len() as u32;
            (packed, size)
        }
        None => {
            let size = payload.len() as u32 | RAW_PAYLOAD_FLAG;
            (payload, size)
        }
    };

    let mut chunk = Vec::with_capacity(7 + payload.len());
    chunk.write_u16::<LittleEndian>(sample_count as u16).unwrap();
    chunk.push(quant_bits);
    chunk.write_u32::<LittleEndian>(size_field).unwrap();
    chunk.extend_from_slice(&payload);
    Ok(chunk)
}

/// Convenience wrapper over [`encode_chunk`] for interleaved PCM16 input.
pub fn encode_chunk_pcm16(samples: &[i16], quality: u8, zstd_level: Option<i32>) -> Result<Vec<u8>> {
    let normalised: Vec<f32> = samples.iter().map(|&s| f32::from(s) / 32768.0).collect();
    encode_chunk(&normalised, quality, zstd_level)
}

/// Decodes one chunk from the head of `data`.
pub fn decode_chunk(data: &[u8]) -> Result<DecodedChunk> {
    if data.len() < 7 {
        return Err(Error::Truncated);
    }
    let sample_count = usize::from(LittleEndian::read_u16(&data[0..2]));
    let quant_bits = data[2];
    let size_field = LittleEndian::read_u32(&data[3..7]);
    let raw = size_field & RAW_PAYLOAD_FLAG != 0;
    let payload_size = (size_field & !RAW_PAYLOAD_FLAG) as usize;
    if data.len() < 7 + payload_size {
        return Err(Error::Truncated);
    }
    let bytes_consumed = 7 + payload_size;
    let payload = &data[7..bytes_consumed];

    let payload = if raw {
        payload.to_vec()
    } else {
        zstd::stream::decode_all(payload).map_err(Error::Zstd)?
    };
    if payload.len() < 4 {
        return Err(Error::Truncated);
    }
    let scale = LittleEndian::read_f32(&payload[0..4]);

    let (mid_q, rest) = read_stream(&payload[4..], sample_count)?;
    let (side_q, _) = read_stream(rest, sample_count)?;

    let mut mid = dequantise_channel(&mid_q, 0, scale);
    let mut side = dequantise_channel(&side_q, 1, scale);
    inverse_multi_1d(Filter::Cdf97, &mut mid, DWT_LEVELS);
    inverse_multi_1d(Filter::Cdf97, &mut side, DWT_LEVELS);

    let mut samples = Vec::with_capacity(sample_count * CHANNELS);
    for (m, s) in mid.iter().zip(&side) {
        samples.push((m + s).clamp(-1.0, 1.0));
        samples.push((m - s).clamp(-1.0, 1.0));
    }

    Ok(DecodedChunk { sample_count, quant_bits, samples, bytes_consumed })
}

fn read_stream(data: &[u8], count: usize) -> Result<(Vec<i16>, &[u8])> {
    if data.len() < 4 {
        return Err(Error::Truncated);
    }
    let len = LittleEndian::read_u32(&data[0..4]) as usize;
    let rest = &data[4..];
    if rest.len() < len {
        return Err(Error::Truncated);
    }
    Ok((decode_twobit(&rest[..len], count)?, &rest[len..]))
}

/// Band index for coefficient `i` of an `n`-sample channel: 0 = LL, then
/// 1 (deepest high band) through 9 (finest).
fn band_of(i: usize, n: usize) -> usize {
    let mut lengths = [0usize; DWT_LEVELS as usize + 1];
    lengths[0] = n;
    for l in 1..=DWT_LEVELS as usize {
        lengths[l] = lengths[l - 1].div_ceil(2);
    }
    if i < lengths[DWT_LEVELS as usize] {
        return 0;
    }
    for l in (1..=DWT_LEVELS as usize).rev() {
        if i < lengths[l - 1] && i >= lengths[l] {
            return DWT_LEVELS as usize - l + 1;
        }
    }
    DWT_LEVELS as usize
}

fn quantise_channel(coeffs: &[f32], channel: usize, scale: f32, peak_index: &mut u16) -> Vec<i16> {
    let n = coeffs.len();
    coeffs
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let band = band_of(i, n);
            let step = BASE_WEIGHTS[channel][band] * scale;
            let dz = if band == 0 { 0.0 } else { DEAD_ZONE };
            let v = c / COEFF_SCALARS[band];
            let magnitude = ((v.abs() - step * dz).max(0.0) / step + 0.5).floor();
            let q = (magnitude.copysign(v) as i32).clamp(i32::from(i16::MIN), i32::from(i16::MAX))
                as i16;
            *peak_index = (*peak_index).max(q.unsigned_abs());
            q
        })
        .collect()
}

fn dequantise_channel(quantised: &[i16], channel: usize, scale: f32) -> Vec<f32> {
    let n = quantised.len();
    quantised
        .iter()
        .enumerate()
        .map(|(i, &q)| {
            let band = band_of(i, n);
            let step = BASE_WEIGHTS[channel][band] * scale;
            f32::from(q) * step * COEFF_SCALARS[band]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_stereo(sample_count: usize, freq: f32, amplitude: f32) -> Vec<f32> {
        let mut samples = Vec::with_capacity(sample_count * 2);
        for i in 0..sample_count {
            let t = i as f32 / SAMPLE_RATE as f32;
            let s = amplitude * (2.0 * std::f32::consts::PI * freq * t).sin();
            samples.push(s);
            samples.push(s);
        }
        samples
    }

    fn psnr(a: &[f32], b: &[f32]) -> f32 {
        let mse: f32 =
            a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>() / a.len() as f32;
        if mse == 0.0 {
            return f32::INFINITY;
        }
        10.0 * (1.0 / mse).log10()
    }

    #[test]
    fn one_khz_sine_round_trips_cleanly() {
        let input = sine_stereo(8192, 1000.0, 0.5);
        let chunk = encode_chunk(&input, 3, Some(ZSTD_LEVEL)).unwrap();
        let decoded = decode_chunk(&chunk).unwrap();
        assert_eq!(decoded.sample_count, 8192);
        assert_eq!(decoded.bytes_consumed, chunk.len());
        assert!(decoded.quant_bits <= 16);
        let quality = psnr(&input, &decoded.samples);
        assert!(quality > 28.0, "PSNR {quality} too low");
    }

    #[test]
    fn higher_quality_never_sounds_worse() {
        let input = sine_stereo(4096, 440.0, 0.7);
        let low = decode_chunk(&encode_chunk(&input, 0, None).unwrap()).unwrap();
        let high = decode_chunk(&encode_chunk(&input, 5, None).unwrap()).unwrap();
        assert!(psnr(&input, &high.samples) >= psnr(&input, &low.samples) - 0.5);
    }

    #[test]
    fn minimum_and_maximum_chunk_sizes_round_trip() {
        for count in [MIN_CHUNK_SIZE, usize::from(u16::MAX)] {
            let input = sine_stereo(count, 250.0, 0.25);
            let chunk = encode_chunk(&input, 4, Some(3)).unwrap();
            let decoded = decode_chunk(&chunk).unwrap();
            assert_eq!(decoded.sample_count, count);
            assert_eq!(decoded.samples.len(), count * CHANNELS);
        }
    }

    #[test]
    fn short_chunks_are_rejected() {
        let input = vec![0.0f32; 100 * CHANNELS];
        assert!(matches!(
            encode_chunk(&input, 3, None),
            Err(Error::ChunkTooShort(100))
        ));
    }

    #[test]
    fn raw_payload_flag_round_trips() {
        let input = sine_stereo(2048, 500.0, 0.3);
        let chunk = encode_chunk(&input, 3, None).unwrap();
        let size_field = LittleEndian::read_u32(&chunk[3..7]);
        assert!(size_field & RAW_PAYLOAD_FLAG != 0);
        let decoded = decode_chunk(&chunk).unwrap();
        assert!(psnr(&input, &decoded.samples) > 25.0);
    }

    #[test]
    fn silence_encodes_small_and_decodes_silent() {
        let input = vec![0.0f32; 2048 * CHANNELS];
        let chunk = encode_chunk(&input, 3, Some(ZSTD_LEVEL)).unwrap();
        assert!(chunk.len() < 128, "silence should compress to almost nothing");
        let decoded = decode_chunk(&chunk).unwrap();
        assert_eq!(decoded.quant_bits, 0);
        assert!(decoded.samples.iter().all(|&s| s.abs() < 1e-4));
    }

    #[test]
    fn mono_content_leaves_the_side_channel_empty() {
        let input = sine_stereo(2048, 800.0, 0.5); // L == R
        let mut mid = Vec::new();
        let mut side = Vec::new();
        for frame in input.chunks_exact(2) {
            mid.push((frame[0] + frame[1]) / 2.0);
            side.push((frame[0] - frame[1]) / 2.0);
        }
        assert!(side.iter().all(|&s| s == 0.0));
        assert_eq!(mid.len(), 2048);
    }

    #[test]
    fn truncated_chunk_is_detected() {
        let input = sine_stereo(1024, 100.0, 0.5);
        let chunk = encode_chunk(&input, 2, Some(3)).unwrap();
        assert!(matches!(decode_chunk(&chunk[..5]), Err(Error::Truncated)));
        assert!(matches!(
            decode_chunk(&chunk[..chunk.len() - 1]),
            Err(Error::Truncated)
        ));
    }

    #[test]
    fn pcm_conversions_cover_the_range() {
        let decoded = DecodedChunk {
            sample_count: 2,
            quant_bits: 0,
            samples: vec![0.0, 1.0, -1.0, 0.5],
            bytes_consumed: 0,
        };
        assert_eq!(decoded.to_pcm16(), vec![0, 32767, -32767, 16383]);
        assert_eq!(decoded.to_pcmu8(), vec![128, 255, 1, 191]);
    }

    #[test]
    fn band_layout_covers_every_coefficient() {
        let n = 31_991;
        let mut counts = [0usize; 10];
        for i in 0..n {
            counts[band_of(i, n)] += 1;
        }
        assert_eq!(counts.iter().sum::<usize>(), n);
        // The finest band holds roughly half the coefficients.
        assert!(counts[9] > n / 3);
        assert!(counts[0] > 0);
    }
}
