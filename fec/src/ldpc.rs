//! Systematic rate-1/2 LDPC code for DT header protection.
//!
//! For `k` data bytes (`n = 8k` bits) the code emits `n` parity bits, one
//! per check. Check `j` covers six data bits: four at fixed offsets from
//! `j` (so every data bit sits in at least four checks) and two drawn from
//! a fixed xorshift sequence, making the matrix identical on both ends of
//! the wire. Decoding is bit-flipping capped at [`LDPC_MAX_ITERATIONS`]:
//! majority flips first, then a single best-candidate flip, and every step
//! must strictly reduce the number of failing checks or it is reverted.
//! Residual failures that no data flip improves are attributed to damage
//! in the parity half, which the data bytes do not care about.

use crate::{Error, Result};

pub const LDPC_MAX_DATA_BYTES: usize = 64;
pub const LDPC_MAX_ITERATIONS: usize = 50;

const TAPS_PER_CHECK: usize = 6;

/// Data-bit members of check `j` for an `n`-bit data block.
fn check_taps(j: usize, n: usize) -> [usize; TAPS_PER_CHECK] {
    let spread_a = n / 3 + 1;
    let spread_b = 2 * n / 3 + 1;
    let mut taps = [j % n, (j + 1) % n, (j + spread_a) % n, (j + spread_b) % n, 0, 0];
    let mut state =
        ((j as u32).wrapping_mul(2_654_435_761) ^ (n as u32).wrapping_mul(0x9E37_79B9)) | 1;
    let mut filled = 4;
    // The fixed offsets can collide on tiny blocks; collapse duplicates
    // before topping up with the pseudo-random taps.
    let mut distinct = 1;
    for i in 1..filled {
        if !taps[..distinct].contains(&taps[i]) {
            taps[distinct] = taps[i];
            distinct += 1;
        }
    }
    filled = distinct;
    while filled < TAPS_PER_CHECK {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let candidate = state as usize % n;
        if !taps[..filled].contains(&candidate) {
            taps[filled] = candidate;
            filled += 1;
        }
    }
    taps
}

fn get_bit(bytes: &[u8], index: usize) -> bool {
    bytes[index / 8] >> (index % 8) & 1 != 0
}

fn flip_bit(bytes: &mut [u8], index: usize) {
    bytes[index / 8] ^= 1 << (index % 8);
}

/// Encodes `data` into a `2 * data.len()` codeword: the data bytes
/// followed by the parity bytes.
pub fn ldpc_encode(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() || data.len() > LDPC_MAX_DATA_BYTES {
        return Err(Error::BadLength(data.len()));
    }
    let n = data.len() * 8;
    let mut out = data.to_vec();
    out.resize(data.len() * 2, 0);
    for j in 0..n {
        let parity = check_taps(j, n)
            .iter()
            .fold(false, |acc, &tap| acc ^ get_bit(data, tap));
        if parity {
            flip_bit(&mut out[data.len()..], j);
        }
    }
    Ok(out)
}

struct Checks {
    taps: Vec<[usize; TAPS_PER_CHECK]>,
    degree: Vec<u32>,
}

impl Checks {
    fn new(n: usize) -> Self {
        let taps: Vec<[usize; TAPS_PER_CHECK]> = (0..n).map(|j| check_taps(j, n)).collect();
        let mut degree = vec![0u32; n];
        for check in &taps {
            for &tap in check {
                degree[tap] += 1;
            }
        }
        Self { taps, degree }
    }

    /// Per-data-bit failing-check counts and the total number of failing
    /// checks.
    fn failures(&self, data: &[u8], parity: &[u8]) -> (Vec<u32>, usize) {
        let n = self.taps.len();
        let mut counts = vec![0u32; n];
        let mut failing = 0usize;
        for (j, check) in self.taps.iter().enumerate() {
            let syndrome = check
                .iter()
                .fold(get_bit(parity, j), |acc, &tap| acc ^ get_bit(data, tap));
            if syndrome {
                failing += 1;
                for &tap in check {
                    counts[tap] += 1;
                }
            }
        }
        (counts, failing)
    }
}

/// Decodes a codeword produced by [`ldpc_encode`]. On non-convergence the
/// error carries the best-effort data bytes so framing can proceed.
pub fn ldpc_decode(encoded: &[u8]) -> Result<Vec<u8>> {
    if encoded.is_empty() || encoded.len() % 2 != 0 || encoded.len() / 2 > LDPC_MAX_DATA_BYTES {
        return Err(Error::BadLength(encoded.len()));
    }
    let k = encoded.len() / 2;
    let n = k * 8;
    let mut data = encoded[..k].to_vec();
    let parity = &encoded[k..];
    let checks = Checks::new(n);

    let (mut counts, mut failing) = checks.failures(&data, parity);
    for _ in 0..LDPC_MAX_ITERATIONS {
        if failing == 0 {
            return Ok(data);
        }

        // Majority pass: flip every bit failing more than half its checks.
        let flips: Vec<usize> = (0..n)
            .filter(|&bit| counts[bit] >= 2 && counts[bit] * 2 > checks.degree[bit])
            .collect();
        if !flips.is_empty() {
            for &bit in &flips {
                flip_bit(&mut data, bit);
            }
            let (new_counts, new_failing) = checks.failures(&data, parity);
            if new_failing < failing {
                counts = new_counts;
                failing = new_failing;
                continue;
            }
            // The bulk flip made things worse; undo it and fall through.
            for &bit in &flips {
                flip_bit(&mut data, bit);
            }
        }

        // Best-candidate pass: a single flip that must pay for itself.
        let best = (0..n).max_by_key(|&bit| counts[bit]).unwrap_or(0);
        if counts[best] < 2 {
            // Every failing check touches no data bit twice: the damage is
            // confined to the parity half.
            return Ok(data);
        }
        flip_bit(&mut data, best);
        let (new_counts, new_failing) = checks.failures(&data, parity);
        if new_failing < failing {
            counts = new_counts;
            failing = new_failing;
        } else {
            flip_bit(&mut data, best);
            return Ok(data);
        }
    }

    Err(Error::LdpcUndecodable { best_effort: data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sample_data(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen()).collect()
    }

    #[test]
    fn clean_round_trip_across_lengths() {
        for len in [1usize, 2, 7, 14, 28, 63, 64] {
            let data = sample_data(len, len as u64);
            let encoded = ldpc_encode(&data).unwrap();
            assert_eq!(encoded.len(), len * 2);
            assert_eq!(&encoded[..len], &data[..], "systematic prefix");
            assert_eq!(ldpc_decode(&encoded).unwrap(), data);
        }
    }

    #[test]
    fn corrects_three_bit_flips_in_a_dt_header() {
        // 28-byte blocks are the DT main-header size; a damaged tape can
        // flip a few bits anywhere in the 56-byte codeword.
        for seed in 0..25u64 {
            let data = sample_data(28, seed);
            let mut encoded = ldpc_encode(&data).unwrap();
            let mut rng = StdRng::seed_from_u64(seed ^ 0xDEAD_BEEF);
            let mut flipped = std::collections::HashSet::new();
            while flipped.len() < 3 {
                flipped.insert(rng.gen_range(0..encoded.len() * 8));
            }
            for &bit in &flipped {
                encoded[bit / 8] ^= 1 << (bit % 8);
            }
            assert_eq!(ldpc_decode(&encoded).unwrap(), data, "seed {seed}");
        }
    }

    #[test]
    fn corrects_scattered_flips_at_the_maximum_block_size() {
        let data = sample_data(64, 77);
        let mut encoded = ldpc_encode(&data).unwrap();
        // floor(64 / 8) = 8 flips, spread across the 512-bit data half.
        for i in 0..8 {
            let bit = i * 63 + 10;
            encoded[bit / 8] ^= 1 << (bit % 8);
        }
        assert_eq!(ldpc_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn parity_only_damage_still_yields_the_data() {
        let data = sample_data(14, 3);
        let mut encoded = ldpc_encode(&data).unwrap();
        let n = data.len() * 8;
        // Three parity flips on checks with pairwise-disjoint taps, so no
        // data bit can collect a majority from the damage.
        let mut chosen: Vec<usize> = Vec::new();
        for j in 0..n {
            let taps = check_taps(j, n);
            let disjoint = chosen
                .iter()
                .all(|&c| check_taps(c, n).iter().all(|t| !taps.contains(t)));
            if disjoint {
                chosen.push(j);
                if chosen.len() == 3 {
                    break;
                }
            }
        }
        assert_eq!(chosen.len(), 3);
        let parity_start = n;
        for &check in &chosen {
            let bit = parity_start + check;
            encoded[bit / 8] ^= 1 << (bit % 8);
        }
        assert_eq!(ldpc_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(matches!(ldpc_encode(&[]), Err(Error::BadLength(0))));
        assert!(matches!(ldpc_encode(&[0u8; 65]), Err(Error::BadLength(65))));
        assert!(matches!(ldpc_decode(&[1, 2, 3]), Err(Error::BadLength(3))));
    }

    #[test]
    fn taps_are_distinct(){
        for n in [8usize, 112, 224, 512] {
            for j in 0..n {
                let taps = check_taps(j, n);
                assert_eq!(taps[0], j);
                for a in 0..TAPS_PER_CHECK {
                    for b in a + 1..TAPS_PER_CHECK {
                        assert_ne!(taps[a], taps[b], "n={n} j={j}");
                    }
                }
            }
        }
    }
}
