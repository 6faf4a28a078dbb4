//! Reed-Solomon(255,223) over GF(2^8) with primitive polynomial 0x11D.
//!
//! 32 parity bytes per codeword, correcting up to 16 byte errors. Blocks
//! shorter than 223 data bytes are treated as zero-padded (shortened)
//! codewords. The block helpers split long payloads into full 255-byte
//! codewords, zero-padding the tail, which is what the DT wire carries.

use crate::{Error, Result};

pub const RS_BLOCK_SIZE: usize = 255;
pub const RS_DATA_SIZE: usize = 223;
pub const RS_PARITY_SIZE: usize = 32;
pub const RS_MAX_ERRORS: usize = 16;

const PRIMITIVE_POLY: u32 = 0x11D;

struct Tables {
    exp: [u8; 512],
    log: [u8; 256],
    /// Generator polynomial, highest-degree coefficient first; the leading
    /// 1 is implicit at index 0.
    generator: [u8; RS_PARITY_SIZE + 1],
}

lazy_static::lazy_static! {
    static ref TABLES: Tables = {
        let mut exp = [0u8; 512];
        let mut log = [0u8; 256];
        let mut value = 1u32;
        for i in 0..255 {
            exp[i] = value as u8;
            log[value as usize] = i as u8;
            value <<= 1;
            if value & 0x100 != 0 {
                value ^= PRIMITIVE_POLY;
            }
        }
        for i in 255..512 {
            exp[i] = exp[i - 255];
        }

        // g(x) = (x - a^0)(x - a^1) ... (x - a^31)
        let mut generator = [0u8; RS_PARITY_SIZE + 1];
        generator[0] = 1;
        let mut degree = 0usize;
        for i in 0..RS_PARITY_SIZE {
            let root = exp[i];
            degree += 1;
            // Multiply the highest-first polynomial by (x + root):
            // new[j] = old[j] ^ root * old[j-1].
            for j in (1..=degree).rev() {
                generator[j] ^= raw_mul(&exp, &log, generator[j - 1], root);
            }
        }
        Tables { exp, log, generator }
    };
}

/// Multiplication usable during table construction.
fn raw_mul(exp: &[u8; 512], log: &[u8; 256], a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    exp[usize::from(log[usize::from(a)]) + usize::from(log[usize::from(b)])]
}

fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = &*TABLES;
    t.exp[usize::from(t.log[usize::from(a)]) + usize::from(t.log[usize::from(b)])]
}

fn gf_inv(a: u8) -> u8 {
    let t = &*TABLES;
    t.exp[255 - usize::from(t.log[usize::from(a)])]
}

fn gf_div(a: u8, b: u8) -> u8 {
    gf_mul(a, gf_inv(b))
}

fn gf_pow(exponent: usize) -> u8 {
    TABLES.exp[exponent % 255]
}

/// Evaluates a low-order-first polynomial at `x`.
fn poly_eval_low(poly: &[u8], x: u8) -> u8 {
    let mut acc = 0u8;
    for &coef in poly.iter().rev() {
        acc = gf_mul(acc, x) ^ coef;
    }
    acc
}

/// Encodes `data` (up to 223 bytes), returning `data ∥ parity`.
pub fn rs_encode(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() || data.len() > RS_DATA_SIZE {
        return Err(Error::BadLength(data.len()));
    }
    let t = &*TABLES;
    let mut parity = [0u8; RS_PARITY_SIZE];
    for &byte in data {
        let coef = byte ^ parity[0];
        parity.copy_within(1.., 0);
        parity[RS_PARITY_SIZE - 1] = 0;
        if coef != 0 {
            for (slot, &gen) in parity.iter_mut().zip(&t.generator[1..]) {
                *slot ^= gf_mul(coef, gen);
            }
        }
    }
    let mut out = data.to_vec();
    out.extend_from_slice(&parity);
    Ok(out)
}

/// Decodes and corrects a `data ∥ parity` buffer in place. Returns the
/// number of byte errors corrected.
pub fn rs_decode(block: &mut [u8]) -> Result<usize> {
    if block.len() <= RS_PARITY_SIZE || block.len() > RS_BLOCK_SIZE {
        return Err(Error::BadLength(block.len()));
    }
    let n = block.len();

    // Syndromes S_j = r(a^j): Horner with block[0] as the highest-degree
    // coefficient.
    let mut syndromes = [0u8; RS_PARITY_SIZE];
    let mut any = false;
    for (j, syndrome) in syndromes.iter_mut().enumerate() {
        let x = gf_pow(j);
        let mut acc = 0u8;
        for &byte in block.iter() {
            acc = gf_mul(acc, x) ^ byte;
        }
        *syndrome = acc;
        any |= acc != 0;
    }
    if !any {
        return Ok(0);
    }

    // Berlekamp-Massey: error locator, low-order-first.
    let mut lambda = vec![1u8];
    let mut prev = vec![1u8];
    let mut l = 0usize;
    let mut m = 1usize;
    let mut prev_delta = 1u8;
    for r in 0..RS_PARITY_SIZE {
        let mut delta = syndromes[r];
        for i in 1..=l.min(lambda.len() - 1) {
            delta ^= gf_mul(lambda[i], syndromes[r - i]);
        }
        if delta == 0 {
            m += 1;
        } else if 2 * l <= r {
            let old_lambda = lambda.clone();
            let scale = gf_div(delta, prev_delta);
            lambda = poly_add_shifted(&lambda, &prev, scale, m);
            prev = old_lambda;
            prev_delta = delta;
            l = r + 1 - l;
            m = 1;
        } else {
            let scale = gf_div(delta, prev_delta);
            lambda = poly_add_shifted(&lambda, &prev, scale, m);
            m += 1;
        }
    }
    let errors = lambda.iter().rposition(|&c| c != 0).unwrap_or(0);
    if errors > RS_MAX_ERRORS || errors != l {
        return Err(Error::RsUncorrectable);
    }

    // Chien search over the received positions. Position `p` (from the
    // start of the block) has location exponent `n - 1 - p`.
    let mut positions = Vec::with_capacity(errors);
    for p in 0..n {
        let exponent = n - 1 - p;
        let x_inv = gf_pow(255 - exponent % 255);
        if poly_eval_low(&lambda, x_inv) == 0 {
            positions.push(p);
        }
    }
    if positions.len() != l {
        return Err(Error::RsUncorrectable);
    }

    // Omega(x) = S(x) * Lambda(x) mod x^32, low-order-first.
    let mut omega = vec![0u8; RS_PARITY_SIZE];
    for (i, &s) in syndromes.iter().enumerate() {
        for (j, &c) in lambda.iter().enumerate() {
            if i + j < RS_PARITY_SIZE {
                omega[i + j] ^= gf_mul(s, c);
            }
        }
    }

    // Forney: e_p = X_p * Omega(X_p^-1) / Lambda'(X_p^-1).
    for &p in &positions {
        let exponent = n - 1 - p;
        let x = gf_pow(exponent);
        let x_inv = gf_pow(255 - exponent % 255);
        let numerator = poly_eval_low(&omega, x_inv);
        let mut denominator = 0u8;
        for (i, &c) in lambda.iter().enumerate() {
            if i % 2 == 1 {
                denominator ^= gf_mul(c, pow_of(x_inv, i - 1));
            }
        }
        if denominator == 0 {
            return Err(Error::RsUncorrectable);
        }
        let magnitude = gf_mul(x, gf_div(numerator, denominator));
        block[p] ^= magnitude;
    }

    // A corrected codeword must have clean syndromes.
    for j in 0..RS_PARITY_SIZE {
        let x = gf_pow(j);
        let mut acc = 0u8;
        for &byte in block.iter() {
            acc = gf_mul(acc, x) ^ byte;
        }
        if acc != 0 {
            return Err(Error::RsUncorrectable);
        }
    }

    Ok(positions.len())
}

fn pow_of(base: u8, exponent: usize) -> u8 {
    if exponent == 0 {
        return 1;
    }
    if base == 0 {
        return 0;
    }
    let t = &*TABLES;
    t.exp[usize::from(t.log[usize::from(base)]) * exponent % 255]
}

/// `target + scale * shifted(source, shift)`, low-order-first.
fn poly_add_shifted(target: &[u8], source: &[u8], scale: u8, shift: usize) -> Vec<u8> {
    let len = target.len().max(source.len() + shift);
    let mut out = vec![0u8; len];
    out[..target.len()].copy_from_slice(target);
    for (i, &c) in source.iter().enumerate() {
        out[i + shift] ^= gf_mul(c, scale);
    }
    out
}

/// Splits `data` into 223-byte blocks, zero-padding the last, and encodes
/// each. The output is always a multiple of 255 bytes.
pub fn rs_encode_blocks(data: &[u8]) -> Result<Vec<u8>> {
    let block_count = data.len().div_ceil(RS_DATA_SIZE).max(1);
    let mut out = Vec::with_capacity(block_count * RS_BLOCK_SIZE);
    for i in 0..block_count {
        let start = i * RS_DATA_SIZE;
        let end = (start + RS_DATA_SIZE).min(data.len());
        let mut block = [0u8; RS_DATA_SIZE];
        if start < data.len() {
            block[..end - start].copy_from_slice(&data[start..end]);
        }
        out.extend_from_slice(&rs_encode(&block)?);
    }
    Ok(out)
}

/// Inverse of [`rs_encode_blocks`]: decodes every 255-byte block and
/// returns the first `output_len` data bytes, plus the total number of
/// corrected byte errors.
pub fn rs_decode_blocks(encoded: &mut [u8], output_len: usize) -> Result<(Vec<u8>, usize)> {
    if encoded.len() % RS_BLOCK_SIZE != 0 {
        return Err(Error::BadLength(encoded.len()));
    }
    let block_count = encoded.len() / RS_BLOCK_SIZE;
    if output_len > block_count * RS_DATA_SIZE {
        return Err(Error::BadLength(output_len));
    }
    let mut out = Vec::with_capacity(output_len);
    let mut corrected = 0usize;
    for block in encoded.chunks_exact_mut(RS_BLOCK_SIZE) {
        corrected += rs_decode(block)?;
        out.extend_from_slice(&block[..RS_DATA_SIZE]);
    }
    out.truncate(output_len);
    Ok((out, corrected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sample(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen()).collect()
    }

    #[test]
    fn clean_round_trip_full_and_shortened() {
        for len in [1usize, 10, 100, 222, 223] {
            let data = sample(len, len as u64);
            let encoded = rs_encode(&data).unwrap();
            assert_eq!(encoded.len(), len + RS_PARITY_SIZE);
            assert_eq!(&encoded[..len], &data[..]);
            let mut block = encoded.clone();
            assert_eq!(rs_decode(&mut block).unwrap(), 0);
            assert_eq!(&block[..len], &data[..]);
        }
    }

    #[test]
    fn corrects_up_to_sixteen_byte_errors() {
        for seed in 0..10u64 {
            let data = sample(223, seed);
            let encoded = rs_encode(&data).unwrap();
            let mut rng = StdRng::seed_from_u64(seed ^ 0xF00D);
            let mut block = encoded.clone();
            let mut positions = std::collections::HashSet::new();
            while positions.len() < RS_MAX_ERRORS {
                positions.insert(rng.gen_range(0..block.len()));
            }
            for &p in &positions {
                block[p] ^= rng.gen_range(1..=255u8) as u8;
            }
            let corrected = rs_decode(&mut block).unwrap();
            assert_eq!(corrected, RS_MAX_ERRORS, "seed {seed}");
            assert_eq!(&block[..223], &data[..], "seed {seed}");
        }
    }

    #[test]
    fn corrects_errors_in_shortened_blocks() {
        let data = sample(50, 42);
        let encoded = rs_encode(&data).unwrap();
        let mut block = encoded.clone();
        block[3] ^= 0x5A;
        block[60] ^= 0x01; // inside the parity
        assert_eq!(rs_decode(&mut block).unwrap(), 2);
        assert_eq!(&block[..50], &data[..]);
    }

    #[test]
    fn seventeen_errors_are_uncorrectable() {
        let data = sample(223, 9);
        let encoded = rs_encode(&data).unwrap();
        let mut block = encoded.clone();
        for p in 0..17 {
            block[p * 13] ^= 0xFF;
        }
        assert!(rs_decode(&mut block).is_err());
    }

    #[test]
    fn block_splitting_round_trips() {
        // Two full blocks plus a partial tail.
        let data = sample(223 * 2 + 57, 1234);
        let mut encoded = rs_encode_blocks(&data).unwrap();
        assert_eq!(encoded.len(), 3 * RS_BLOCK_SIZE);
        // Scatter a few errors across all three blocks.
        for p in [10usize, 300, 600, 700] {
            encoded[p] ^= 0x42;
        }
        let (decoded, corrected) = rs_decode_blocks(&mut encoded, data.len()).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(corrected, 4);
    }

    #[test]
    fn empty_payload_still_emits_one_block() {
        let encoded = rs_encode_blocks(&[]).unwrap();
        assert_eq!(encoded.len(), RS_BLOCK_SIZE);
        let mut buf = encoded;
        let (decoded, _) = rs_decode_blocks(&mut buf, 0).unwrap();
        assert!(decoded.is_empty());
    }
}
