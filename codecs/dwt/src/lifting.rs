//! 1-D lifting kernels.

use crate::Filter;

// CDF 9/7 lifting constants.
const ALPHA: f32 = -1.586134342;
const BETA: f32 = -0.052980118;
const GAMMA: f32 = 0.882911076;
const DELTA: f32 = 0.443506852;
const K: f32 = 1.230174105;

const FRAC_1_SQRT_2: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Forward 1-D transform of `data` in place. Output is in split layout
/// (low band first). Lengths below 2 are returned unchanged.
pub fn forward_1d(filter: Filter, data: &mut [f32]) {
    let n = data.len();
    if n < 2 {
        return;
    }
    let half = n.div_ceil(2);
    let mut temp = vec![0.0f32; n];
    for i in 0..half {
        temp[i] = data[i * 2];
    }
    for i in 0..n / 2 {
        temp[half + i] = data[i * 2 + 1];
    }
    let (low, high) = temp.split_at_mut(half);

    match filter {
        Filter::Cdf97 => {
            predict(low, high, ALPHA);
            update(low, high, BETA);
            predict(low, high, GAMMA);
            update(low, high, DELTA);
            for s in low.iter_mut() {
                *s *= K;
            }
            for d in high.iter_mut() {
                *d /= K;
            }
        }
        Filter::Cdf53 => {
            for i in 0..high.len() {
                let s_curr = low[i];
                let s_next = low[(i + 1).min(half - 1)];
                high[i] -= ((s_curr + s_next) / 2.0).floor();
            }
            for (i, s) in low.iter_mut().enumerate() {
                let d_curr = clamped(high, i);
                let d_prev = clamped(high, i.wrapping_sub(1).min(i));
                *s += ((d_prev + d_curr + 2.0) / 4.0).floor();
            }
        }
        Filter::Cdf137 => {
            for i in 0..high.len() {
                high[i] -= 9.0 / 16.0 * (low[i] + at(low, i as isize + 1))
                    - 1.0 / 16.0 * (at(low, i as isize - 1) + at(low, i as isize + 2));
            }
            for i in 0..low.len() {
                low[i] += 0.25 * (clamped(high, i.wrapping_sub(1).min(i)) + clamped(high, i));
            }
        }
        Filter::Dd4 => {
            for i in 0..high.len() {
                high[i] -= 9.0 / 16.0 * (low[i] + at(low, i as isize + 1))
                    - 1.0 / 16.0 * (at(low, i as isize - 1) + at(low, i as isize + 2));
            }
        }
        Filter::Haar => {
            for i in 0..high.len() {
                let a = low[i];
                let b = high[i];
                low[i] = (a + b) * FRAC_1_SQRT_2;
                high[i] = (a - b) * FRAC_1_SQRT_2;
            }
        }
    }

    data.copy_from_slice(&temp);
}

/// Inverse of [`forward_1d`]: split-layout input, interleaved output.
pub fn inverse_1d(filter: Filter, data: &mut [f32]) {
    let n = data.len();
    if n < 2 {
        return;
    }
    let half = n.div_ceil(2);
    let mut temp = data.to_vec();
    let (low, high) = temp.split_at_mut(half);

    match filter {
        Filter::Cdf97 => {
            for s in low.iter_mut() {
                *s /= K;
            }
            for d in high.iter_mut() {
                *d *= K;
            }
            unupdate(low, high, DELTA);
            unpredict(low, high, GAMMA);
            unupdate(low, high, BETA);
            unpredict(low, high, ALPHA);
        }
        Filter::Cdf53 => {
            for (i, s) in low.iter_mut().enumerate() {
                let d_curr = clamped(high, i);
                let d_prev = clamped(high, i.wrapping_sub(1).min(i));
                *s -= ((d_prev + d_curr + 2.0) / 4.0).floor();
            }
            for i in 0..high.len() {
                let s_curr = low[i];
                let s_next = low[(i + 1).min(half - 1)];
                high[i] += ((s_curr + s_next) / 2.0).floor();
            }
        }
        Filter::Cdf137 => {
            for i in 0..low.len() {
                low[i] -= 0.25 * (clamped(high, i.wrapping_sub(1).min(i)) + clamped(high, i));
            }
            for i in 0..high.len() {
                high[i] += 9.0 / 16.0 * (low[i] + at(low, i as isize + 1))
                    - 1.0 / 16.0 * (at(low, i as isize - 1) + at(low, i as isize + 2));
            }
        }
        Filter::Dd4 => {
            for i in 0..high.len() {
                high[i] += 9.0 / 16.0 * (low[i] + at(low, i as isize + 1))
                    - 1.0 / 16.0 * (at(low, i as isize - 1) + at(low, i as isize + 2));
            }
        }
        Filter::Haar => {
            for i in 0..high.len() {
                let s = low[i];
                let d = high[i];
                low[i] = (s + d) * FRAC_1_SQRT_2;
                high[i] = (s - d) * FRAC_1_SQRT_2;
            }
        }
    }

    for i in 0..half {
        data[i * 2] = temp[i];
    }
    for i in 0..n / 2 {
        data[i * 2 + 1] = temp[half + i];
    }
}

/// Multi-level cascade: each level re-transforms the low-band prefix of the
/// previous one. Stops early once the prefix is shorter than two samples.
pub fn forward_multi_1d(filter: Filter, data: &mut [f32], levels: u8) {
    let mut len = data.len();
    for _ in 0..levels {
        if len < 2 {
            break;
        }
        forward_1d(filter, &mut data[..len]);
        len = len.div_ceil(2);
    }
}

/// Inverse of [`forward_multi_1d`].
pub fn inverse_multi_1d(filter: Filter, data: &mut [f32], levels: u8) {
    let mut lengths = Vec::with_capacity(levels as usize);
    let mut len = data.len();
    for _ in 0..levels {
        if len < 2 {
            break;
        }
        lengths.push(len);
        len = len.div_ceil(2);
    }
    for len in lengths.into_iter().rev() {
        inverse_1d(filter, &mut data[..len]);
    }
}

/// `d[i] += coeff * (s[i] + s[i+1])`, mirroring the last low sample.
fn predict(low: &mut [f32], high: &mut [f32], coeff: f32) {
    let half = low.len();
    for i in 0..high.len() {
        let s_curr = low[i];
        let s_next = if i + 1 < half { low[i + 1] } else { s_curr };
        high[i] += coeff * (s_curr + s_next);
    }
}

fn unpredict(low: &mut [f32], high: &mut [f32], coeff: f32) {
    let half = low.len();
    for i in 0..high.len() {
        let s_curr = low[i];
        let s_next = if i + 1 < half { low[i + 1] } else { s_curr };
        high[i] -= coeff * (s_curr + s_next);
    }
}

/// `s[i] += coeff * (d[i-1] + d[i])`, mirroring the first high sample and
/// treating the missing final high sample of odd lengths as zero.
fn update(low: &mut [f32], high: &mut [f32], coeff: f32) {
    for (i, s) in low.iter_mut().enumerate() {
        let d_curr = if i < high.len() { high[i] } else { 0.0 };
        let d_prev = if i > 0 { high[i - 1] } else { d_curr };
        *s += coeff * (d_curr + d_prev);
    }
}

fn unupdate(low: &mut [f32], high: &mut [f32], coeff: f32) {
    for (i, s) in low.iter_mut().enumerate() {
        let d_curr = if i < high.len() { high[i] } else { 0.0 };
        let d_prev = if i > 0 { high[i - 1] } else { d_curr };
        *s -= coeff * (d_curr + d_prev);
    }
}

/// High-band neighbour with edge clamping; zero when the band is empty.
fn clamped(band: &[f32], i: usize) -> f32 {
    if band.is_empty() {
        0.0
    } else {
        band[i.min(band.len() - 1)]
    }
}

/// Low-band neighbour with mirror-free edge clamping.
fn at(band: &[f32], i: isize) -> f32 {
    let i = i.clamp(0, band.len() as isize - 1);
    band[i as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILTERS: [Filter; 5] =
        [Filter::Cdf53, Filter::Cdf97, Filter::Cdf137, Filter::Dd4, Filter::Haar];

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| ((i * 37 + 11) % 97) as f32 - 48.0).collect()
    }

    #[test]
    fn one_level_round_trip_even_and_odd() {
        for filter in FILTERS {
            for n in [2usize, 3, 8, 17, 64, 101] {
                let original = ramp(n);
                let mut data = original.clone();
                forward_1d(filter, &mut data);
                inverse_1d(filter, &mut data);
                for (a, b) in data.iter().zip(&original) {
                    assert!(
                        (a - b).abs() < 1e-3,
                        "{filter:?} length {n}: {a} vs {b}"
                    );
                }
            }
        }
    }

    #[test]
    fn multi_level_round_trip() {
        for filter in FILTERS {
            for n in [31usize, 64, 100] {
                let original = ramp(n);
                let mut data = original.clone();
                forward_multi_1d(filter, &mut data, 5);
                inverse_multi_1d(filter, &mut data, 5);
                for (a, b) in data.iter().zip(&original) {
                    assert!((a - b).abs() < 1e-2, "{filter:?} length {n}");
                }
            }
        }
    }

    #[test]
    fn cdf53_is_integer_exact() {
        let original: Vec<f32> = (0..53).map(|i| ((i * 29) % 511) as f32 - 255.0).collect();
        let mut data = original.clone();
        forward_1d(Filter::Cdf53, &mut data);
        assert!(data.iter().all(|v| v.fract() == 0.0));
        inverse_1d(Filter::Cdf53, &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn short_inputs_pass_through() {
        for filter in FILTERS {
            let mut one = [5.0f32];
            forward_1d(filter, &mut one);
            assert_eq!(one, [5.0]);
            inverse_1d(filter, &mut one);
            assert_eq!(one, [5.0]);
        }
    }

    #[test]
    fn haar_splits_constant_signal_into_dc() {
        let mut data = vec![4.0f32; 8];
        forward_1d(Filter::Haar, &mut data);
        for d in &data[4..] {
            assert!(d.abs() < 1e-6);
        }
        for s in &data[..4] {
            assert!((s - 4.0 * std::f32::consts::SQRT_2).abs() < 1e-5);
        }
    }
}
