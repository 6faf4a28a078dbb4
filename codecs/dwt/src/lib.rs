//! Lifting-scheme discrete wavelet transforms.
//!
//! All transforms use the split in-place layout: after a forward pass the
//! low-pass band occupies the first `ceil(n/2)` slots and the high-pass
//! band the remainder. Boundaries use symmetric (mirror) extension, with
//! the exact neighbour conventions of the reference decoder so that
//! forward and inverse are bit-faithful mirrors of each other.

mod lifting;
mod plane;
mod temporal;

pub use lifting::{forward_1d, forward_multi_1d, inverse_1d, inverse_multi_1d};
pub use plane::{forward_2d, inverse_2d};
pub use temporal::{forward_temporal, inverse_temporal};

/// The wavelet filters understood by the lifting kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// LGT/CDF 5/3 with integer lifting steps. Reversible: integral inputs
    /// produce integral coefficients.
    Cdf53,
    /// CDF 9/7, the irreversible biorthogonal filter.
    Cdf97,
    /// CDF 13/7: four-point interpolating predict with a two-point update.
    Cdf137,
    /// Deslauriers-Dubuc 4-point interpolating filter (predict only).
    Dd4,
    /// Normalised Haar butterfly.
    Haar,
}
