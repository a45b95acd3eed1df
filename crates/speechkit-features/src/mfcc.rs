//! Cepstral coefficients via an orthonormal type-II DCT.

use std::f64::consts::PI;

use ndarray::Array2;

/// Orthonormal DCT-II basis with shape `[n_out, n_in]`.
///
/// Row `k` holds `scale_k * cos(pi * k * (2n + 1) / (2 * n_in))`, where
/// `scale_0 = sqrt(1 / n_in)` and `scale_k = sqrt(2 / n_in)` otherwise.
#[allow(clippy::cast_possible_truncation)]
pub fn dct_basis(n_out: usize, n_in: usize) -> Array2<f32> {
    let n = n_in as f64;
    Array2::from_shape_fn((n_out, n_in), |(k, i)| {
        let scale = if k == 0 {
            (1.0 / n).sqrt()
        } else {
            (2.0 / n).sqrt()
        };
        (scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos()) as f32
    })
}

/// Apply an orthonormal DCT-II along the first axis of `x` (`[n_in, frames]`)
/// and keep the first `n_out` coefficients, giving `[n_out, frames]`.
pub fn dct_ortho(x: &Array2<f32>, n_out: usize) -> Array2<f32> {
    dct_basis(n_out, x.nrows()).dot(x)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
