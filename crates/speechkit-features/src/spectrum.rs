//! Short-time Fourier transform power spectrogram.

use std::f32::consts::PI;

use ndarray::Array2;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// Periodic Hann window of length `n` (the DFT-even variant).
pub fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

/// Number of STFT frames for a signal of `n_samples`.
///
/// Without centering this is `floor((n - n_fft) / hop) + 1`, or zero when the
/// signal is shorter than one window.
pub fn frame_count(n_samples: usize, n_fft: usize, hop_length: usize, center: bool) -> usize {
    let len = if center {
        n_samples + 2 * (n_fft / 2)
    } else {
        n_samples
    };
    if hop_length == 0 || len < n_fft {
        0
    } else {
        (len - n_fft) / hop_length + 1
    }
}

/// Power spectrogram `|STFT|²` with shape `[1 + n_fft / 2, frames]`.
///
/// With `center`, the signal is zero-padded by `n_fft / 2` on both sides so
/// frame `t` is centered on sample `t * hop_length`.
pub fn power_spectrogram(
    samples: &[f32],
    n_fft: usize,
    hop_length: usize,
    center: bool,
) -> Array2<f32> {
    let n_bins = n_fft / 2 + 1;
    let n_frames = frame_count(samples.len(), n_fft, hop_length, center);
    let mut spec = Array2::<f32>::zeros((n_bins, n_frames));
    if n_frames == 0 {
        return spec;
    }

    let padded;
    let signal: &[f32] = if center {
        let pad = n_fft / 2;
        let mut buf = vec![0.0; samples.len() + 2 * pad];
        buf[pad..pad + samples.len()].copy_from_slice(samples);
        padded = buf;
        &padded
    } else {
        samples
    };

    let window = hann_window(n_fft);
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let mut scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
    let mut buffer = vec![Complex::default(); n_fft];

    for t in 0..n_frames {
        let frame = &signal[t * hop_length..t * hop_length + n_fft];
        for ((slot, &x), &w) in buffer.iter_mut().zip(frame).zip(&window) {
            *slot = Complex::new(x * w, 0.0);
        }
        fft.process_with_scratch(&mut buffer, &mut scratch);
        for (k, c) in buffer.iter().take(n_bins).enumerate() {
            spec[[k, t]] = c.norm_sqr();
        }
    }

    spec
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
