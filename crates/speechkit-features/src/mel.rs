//! Slaney-style Mel filterbank and decibel conversion.

use ndarray::Array2;
use tracing::warn;

/// Linear region slope of the Slaney Mel scale (Hz per Mel).
const F_SP: f64 = 200.0 / 3.0;
/// Frequency where the scale switches from linear to logarithmic.
const MIN_LOG_HZ: f64 = 1000.0;
/// Mel value at [`MIN_LOG_HZ`].
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4_f64.ln() / 27.0
}

/// Convert Hz to Mels (Slaney scale: linear below 1 kHz, log above).
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Convert Mels back to Hz.
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Center frequency of each FFT bin, `0 ..= sr / 2`.
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f64> {
    let n_bins = n_fft / 2 + 1;
    let sr = f64::from(sample_rate);
    (0..n_bins).map(|k| k as f64 * sr / n_fft as f64).collect()
}

/// `n` frequencies evenly spaced on the Mel scale between `fmin` and `fmax`.
pub fn mel_frequencies(n: usize, fmin: f64, fmax: f64) -> Vec<f64> {
    let lo = hz_to_mel(fmin);
    let hi = hz_to_mel(fmax);
    match n {
        0 => Vec::new(),
        1 => vec![mel_to_hz(lo)],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n).map(|i| mel_to_hz(lo + step * i as f64)).collect()
        }
    }
}

/// Triangular Mel filterbank with shape `[n_mels, 1 + n_fft / 2]`.
///
/// Each filter is area-normalized (Slaney), so wider high-frequency bands
/// are scaled down. Filters that fall between FFT bins come out all zero;
/// that is logged rather than rejected.
#[allow(clippy::cast_possible_truncation)]
pub fn mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f64,
    fmax: f64,
) -> Array2<f32> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);
    let mel_f = mel_frequencies(n_mels + 2, fmin, fmax);
    let mut weights = Array2::<f32>::zeros((n_mels, fft_freqs.len()));

    let mut empty = 0_usize;
    for i in 0..n_mels {
        let (left, center, right) = (mel_f[i], mel_f[i + 1], mel_f[i + 2]);
        let enorm = 2.0 / (right - left);
        let mut peak = 0.0_f64;
        for (k, &f) in fft_freqs.iter().enumerate() {
            let lower = (f - left) / (center - left);
            let upper = (right - f) / (right - center);
            let w = lower.min(upper).max(0.0) * enorm;
            peak = peak.max(w);
            weights[[i, k]] = w as f32;
        }
        if left > 0.0 && peak <= 0.0 {
            empty += 1;
        }
    }

    if empty > 0 {
        warn!(
            empty,
            n_mels,
            n_fft,
            "empty mel filters; try fewer mel bands or a longer window"
        );
    }
    weights
}

/// Convert a power spectrogram to decibels: `10 * log10(max(amin, S) / ref)`.
///
/// When `top_db` is set, values are floored at `max - top_db`.
pub fn power_to_db(
    spec: &Array2<f32>,
    reference: f32,
    amin: f32,
    top_db: Option<f32>,
) -> Array2<f32> {
    let ref_db = 10.0 * reference.abs().max(amin).log10();
    let mut log_spec = spec.mapv(|p| 10.0 * p.max(amin).log10() - ref_db);

    if let Some(top_db) = top_db {
        let max = log_spec.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if max.is_finite() {
            let floor = max - top_db;
            log_spec.mapv_inplace(|v| v.max(floor));
        }
    }
    log_spec
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
