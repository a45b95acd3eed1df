//! Energy-based silence detection.
//!
//! Frames are centered on multiples of the hop and zero-padded at the edges.
//! A frame is non-silent when its mean-square energy is within `top_db` of
//! the loudest frame in the signal.

use tracing::debug;

/// Smallest energy considered when converting to decibels.
const AMIN: f64 = 1e-10;

/// A half-open range `[start, end)` of non-silent samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    /// First sample of the interval.
    pub start: usize,
    /// One past the last sample of the interval.
    pub end: usize,
}

impl Interval {
    /// Number of samples covered.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the interval covers no samples.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Mean-square energy of each centered frame.
///
/// The signal is treated as zero-padded by `frame_length / 2` on both sides,
/// so frame `t` covers samples `t * hop - frame_length / 2 ..` in the
/// original signal.
pub fn frame_energy(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f64> {
    if samples.is_empty() || frame_length == 0 || hop_length == 0 {
        return Vec::new();
    }

    let pad = frame_length / 2;
    let padded_len = samples.len() + 2 * pad;
    if padded_len < frame_length {
        return Vec::new();
    }
    let n_frames = 1 + (padded_len - frame_length) / hop_length;

    // Prefix sums of squares make each frame O(1).
    let mut prefix = Vec::with_capacity(samples.len() + 1);
    prefix.push(0.0_f64);
    let mut acc = 0.0_f64;
    for &s in samples {
        acc += f64::from(s) * f64::from(s);
        prefix.push(acc);
    }

    (0..n_frames)
        .map(|t| {
            // Padded coordinates [t*hop, t*hop + frame_length) shifted back by pad.
            let lo = (t * hop_length).saturating_sub(pad).min(samples.len());
            let hi = (t * hop_length + frame_length)
                .saturating_sub(pad)
                .min(samples.len());
            (prefix[hi] - prefix[lo]) / frame_length as f64
        })
        .collect()
}

/// Find the non-silent intervals of `samples`.
///
/// Returns intervals in ascending order. Boundaries fall on multiples of
/// `hop_length`, clamped to the signal length. An empty signal yields no
/// intervals.
pub fn split(
    samples: &[f32],
    top_db: f32,
    frame_length: usize,
    hop_length: usize,
) -> Vec<Interval> {
    let energy = frame_energy(samples, frame_length, hop_length);
    let Some(max_energy) = energy.iter().copied().reduce(f64::max) else {
        return Vec::new();
    };

    let ref_db = 10.0 * max_energy.max(AMIN).log10();
    let threshold = -f64::from(top_db);
    let non_silent: Vec<bool> = energy
        .iter()
        .map(|&e| 10.0 * e.max(AMIN).log10() - ref_db > threshold)
        .collect();

    let to_sample = |frame: usize| (frame * hop_length).min(samples.len());

    let mut intervals = Vec::new();
    let mut run_start: Option<usize> = None;
    for (frame, &loud) in non_silent.iter().enumerate() {
        match (loud, run_start) {
            (true, None) => run_start = Some(frame),
            (false, Some(start)) => {
                intervals.push(Interval {
                    start: to_sample(start),
                    end: to_sample(frame),
                });
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        intervals.push(Interval {
            start: to_sample(start),
            end: to_sample(non_silent.len()),
        });
    }

    // A run that starts on the final clamped edge covers no samples.
    intervals.retain(|iv| !iv.is_empty());

    debug!(
        samples = samples.len(),
        frames = energy.len(),
        intervals = intervals.len(),
        "split silence"
    );
    intervals
}

/// Concatenate the samples covered by `intervals`.
pub fn remove_silence(samples: &[f32], intervals: &[Interval]) -> Vec<f32> {
    let total: usize = intervals.iter().map(Interval::len).sum();
    let mut out = Vec::with_capacity(total);
    for iv in intervals {
        let end = iv.end.min(samples.len());
        let start = iv.start.min(end);
        out.extend_from_slice(&samples[start..end]);
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
