//! Numeric helpers.

use ndarray::{Array, Axis, Dimension};

/// Softmax over the last axis, in place.
///
/// Each lane is shifted by its maximum before exponentiation so large
/// scores do not overflow.
pub fn softmax_last_axis<D: Dimension>(x: &mut Array<f32, D>) {
    let Some(last) = x.ndim().checked_sub(1) else {
        return;
    };
    for mut lane in x.lanes_mut(Axis(last)) {
        let max = lane.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        lane.mapv_inplace(|v| (v - max).exp());
        let sum = lane.sum();
        if sum > 0.0 {
            lane.mapv_inplace(|v| v / sum);
        }
    }
}

/// Shannon entropy (nats) of each lane of a distribution over the last axis,
/// averaged over all lanes.
pub fn mean_entropy<D: Dimension>(p: &Array<f32, D>) -> f32 {
    let Some(last) = p.ndim().checked_sub(1) else {
        return 0.0;
    };
    let width = p.len_of(Axis(last));
    if width == 0 || p.is_empty() {
        return 0.0;
    }
    let count = p.len() / width;
    let total: f32 = p
        .lanes(Axis(last))
        .into_iter()
        .map(|lane| {
            lane.iter()
                .filter(|&&v| v > 0.0)
                .map(|&v| -v * v.ln())
                .sum::<f32>()
        })
        .sum();
    total / count as f32
}
