//! Fully-connected layer `y = x·W + b`.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};
use rand::Rng;

use crate::error::{AttentionError, Result};

/// A linear (fully-connected) layer with weight `[in, out]` and bias `[out]`.
///
/// The shape is fixed at construction; mutable access goes through views so
/// callers can update values but never resize.
#[derive(Clone, Debug, PartialEq)]
pub struct Linear {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Linear {
    /// Uniform init in `±1/√in` for both weight and bias.
    pub fn new<R: Rng + ?Sized>(input_dim: usize, output_dim: usize, rng: &mut R) -> Self {
        let bound = if input_dim == 0 {
            0.0
        } else {
            1.0 / (input_dim as f32).sqrt()
        };
        Self {
            weight: Array2::from_shape_simple_fn((input_dim, output_dim), || {
                rng.random_range(-bound..=bound)
            }),
            bias: Array1::from_shape_simple_fn(output_dim, || rng.random_range(-bound..=bound)),
        }
    }

    /// Build from existing parameters, e.g. restored from a checkpoint.
    pub fn from_parts(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        if weight.ncols() != bias.len() {
            return Err(AttentionError::ShapeMismatch(format!(
                "bias length {} does not match weight output width {}",
                bias.len(),
                weight.ncols()
            )));
        }
        Ok(Self { weight, bias })
    }

    /// Input width.
    pub fn input_dim(&self) -> usize {
        self.weight.nrows()
    }

    /// Output width.
    pub fn output_dim(&self) -> usize {
        self.weight.ncols()
    }

    /// Weight matrix `[in, out]`.
    pub fn weight(&self) -> ArrayView2<'_, f32> {
        self.weight.view()
    }

    /// Bias vector `[out]`.
    pub fn bias(&self) -> ArrayView1<'_, f32> {
        self.bias.view()
    }

    /// Mutable weight values.
    pub fn weight_mut(&mut self) -> ArrayViewMut2<'_, f32> {
        self.weight.view_mut()
    }

    /// Mutable bias values.
    pub fn bias_mut(&mut self) -> ArrayViewMut1<'_, f32> {
        self.bias.view_mut()
    }

    /// Apply the layer to each row of `x` (`[n, in]` → `[n, out]`).
    pub fn forward(&self, x: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.input_dim() {
            return Err(AttentionError::ShapeMismatch(format!(
                "linear layer expects width {}, got {}",
                self.input_dim(),
                x.ncols()
            )));
        }
        Ok(x.dot(&self.weight) + &self.bias)
    }
}
