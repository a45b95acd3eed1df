//! Multi-head attention between decoder states and encoder outputs.

use ndarray::{Array3, Axis, concatenate};
use rand::Rng;
use tracing::trace;

use crate::config::AttentionConfig;
use crate::error::{AttentionError, Result};
use crate::linear::Linear;
use crate::math::softmax_last_axis;

/// Multi-head attention with a fused output projection.
///
/// Both inputs are projected into `n_head` subspaces of width `dim`. Scores
/// are the raw dot products `q·kᵀ` (no `1/√dim` scaling), softmax-normalized
/// over the key axis. The projected keys also serve as the values: there is
/// no separate value projection. Head outputs are concatenated, joined with
/// the decoder states along the feature axis, and mapped back to
/// `hidden_size` through `out` followed by `tanh`.
///
/// ndarray has no batched matmul, so the per-head products run as one `dot`
/// per `(head, batch)` slice of the stacked `(n_head * batch, len, dim)`
/// tensors.
///
/// Forward passes borrow the weights immutably; updates go through
/// [`parameters_mut`](Self::parameters_mut), so the borrow checker keeps
/// weight updates and forward passes from overlapping.
#[derive(Clone, Debug)]
pub struct MultiHeadAttention {
    config: AttentionConfig,
    linear_q: Linear, // [hidden, n_head * dim]
    linear_k: Linear, // [hidden, n_head * dim]
    out: Linear,      // [2 * hidden, hidden]
}

/// Result of a forward pass with the intermediate tensors exposed.
#[derive(Clone, Debug)]
pub struct AttentionOutput {
    /// Attended representation `(batch, len, hidden_size)`.
    pub output: Array3<f32>,
    /// Concatenated head contexts `(batch, len, n_head * dim)`.
    pub context: Array3<f32>,
    /// Attention weights `(n_head * batch, len_q, len_k)`, head-major: row
    /// `h * batch + b` belongs to head `h` of batch element `b`.
    pub distribution: Array3<f32>,
}

/// Shared view of the projection layers.
#[derive(Clone, Copy, Debug)]
pub struct AttentionParameters<'a> {
    /// Query projection.
    pub linear_q: &'a Linear,
    /// Key (and value) projection.
    pub linear_k: &'a Linear,
    /// Output projection.
    pub out: &'a Linear,
}

/// Exclusive view of the projection layers, for external weight updates.
#[derive(Debug)]
pub struct AttentionParametersMut<'a> {
    /// Query projection.
    pub linear_q: &'a mut Linear,
    /// Key (and value) projection.
    pub linear_k: &'a mut Linear,
    /// Output projection.
    pub out: &'a mut Linear,
}

impl MultiHeadAttention {
    /// Build a module with weights drawn from the thread-local RNG.
    pub fn new(config: AttentionConfig) -> Result<Self> {
        Self::with_rng(config, &mut rand::rng())
    }

    /// Build a module with weights drawn from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(config: AttentionConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let hidden = config.hidden_size;
        let proj = config.projection_size();
        Ok(Self {
            config,
            linear_q: Linear::new(hidden, proj, rng),
            linear_k: Linear::new(hidden, proj, rng),
            out: Linear::new(2 * hidden, hidden, rng),
        })
    }

    /// Build a module from existing projection layers.
    pub fn from_weights(
        config: AttentionConfig,
        linear_q: Linear,
        linear_k: Linear,
        out: Linear,
    ) -> Result<Self> {
        config.validate()?;
        let hidden = config.hidden_size;
        let proj = config.projection_size();
        for (name, layer, expected) in [
            ("linear_q", &linear_q, (hidden, proj)),
            ("linear_k", &linear_k, (hidden, proj)),
            ("out", &out, (2 * hidden, hidden)),
        ] {
            let actual = (layer.input_dim(), layer.output_dim());
            if actual != expected {
                return Err(AttentionError::ShapeMismatch(format!(
                    "{name} weight is {actual:?}, expected {expected:?}"
                )));
            }
        }
        Ok(Self {
            config,
            linear_q,
            linear_k,
            out,
        })
    }

    /// The module shape.
    pub fn config(&self) -> &AttentionConfig {
        &self.config
    }

    /// Shared access to the projection layers.
    pub fn parameters(&self) -> AttentionParameters<'_> {
        AttentionParameters {
            linear_q: &self.linear_q,
            linear_k: &self.linear_k,
            out: &self.out,
        }
    }

    /// Exclusive access to the projection layers.
    pub fn parameters_mut(&mut self) -> AttentionParametersMut<'_> {
        AttentionParametersMut {
            linear_q: &mut self.linear_q,
            linear_k: &mut self.linear_k,
            out: &mut self.out,
        }
    }

    /// Attend from `decoder_output` `(batch, len, hidden)` over
    /// `encoder_outputs` `(batch, len, hidden)`.
    ///
    /// Both sequences must have the same length.
    pub fn forward(
        &self,
        decoder_output: &Array3<f32>,
        encoder_outputs: &Array3<f32>,
    ) -> Result<Array3<f32>> {
        Ok(self.attend(decoder_output, encoder_outputs)?.output)
    }

    /// Like [`forward`](Self::forward), also returning the context and the
    /// attention distribution.
    pub fn attend(
        &self,
        decoder_output: &Array3<f32>,
        encoder_outputs: &Array3<f32>,
    ) -> Result<AttentionOutput> {
        self.check_inputs(decoder_output, encoder_outputs)?;
        let (batch, len, hidden) = decoder_output.dim();
        let (n_head, dim) = (self.config.n_head, self.config.dim);

        let query = self.split_heads(self.project(&self.linear_q, decoder_output)?, batch, len)?;
        let key = self.split_heads(self.project(&self.linear_k, encoder_outputs)?, batch, len)?;

        // Batched q·kᵀ, one slice at a time.
        let mut distribution = Array3::<f32>::zeros((n_head * batch, len, len));
        for ((q, k), mut scores) in query
            .outer_iter()
            .zip(key.outer_iter())
            .zip(distribution.outer_iter_mut())
        {
            scores.assign(&q.dot(&k.t()));
        }
        softmax_last_axis(&mut distribution);

        let mut heads = Array3::<f32>::zeros((n_head * batch, len, dim));
        for ((weights, k), mut ctx) in distribution
            .outer_iter()
            .zip(key.outer_iter())
            .zip(heads.outer_iter_mut())
        {
            ctx.assign(&weights.dot(&k));
        }
        let context = self.merge_heads(heads, batch, len)?;

        let combined = concatenate(Axis(2), &[context.view(), decoder_output.view()])?;
        let flat = combined.to_shape((batch * len, 2 * hidden))?;
        let output = self
            .out
            .forward(flat.view())?
            .mapv(f32::tanh)
            .into_shape_with_order((batch, len, hidden))?;

        trace!(batch, len, hidden, n_head, dim, "attention forward");
        Ok(AttentionOutput {
            output,
            context,
            distribution,
        })
    }

    fn check_inputs(&self, decoder_output: &Array3<f32>, encoder_outputs: &Array3<f32>) -> Result<()> {
        let (q_batch, q_len, q_hidden) = decoder_output.dim();
        let (k_batch, k_len, k_hidden) = encoder_outputs.dim();
        let hidden = self.config.hidden_size;

        if q_batch != k_batch {
            return Err(AttentionError::ShapeMismatch(format!(
                "batch size differs: decoder {q_batch}, encoder {k_batch}"
            )));
        }
        if q_hidden != hidden || k_hidden != hidden {
            return Err(AttentionError::ShapeMismatch(format!(
                "hidden size must be {hidden}: decoder {q_hidden}, encoder {k_hidden}"
            )));
        }
        if q_len != k_len {
            return Err(AttentionError::ShapeMismatch(format!(
                "decoder length {q_len} must equal encoder length {k_len}"
            )));
        }
        Ok(())
    }

    /// `(batch, len, hidden)` → `(batch, len, n_head * dim)`.
    fn project(&self, layer: &Linear, x: &Array3<f32>) -> Result<Array3<f32>> {
        let (batch, len, hidden) = x.dim();
        let flat = x.to_shape((batch * len, hidden))?;
        let projected = layer.forward(flat.view())?;
        Ok(projected.into_shape_with_order((batch, len, layer.output_dim()))?)
    }

    /// `(batch, len, n_head * dim)` → `(n_head * batch, len, dim)`.
    fn split_heads(&self, x: Array3<f32>, batch: usize, len: usize) -> Result<Array3<f32>> {
        let (n_head, dim) = (self.config.n_head, self.config.dim);
        let heads = x
            .into_shape_with_order((batch, len, n_head, dim))?
            .permuted_axes([2, 0, 1, 3]);
        Ok(heads.to_shape((n_head * batch, len, dim))?.into_owned())
    }

    /// `(n_head * batch, len, dim)` → `(batch, len, n_head * dim)`.
    fn merge_heads(&self, x: Array3<f32>, batch: usize, len: usize) -> Result<Array3<f32>> {
        let (n_head, dim) = (self.config.n_head, self.config.dim);
        let heads = x
            .into_shape_with_order((n_head, batch, len, dim))?
            .permuted_axes([1, 2, 0, 3]);
        Ok(heads.to_shape((batch, len, n_head * dim))?.into_owned())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use ndarray::{Array1, Array2, Axis, array, s};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn module(hidden: usize, n_head: usize, seed: u64) -> MultiHeadAttention {
        let config = AttentionConfig::new(hidden).with_heads(n_head, hidden / n_head);
        MultiHeadAttention::with_rng(config, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    fn input(batch: usize, len: usize, hidden: usize, seed: u64) -> Array3<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array3::from_shape_simple_fn((batch, len, hidden), || rng.random_range(-1.0..1.0))
    }

    fn identity_layer(n: usize) -> Linear {
        Linear::from_parts(Array2::eye(n), Array1::zeros(n)).unwrap()
    }

    #[test]
    fn output_shape() {
        let mha = module(8, 2, 1);
        let dec = input(3, 5, 8, 2);
        let enc = input(3, 5, 8, 3);
        let out = mha.attend(&dec, &enc).unwrap();
        assert_eq!(out.output.dim(), (3, 5, 8));
        assert_eq!(out.context.dim(), (3, 5, 8));
        assert_eq!(out.distribution.dim(), (6, 5, 5));
        assert!(out.output.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn default_layout_runs() {
        let mha = MultiHeadAttention::new(AttentionConfig::new(512)).unwrap();
        let x = input(1, 3, 512, 0);
        assert_eq!(mha.forward(&x, &x).unwrap().dim(), (1, 3, 512));
    }

    #[test]
    fn scores_are_not_scaled() {
        // One head of width 2 with identity projections: scores are raw dot
        // products of the inputs.
        let config = AttentionConfig::new(2).with_heads(1, 2);
        let out = Linear::from_parts(Array2::zeros((4, 2)), Array1::zeros(2)).unwrap();
        let mha =
            MultiHeadAttention::from_weights(config, identity_layer(2), identity_layer(2), out)
                .unwrap();

        let x = array![[[3.0_f32, 0.0], [0.0, 3.0]]];
        let result = mha.attend(&x, &x).unwrap();
        let e9 = 9.0_f32.exp();
        assert!((result.distribution[[0, 0, 0]] - e9 / (e9 + 1.0)).abs() < 1e-6);
        // Zero output projection: tanh(0) everywhere.
        assert!(result.output.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn keys_double_as_values() {
        let config = AttentionConfig::new(2).with_heads(1, 2);
        let out = Linear::from_parts(Array2::zeros((4, 2)), Array1::zeros(2)).unwrap();
        let mha =
            MultiHeadAttention::from_weights(config, identity_layer(2), identity_layer(2), out)
                .unwrap();

        let dec = array![[[0.0_f32, 0.0], [0.0, 0.0]]];
        let enc = array![[[1.0_f32, 2.0], [3.0, 4.0]]];
        let result = mha.attend(&dec, &enc).unwrap();
        // Zero queries give uniform weights, so the context is the key mean.
        assert_eq!(result.context.slice(s![0, 0, ..]), array![2.0_f32, 3.0]);
    }

    #[test]
    fn distribution_rows_sum_to_one() {
        let mha = module(12, 3, 4);
        let out = mha.attend(&input(2, 6, 12, 5), &input(2, 6, 12, 6)).unwrap();
        for row in out.distribution.lanes(Axis(2)) {
            assert!(row.iter().all(|&p| p >= 0.0));
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn single_key_gives_projected_key() {
        let mha = module(8, 4, 9);
        let dec = input(2, 1, 8, 10);
        let enc = input(2, 1, 8, 11);
        let out = mha.attend(&dec, &enc).unwrap();

        assert!(out.distribution.iter().all(|&p| (p - 1.0).abs() < 1e-6));
        let projected = mha.project(mha.parameters().linear_k, &enc).unwrap();
        for (c, k) in out.context.iter().zip(projected.iter()) {
            assert!((c - k).abs() < 1e-5);
        }
    }

    #[test]
    fn permuting_keys_leaves_context_unchanged() {
        let mha = module(8, 2, 12);
        let dec = input(1, 4, 8, 13);
        let enc = input(1, 4, 8, 14);
        let perm = [2, 0, 3, 1];
        let enc_perm = enc.select(Axis(1), &perm);

        let base = mha.attend(&dec, &enc).unwrap();
        let shuffled = mha.attend(&dec, &enc_perm).unwrap();

        for (a, b) in base.context.iter().zip(shuffled.context.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
        // Weight on key j moves to wherever j landed.
        for (new_pos, &old_pos) in perm.iter().enumerate() {
            let before = base.distribution.slice(s![.., .., old_pos]);
            let after = shuffled.distribution.slice(s![.., .., new_pos]);
            for (x, y) in before.iter().zip(after.iter()) {
                assert!((x - y).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn permuting_both_sequences_permutes_output() {
        let mha = module(8, 2, 15);
        let dec = input(2, 5, 8, 16);
        let enc = input(2, 5, 8, 17);
        let perm = [4, 2, 0, 1, 3];

        let base = mha.forward(&dec, &enc).unwrap();
        let shuffled = mha
            .forward(&dec.select(Axis(1), &perm), &enc.select(Axis(1), &perm))
            .unwrap();
        let expected = base.select(Axis(1), &perm);
        for (a, b) in expected.iter().zip(shuffled.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn forward_is_deterministic() {
        let mha = module(8, 2, 18);
        let dec = input(2, 3, 8, 19);
        let enc = input(2, 3, 8, 20);
        assert_eq!(mha.forward(&dec, &enc).unwrap(), mha.forward(&dec, &enc).unwrap());

        let twin = module(8, 2, 18);
        assert_eq!(mha.forward(&dec, &enc).unwrap(), twin.forward(&dec, &enc).unwrap());
    }

    #[test]
    fn length_mismatch_rejected() {
        let mha = module(8, 2, 21);
        let result = mha.forward(&input(1, 3, 8, 0), &input(1, 4, 8, 0));
        assert_matches!(result, Err(AttentionError::ShapeMismatch(m)) if m.contains("length"));
    }

    #[test]
    fn batch_mismatch_rejected() {
        let mha = module(8, 2, 22);
        let result = mha.forward(&input(2, 3, 8, 0), &input(1, 3, 8, 0));
        assert_matches!(result, Err(AttentionError::ShapeMismatch(m)) if m.contains("batch"));
    }

    #[test]
    fn hidden_mismatch_rejected() {
        let mha = module(8, 2, 23);
        let result = mha.forward(&input(1, 3, 8, 0), &input(1, 3, 6, 0));
        assert_matches!(result, Err(AttentionError::ShapeMismatch(m)) if m.contains("hidden"));
    }

    #[test]
    fn inconsistent_heads_rejected_at_construction() {
        let config = AttentionConfig::new(10).with_heads(4, 2);
        assert_matches!(
            MultiHeadAttention::new(config),
            Err(AttentionError::InvalidConfig(_))
        );
    }

    #[test]
    fn from_weights_checks_shapes() {
        let config = AttentionConfig::new(4).with_heads(2, 2);
        let mut rng = StdRng::seed_from_u64(0);
        let good = || Linear::new(4, 4, &mut StdRng::seed_from_u64(1));
        let bad_out = Linear::new(4, 4, &mut rng);
        assert_matches!(
            MultiHeadAttention::from_weights(config, good(), good(), bad_out),
            Err(AttentionError::ShapeMismatch(m)) if m.contains("out")
        );

        let out = Linear::new(8, 4, &mut rng);
        let mha = MultiHeadAttention::from_weights(config, good(), good(), out.clone()).unwrap();
        assert_eq!(mha.parameters().out, &out);
    }

    #[test]
    fn parameters_mut_updates_weights() {
        let mut mha = module(4, 2, 24);
        let x = input(1, 2, 4, 25);
        let before = mha.forward(&x, &x).unwrap();

        {
            let params = mha.parameters_mut();
            params.out.weight_mut().fill(0.0);
            params.out.bias_mut().fill(0.0);
        }
        let after = mha.forward(&x, &x).unwrap();
        assert_ne!(before, after);
        assert!(after.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn forward_logs_shapes_at_trace() {
        let (logs, _guard) = speechkit_logging::capture_logs();
        let mha = module(4, 2, 26);
        let x = input(1, 2, 4, 27);
        let _ = mha.forward(&x, &x).unwrap();
        let events = logs.events_for_target("speechkit_attention");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].field("n_head"), Some("2"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn shape_holds_for_valid_configs(
            batch in 1usize..4,
            len in 1usize..6,
            n_head in 1usize..4,
            dim in 1usize..5,
            seed in any::<u64>(),
        ) {
            let hidden = n_head * dim;
            let mha = module(hidden, n_head, seed);
            let dec = input(batch, len, hidden, seed.wrapping_add(1));
            let enc = input(batch, len, hidden, seed.wrapping_add(2));
            let out = mha.attend(&dec, &enc).unwrap();
            prop_assert_eq!(out.output.dim(), (batch, len, hidden));
            for row in out.distribution.lanes(Axis(2)) {
                prop_assert!((row.sum() - 1.0).abs() < 1e-5);
            }
        }
    }
}
