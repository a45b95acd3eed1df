//! Public-API tests for the attention module.

use assert_matches::assert_matches;
use ndarray::{Array3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use speechkit_attention::{AttentionConfig, AttentionError, MultiHeadAttention, mean_entropy};
use speechkit_settings::AttentionSettings;

fn random(shape: (usize, usize, usize), seed: u64) -> Array3<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_simple_fn(shape, || rng.random_range(-1.0..1.0))
}

#[test]
fn settings_defaults_build_a_module() {
    let config = AttentionConfig::from_settings(80, &AttentionSettings::default());
    let mha = MultiHeadAttention::with_rng(config, &mut StdRng::seed_from_u64(3)).unwrap();
    let x = random((2, 4, 80), 4);
    let out = mha.attend(&x, &x).unwrap();
    assert_eq!(out.output.dim(), (2, 4, 80));
    assert_eq!(out.distribution.dim(), (8, 4, 4));
}

#[test]
fn cross_attention_over_different_lengths_is_rejected() {
    let config = AttentionConfig::new(16).with_heads(4, 4);
    let mha = MultiHeadAttention::new(config).unwrap();
    let dec = random((1, 2, 16), 0);
    let enc = random((1, 7, 16), 1);
    assert_matches!(mha.forward(&dec, &enc), Err(AttentionError::ShapeMismatch(_)));
}

#[test]
fn entropy_is_bounded_by_uniform() {
    let config = AttentionConfig::new(16).with_heads(2, 8);
    let mha = MultiHeadAttention::with_rng(config, &mut StdRng::seed_from_u64(5)).unwrap();
    let x = random((1, 6, 16), 6);
    let out = mha.attend(&x, &x).unwrap();
    let h = mean_entropy(&out.distribution);
    assert!(h >= 0.0);
    assert!(h <= 6.0_f32.ln() + 1e-5);
    assert_eq!(out.distribution.len_of(Axis(0)), 2);
}

#[test]
fn weights_survive_a_checkpoint_round_trip() {
    let config = AttentionConfig::new(8).with_heads(2, 4);
    let original = MultiHeadAttention::with_rng(config, &mut StdRng::seed_from_u64(7)).unwrap();
    let p = original.parameters();
    let restored = MultiHeadAttention::from_weights(
        config,
        p.linear_q.clone(),
        p.linear_k.clone(),
        p.out.clone(),
    )
    .unwrap();

    let x = random((2, 3, 8), 8);
    assert_eq!(original.forward(&x, &x).unwrap(), restored.forward(&x, &x).unwrap());
}
