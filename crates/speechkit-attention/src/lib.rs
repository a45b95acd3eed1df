//! # speechkit-attention
//!
//! Multi-head attention used inside a sequence-to-sequence speech decoder to
//! align decoder states with encoder outputs.
//!
//! # Forward pass
//!
//! ```text
//! decoder_output (B, L, hidden) ─ linear_q ─┐
//!                                           ├ split heads → (H·B, L, dim)
//! encoder_outputs (B, L, hidden) ─ linear_k ┘
//! scores = q·kᵀ → softmax over keys → context = weights·k
//! merge heads → (B, L, H·dim) ++ decoder_output → out → tanh → (B, L, hidden)
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod linear;
pub mod math;
pub mod multihead;

pub use config::AttentionConfig;
pub use error::{AttentionError, Result};
pub use linear::Linear;
pub use math::{mean_entropy, softmax_last_axis};
pub use multihead::{
    AttentionOutput, AttentionParameters, AttentionParametersMut, MultiHeadAttention,
};
