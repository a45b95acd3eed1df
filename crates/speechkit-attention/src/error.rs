//! Error types for the attention module.

/// Errors raised while building or running [`MultiHeadAttention`](crate::MultiHeadAttention).
#[derive(Debug, thiserror::Error)]
pub enum AttentionError {
    /// The module shape is inconsistent (zero sizes, or `n_head * dim`
    /// differs from `hidden_size`).
    #[error("invalid attention config: {0}")]
    InvalidConfig(String),

    /// Input or weight tensors have incompatible shapes.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

impl From<ndarray::ShapeError> for AttentionError {
    fn from(e: ndarray::ShapeError) -> Self {
        Self::ShapeMismatch(e.to_string())
    }
}

/// Result type for attention operations.
pub type Result<T> = std::result::Result<T, AttentionError>;
