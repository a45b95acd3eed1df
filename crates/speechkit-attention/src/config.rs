//! Attention module shape.

use speechkit_settings::AttentionSettings;

use crate::error::{AttentionError, Result};

/// Default number of attention heads.
pub const DEFAULT_N_HEAD: usize = 4;
/// Default per-head projection width.
pub const DEFAULT_DIM: usize = 128;

/// Fixed shape of a [`MultiHeadAttention`](crate::MultiHeadAttention) module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttentionConfig {
    /// Width of decoder and encoder hidden states.
    pub hidden_size: usize,
    /// Number of attention heads.
    pub n_head: usize,
    /// Per-head projection width.
    pub dim: usize,
}

impl AttentionConfig {
    /// Config with the default head layout (4 heads of 128).
    pub fn new(hidden_size: usize) -> Self {
        Self {
            hidden_size,
            n_head: DEFAULT_N_HEAD,
            dim: DEFAULT_DIM,
        }
    }

    /// Override the head layout.
    #[must_use]
    pub fn with_heads(mut self, n_head: usize, dim: usize) -> Self {
        self.n_head = n_head;
        self.dim = dim;
        self
    }

    /// Split `hidden_size` evenly across the configured number of heads.
    ///
    /// A head count that does not divide `hidden_size` leaves
    /// `n_head * dim` short of it, which [`validate`](Self::validate) rejects.
    pub fn from_settings(hidden_size: usize, s: &AttentionSettings) -> Self {
        Self::new(hidden_size).with_heads(s.n_head, hidden_size / s.n_head.max(1))
    }

    /// Width of the concatenated head projections.
    pub fn projection_size(&self) -> usize {
        self.n_head * self.dim
    }

    /// Check that the shape can run a forward pass.
    ///
    /// The output projection consumes `[context, decoder_output]`, so the
    /// concatenated heads must be exactly `hidden_size` wide.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("hidden_size", self.hidden_size),
            ("n_head", self.n_head),
            ("dim", self.dim),
        ] {
            if value == 0 {
                return Err(AttentionError::InvalidConfig(format!(
                    "{name} must be positive"
                )));
            }
        }
        if self.projection_size() != self.hidden_size {
            return Err(AttentionError::InvalidConfig(format!(
                "n_head * dim ({} * {} = {}) must equal hidden_size ({})",
                self.n_head,
                self.dim,
                self.projection_size(),
                self.hidden_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn new_uses_default_heads() {
        let c = AttentionConfig::new(512);
        assert_eq!(c.n_head, 4);
        assert_eq!(c.dim, 128);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn default_heads_need_matching_hidden_size() {
        assert_matches!(
            AttentionConfig::new(256).validate(),
            Err(AttentionError::InvalidConfig(m)) if m.contains("hidden_size (256)")
        );
    }

    #[test]
    fn zero_sizes_rejected() {
        assert!(AttentionConfig::new(0).with_heads(0, 0).validate().is_err());
        assert_matches!(
            AttentionConfig::new(8).with_heads(0, 8).validate(),
            Err(AttentionError::InvalidConfig(m)) if m.contains("n_head")
        );
    }

    #[test]
    fn from_settings_splits_hidden_size() {
        let c = AttentionConfig::from_settings(80, &AttentionSettings { n_head: 4 });
        assert_eq!(c, AttentionConfig::new(80).with_heads(4, 20));
        assert_eq!(c.projection_size(), 80);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn from_settings_with_indivisible_heads_fails_validation() {
        let c = AttentionConfig::from_settings(40, &AttentionSettings { n_head: 3 });
        assert_matches!(
            c.validate(),
            Err(AttentionError::InvalidConfig(m)) if m.contains("hidden_size (40)")
        );
        let zero = AttentionConfig::from_settings(40, &AttentionSettings { n_head: 0 });
        assert!(zero.validate().is_err());
    }
}
