//! Multi-head attention settings.

use serde::{Deserialize, Serialize};

/// Head layout of the attention module.
///
/// The hidden width comes from the features being attended over, and each
/// head gets `hidden_size / n_head` of it. A count that does not divide the
/// width is rejected when the module is built.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttentionSettings {
    /// Number of attention heads.
    pub n_head: usize,
}

impl Default for AttentionSettings {
    fn default() -> Self {
        Self { n_head: 4 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_heads_divide_default_mels() {
        let a = AttentionSettings::default();
        assert_eq!(crate::FeatureSettings::default().n_mels % a.n_head, 0);
    }

    #[test]
    fn serde_camel_case() {
        let json = serde_json::to_value(AttentionSettings::default()).unwrap();
        assert_eq!(json["nHead"], 4);
        let back: AttentionSettings = serde_json::from_str(r#"{"nHead": 8}"#).unwrap();
        assert_eq!(back.n_head, 8);
    }
}
