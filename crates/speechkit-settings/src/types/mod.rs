//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. `#[serde(default)]` lets a settings
//! file name only the fields it changes.

mod attention;
mod features;

pub use attention::*;
pub use features::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// Loaded from `~/.speechkit/settings.json` with defaults applied for
/// missing fields. Environment variables can override specific values.
///
/// # JSON Format
///
/// ```json
/// {
///   "features": { "nMels": 40, "removeSilence": false },
///   "attention": { "nHead": 8 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeechkitSettings {
    /// Settings schema version.
    pub version: String,
    /// Feature extraction defaults.
    pub features: FeatureSettings,
    /// Attention module shape.
    pub attention: AttentionSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for SpeechkitSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            features: FeatureSettings::default(),
            attention: AttentionSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level for the stderr subscriber (`trace` … `error`).
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let settings: SpeechkitSettings = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(settings.version, "0.1.0");
        assert_eq!(settings.logging.level, "warn");
        assert_eq!(settings.features.n_mels, 80);
    }

    #[test]
    fn nested_partial_override() {
        let json = serde_json::json!({
            "attention": { "nHead": 8 }
        });
        let settings: SpeechkitSettings = serde_json::from_value(json).unwrap();
        assert_eq!(settings.attention.n_head, 8);
        assert_eq!(settings.features.n_mels, 80);
        assert_eq!(settings.features.hop_length, 84);
    }
}
