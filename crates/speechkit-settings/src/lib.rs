//! # speechkit-settings
//!
//! Layered configuration for feature extraction and the decoder attention
//! module.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SpeechkitSettings::default()`]
//! 2. **User file**: `~/.speechkit/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SPEECHKIT_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use speechkit_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("mel bands: {}", settings.features.n_mels);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
static SETTINGS: OnceLock<SpeechkitSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.speechkit/settings.json` with env
/// var overrides. If loading fails, returns compiled defaults.
pub fn get_settings() -> &'static SpeechkitSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            SpeechkitSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the provided settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: SpeechkitSettings) -> std::result::Result<(), SpeechkitSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
