//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SpeechkitSettings::default()`]
//! 2. If `~/.speechkit/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `SPEECHKIT_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::SpeechkitSettings;

/// Accepted values for `SPEECHKIT_LOG_LEVEL`.
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Resolve the path to the settings file (`~/.speechkit/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".speechkit").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SpeechkitSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<SpeechkitSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the settings file, without env overrides.
fn load_file_layer(path: &Path) -> Result<SpeechkitSettings> {
    let defaults = serde_json::to_value(SpeechkitSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `SPEECHKIT_*` environment variable overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut SpeechkitSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Each variable has strict parsing rules:
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are ignored with a warning (fall back to file/default)
pub fn apply_overrides(settings: &mut SpeechkitSettings, lookup: impl Fn(&str) -> Option<String>) {
    let vars = Vars { lookup };

    // ── Feature settings ────────────────────────────────────────────
    if let Some(v) = vars.usize("SPEECHKIT_N_MELS", 1, 512) {
        settings.features.n_mels = v;
    }
    if let Some(v) = vars.usize("SPEECHKIT_N_MFCC", 1, 512) {
        settings.features.n_mfcc = v;
    }
    if let Some(v) = vars.bool("SPEECHKIT_REMOVE_SILENCE") {
        settings.features.remove_silence = v;
    }
    if let Some(v) = vars.f32("SPEECHKIT_TOP_DB", 1.0, 120.0) {
        settings.features.top_db = v;
    }
    if let Some(v) = vars.bool("SPEECHKIT_CENTER") {
        settings.features.center = v;
    }

    // ── Attention settings ──────────────────────────────────────────
    if let Some(v) = vars.usize("SPEECHKIT_N_HEAD", 1, 1024) {
        settings.attention.n_head = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = vars.log_level("SPEECHKIT_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a finite `f32` within a range.
pub fn parse_f32_range(val: &str, min: f32, max: f32) -> Option<f32> {
    let n: f32 = val.parse().ok()?;
    (n.is_finite() && n >= min && n <= max).then_some(n)
}

/// Parse a tracing level name (case-insensitive), normalized to lowercase.
pub fn parse_log_level(val: &str) -> Option<String> {
    let lower = val.to_lowercase();
    LOG_LEVELS.contains(&lower.as_str()).then_some(lower)
}

// ── Variable readers (thin wrappers) ────────────────────────────────────────

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn read<T>(&self, name: &str, kind: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let val = (self.lookup)(name).filter(|v| !v.is_empty())?;
        let result = parse(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, kind, "invalid env var, ignoring");
        }
        result
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.read(name, "bool", parse_bool)
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.read(name, "usize", |v| parse_usize_range(v, min, max))
    }

    fn f32(&self, name: &str, min: f32, max: f32) -> Option<f32> {
        self.read(name, "f32", |v| parse_f32_range(v, min, max))
    }

    fn log_level(&self, name: &str) -> Option<String> {
        self.read(name, "level", parse_log_level)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
