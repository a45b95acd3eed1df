//! Error types for feature extraction.

/// Errors that can occur while loading audio or computing features.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// The file could not be read or parsed as audio (missing file,
    /// unsupported format, corrupt data).
    #[error("audio decode error: {0}")]
    Decode(String),

    /// Resampling to the target rate failed.
    #[error("resample error: {0}")]
    Resample(String),

    /// The extraction parameters are inconsistent.
    #[error("invalid feature config: {0}")]
    InvalidConfig(String),
}

/// Result type for feature extraction.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Extension trait to reduce `.map_err()` boilerplate when wrapping errors into `FeatureError`.
pub trait ResultExt<T> {
    /// Wrap the error as [`FeatureError::Decode`] with `context` prefix.
    fn audio_decode(self, context: &str) -> Result<T>;
    /// Wrap the error as [`FeatureError::Resample`] with `context` prefix.
    fn resample(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn audio_decode(self, context: &str) -> Result<T> {
        self.map_err(|e| FeatureError::Decode(format!("{context}: {e}")))
    }
    fn resample(self, context: &str) -> Result<T> {
        self.map_err(|e| FeatureError::Resample(format!("{context}: {e}")))
    }
}
