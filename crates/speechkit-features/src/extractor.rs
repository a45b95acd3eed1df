//! Mel-spectrogram and MFCC pipelines.

use std::path::Path;

use ndarray::Array2;
use tracing::debug;

use crate::audio;
use crate::config::{FeatureConfig, FeatureKind};
use crate::error::{FeatureError, Result};
use crate::mel;
use crate::mfcc as cepstrum;
use crate::silence;
use crate::spectrum;

/// Decibel floor used before the DCT.
const AMIN: f32 = 1e-10;
/// Dynamic range kept by the log compression before the DCT.
const MFCC_TOP_DB: f32 = 80.0;

/// Turns audio into time-major feature matrices.
///
/// Holds only its analysis parameters, so a single extractor can be shared
/// across threads.
#[derive(Clone, Debug, Default)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    /// Create an extractor, rejecting inconsistent parameters.
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The analysis parameters in use.
    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Load `path` at the analysis rate, optionally stripping silence.
    pub fn load(&self, path: impl AsRef<Path>, remove_silence: bool) -> Result<Vec<f32>> {
        let samples = audio::load(path, self.config.sample_rate)?;
        Ok(if remove_silence {
            self.trim_silence(&samples)
        } else {
            samples
        })
    }

    /// Compute `kind` features for the audio file at `path`.
    pub fn extract(
        &self,
        path: impl AsRef<Path>,
        kind: FeatureKind,
        remove_silence: bool,
    ) -> Result<Array2<f32>> {
        self.check_kind(kind)?;
        let samples = self.load(path, remove_silence)?;
        self.extract_from_samples(&samples, kind)
    }

    /// Mel-spectrogram `[frames, n_mels]` of the audio file at `path`.
    pub fn melspectrogram(
        &self,
        path: impl AsRef<Path>,
        n_mels: usize,
        remove_silence: bool,
    ) -> Result<Array2<f32>> {
        self.extract(path, FeatureKind::Mel { n_mels }, remove_silence)
    }

    /// MFCC matrix `[frames, n_mfcc]` of the audio file at `path`.
    pub fn mfcc(
        &self,
        path: impl AsRef<Path>,
        n_mfcc: usize,
        remove_silence: bool,
    ) -> Result<Array2<f32>> {
        self.extract(path, FeatureKind::Mfcc { n_mfcc }, remove_silence)
    }

    /// Compute `kind` features for samples already at the analysis rate.
    pub fn extract_from_samples(&self, samples: &[f32], kind: FeatureKind) -> Result<Array2<f32>> {
        match kind {
            FeatureKind::Mel { n_mels } => self.melspectrogram_from_samples(samples, n_mels),
            FeatureKind::Mfcc { n_mfcc } => self.mfcc_from_samples(samples, n_mfcc),
        }
    }

    /// Mel power spectrogram `[frames, n_mels]` of in-memory samples.
    pub fn melspectrogram_from_samples(&self, samples: &[f32], n_mels: usize) -> Result<Array2<f32>> {
        self.check_kind(FeatureKind::Mel { n_mels })?;
        let mel = self.mel_power(samples, n_mels);
        debug!(frames = mel.ncols(), n_mels, "computed mel spectrogram");
        Ok(time_major(mel))
    }

    /// MFCC matrix `[frames, n_mfcc]` of in-memory samples.
    pub fn mfcc_from_samples(&self, samples: &[f32], n_mfcc: usize) -> Result<Array2<f32>> {
        self.check_kind(FeatureKind::Mfcc { n_mfcc })?;
        let mel = self.mel_power(samples, self.config.mfcc_n_mels);
        let log_mel = mel::power_to_db(&mel, 1.0, AMIN, Some(MFCC_TOP_DB));
        let coeffs = cepstrum::dct_ortho(&log_mel, n_mfcc);
        debug!(frames = coeffs.ncols(), n_mfcc, "computed mfcc");
        Ok(time_major(coeffs))
    }

    /// Reject a request that cannot produce features, before any decoding.
    fn check_kind(&self, kind: FeatureKind) -> Result<()> {
        match kind {
            FeatureKind::Mel { n_mels: 0 } => {
                Err(FeatureError::InvalidConfig("n_mels must be positive".into()))
            }
            FeatureKind::Mfcc { n_mfcc: 0 } => {
                Err(FeatureError::InvalidConfig("n_mfcc must be positive".into()))
            }
            FeatureKind::Mfcc { n_mfcc } if n_mfcc > self.config.mfcc_n_mels => {
                Err(FeatureError::InvalidConfig(format!(
                    "n_mfcc {n_mfcc} exceeds the {} mel bands it is derived from",
                    self.config.mfcc_n_mels
                )))
            }
            _ => Ok(()),
        }
    }

    fn trim_silence(&self, samples: &[f32]) -> Vec<f32> {
        let intervals = silence::split(
            samples,
            self.config.top_db,
            self.config.split_frame_length,
            self.config.split_hop_length,
        );
        let trimmed = silence::remove_silence(samples, &intervals);
        debug!(
            before = samples.len(),
            after = trimmed.len(),
            "removed silence"
        );
        trimmed
    }

    /// Mel-band power `[n_mels, frames]`.
    fn mel_power(&self, samples: &[f32], n_mels: usize) -> Array2<f32> {
        let c = &self.config;
        let power = spectrum::power_spectrogram(samples, c.n_fft, c.hop_length, c.center);
        let filters = mel::mel_filterbank(
            c.sample_rate,
            c.n_fft,
            n_mels,
            0.0,
            f64::from(c.sample_rate) / 2.0,
        );
        filters.dot(&power)
    }
}

/// `[features, frames]` to contiguous `[frames, features]`.
fn time_major(features: Array2<f32>) -> Array2<f32> {
    features.reversed_axes().as_standard_layout().into_owned()
}

/// Mel-spectrogram `[frames, n_mels]` of the file at `path` with default
/// analysis parameters (16 kHz, 336-sample window, 84-sample hop).
pub fn melspectrogram(
    path: impl AsRef<Path>,
    n_mels: usize,
    remove_silence: bool,
) -> Result<Array2<f32>> {
    FeatureExtractor::default().melspectrogram(path, n_mels, remove_silence)
}

/// MFCC matrix `[frames, n_mfcc]` of the file at `path` with default
/// analysis parameters.
pub fn mfcc(path: impl AsRef<Path>, n_mfcc: usize, remove_silence: bool) -> Result<Array2<f32>> {
    FeatureExtractor::default().mfcc(path, n_mfcc, remove_silence)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
