//! Analysis parameters for feature extraction.

use speechkit_settings::FeatureSettings;

use crate::error::{FeatureError, Result};

/// Sample rate every input is resampled to.
pub const SAMPLE_RATE: u32 = 16_000;
/// Analysis window length: 21 ms at 16 kHz.
pub const N_FFT: usize = 336;
/// Frame hop: 5.25 ms at 16 kHz (75% overlap).
pub const HOP_LENGTH: usize = 84;
/// Silence threshold in dB below the loudest frame.
pub const TOP_DB: f32 = 30.0;

/// Parameters shared by Mel-spectrogram and MFCC extraction.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureConfig {
    /// Target sample rate in Hz.
    pub sample_rate: u32,
    /// FFT window length in samples.
    pub n_fft: usize,
    /// Hop between frames in samples.
    pub hop_length: usize,
    /// Silence threshold in dB below the loudest frame.
    pub top_db: f32,
    /// Zero-pad by `n_fft / 2` on both sides before framing.
    pub center: bool,
    /// Frame length for silence detection.
    pub split_frame_length: usize,
    /// Hop length for silence detection.
    pub split_hop_length: usize,
    /// Mel bands computed before the DCT in MFCC extraction.
    pub mfcc_n_mels: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self::from_settings(&FeatureSettings::default())
    }
}

impl FeatureConfig {
    /// Create config from settings.
    pub fn from_settings(s: &FeatureSettings) -> Self {
        Self {
            sample_rate: s.sample_rate,
            n_fft: s.n_fft,
            hop_length: s.hop_length,
            top_db: s.top_db,
            center: s.center,
            split_frame_length: s.split_frame_length,
            split_hop_length: s.split_hop_length,
            mfcc_n_mels: s.mfcc_n_mels,
        }
    }

    /// Number of frequency bins produced per frame.
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Check that the parameters describe a usable analysis.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("sample_rate", self.sample_rate as usize),
            ("n_fft", self.n_fft),
            ("hop_length", self.hop_length),
            ("split_frame_length", self.split_frame_length),
            ("split_hop_length", self.split_hop_length),
            ("mfcc_n_mels", self.mfcc_n_mels),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(FeatureError::InvalidConfig(format!("{name} must be positive")));
        }
        if self.hop_length > self.n_fft {
            return Err(FeatureError::InvalidConfig(format!(
                "hop_length {} exceeds n_fft {}",
                self.hop_length, self.n_fft
            )));
        }
        if !(self.top_db.is_finite() && self.top_db > 0.0) {
            return Err(FeatureError::InvalidConfig(format!(
                "top_db must be a positive number, got {}",
                self.top_db
            )));
        }
        Ok(())
    }
}

/// Which feature to compute, with its output width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureKind {
    /// Mel-spectrogram (power) with `n_mels` bands.
    Mel {
        /// Number of Mel bands.
        n_mels: usize,
    },
    /// Mel-frequency cepstral coefficients.
    Mfcc {
        /// Number of coefficients kept after the DCT.
        n_mfcc: usize,
    },
}

impl FeatureKind {
    /// Width of each output frame.
    pub fn dim(self) -> usize {
        match self {
            Self::Mel { n_mels } => n_mels,
            Self::Mfcc { n_mfcc } => n_mfcc,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn default_matches_constants() {
        let c = FeatureConfig::default();
        assert_eq!(c.sample_rate, SAMPLE_RATE);
        assert_eq!(c.n_fft, N_FFT);
        assert_eq!(c.hop_length, HOP_LENGTH);
        assert!((c.top_db - TOP_DB).abs() < f32::EPSILON);
        assert!(!c.center);
        assert_eq!(c.n_bins(), 169);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        let c = FeatureConfig {
            hop_length: 0,
            ..FeatureConfig::default()
        };
        assert_matches!(c.validate(), Err(FeatureError::InvalidConfig(m)) if m.contains("hop_length"));
    }

    #[test]
    fn validate_rejects_hop_larger_than_window() {
        let c = FeatureConfig {
            hop_length: 400,
            ..FeatureConfig::default()
        };
        assert_matches!(c.validate(), Err(FeatureError::InvalidConfig(_)));
    }

    #[test]
    fn validate_rejects_bad_threshold() {
        for top_db in [0.0, -10.0, f32::NAN] {
            let c = FeatureConfig {
                top_db,
                ..FeatureConfig::default()
            };
            assert!(c.validate().is_err(), "accepted top_db {top_db}");
        }
    }

    #[test]
    fn from_settings_copies_fields() {
        let s = FeatureSettings {
            n_fft: 512,
            hop_length: 128,
            center: true,
            ..FeatureSettings::default()
        };
        let c = FeatureConfig::from_settings(&s);
        assert_eq!(c.n_fft, 512);
        assert_eq!(c.hop_length, 128);
        assert!(c.center);
    }

    #[test]
    fn kind_dim() {
        assert_eq!(FeatureKind::Mel { n_mels: 80 }.dim(), 80);
        assert_eq!(FeatureKind::Mfcc { n_mfcc: 13 }.dim(), 13);
    }
}
