//! Acoustic feature extraction settings.

use serde::{Deserialize, Serialize};

/// Defaults for Mel-spectrogram / MFCC extraction.
///
/// The analysis window (336 samples = 21 ms) and hop (84 samples = 5.25 ms)
/// give 75% overlap at 16 kHz.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureSettings {
    /// Target sample rate in Hz. Audio is resampled to this rate on load.
    pub sample_rate: u32,
    /// FFT window length in samples.
    pub n_fft: usize,
    /// Hop between successive frames in samples.
    pub hop_length: usize,
    /// Silence threshold in dB below the loudest frame.
    pub top_db: f32,
    /// Pad the signal by `n_fft / 2` on both sides before framing.
    pub center: bool,
    /// Frame length used when detecting silent intervals.
    pub split_frame_length: usize,
    /// Hop length used when detecting silent intervals.
    pub split_hop_length: usize,
    /// Default number of Mel bands for `mel` extraction.
    pub n_mels: usize,
    /// Default number of cepstral coefficients for `mfcc` extraction.
    pub n_mfcc: usize,
    /// Number of Mel bands computed before the DCT in `mfcc` extraction.
    pub mfcc_n_mels: usize,
    /// Strip silent intervals before computing features.
    pub remove_silence: bool,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            n_fft: 336,
            hop_length: 84,
            top_db: 30.0,
            center: false,
            split_frame_length: 2048,
            split_hop_length: 512,
            n_mels: 80,
            n_mfcc: 40,
            mfcc_n_mels: 128,
            remove_silence: true,
        }
    }
}
