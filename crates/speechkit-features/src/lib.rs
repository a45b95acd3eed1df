//! # speechkit-features
//!
//! Acoustic features for speech recognition: Mel-spectrograms and MFCCs
//! computed from audio files, with optional energy-based silence removal.
//!
//! # Pipeline
//!
//! ```text
//! audio file → symphonia decode → mono mix → rubato resample to 16kHz f32
//! → (optional) silence split at 30 dB below peak, concatenate voiced runs
//! → STFT power (336-sample Hann window, 84-sample hop)
//! → Slaney mel filterbank                       → mel   [T, n_mels]
//! → power_to_db → orthonormal DCT-II (128 mels)  → mfcc  [T, n_mfcc]
//! ```

#![deny(unsafe_code)]

pub mod audio;
pub mod config;
pub mod error;
pub mod extractor;
pub mod mel;
pub mod mfcc;
pub mod silence;
pub mod spectrum;

pub use config::{FeatureConfig, FeatureKind, HOP_LENGTH, N_FFT, SAMPLE_RATE, TOP_DB};
pub use error::{FeatureError, Result};
pub use extractor::{FeatureExtractor, melspectrogram, mfcc};
pub use silence::Interval;
