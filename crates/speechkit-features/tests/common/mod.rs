//! Shared helpers: synthesize PCM16 WAV files on disk.

#![allow(dead_code)]

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

/// Sine tone at `freq` Hz with peak amplitude `amp`.
pub fn tone(sample_rate: u32, seconds: f32, freq: f32, amp: f32) -> Vec<f32> {
    let n = (seconds * sample_rate as f32) as usize;
    (0..n)
        .map(|i| amp * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Encode mono f32 samples as a PCM16 WAV file.
pub fn wav_bytes(sample_rate: u32, samples: &[f32]) -> Vec<u8> {
    let data_size = u32::try_from(samples.len() * 2).unwrap();
    let mut buf = Vec::with_capacity(44 + samples.len() * 2);
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_size).to_le_bytes());
    buf.extend_from_slice(b"WAVE");
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&1u16.to_le_bytes()); // mono
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes());
    buf.extend_from_slice(&16u16.to_le_bytes());
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

/// Write `samples` as `name` inside `dir` and return the path.
pub fn write_wav(dir: &Path, name: &str, sample_rate: u32, samples: &[f32]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, wav_bytes(sample_rate, samples)).unwrap();
    path
}
