//! Audio decoding and resampling to mono f32 at the analysis rate.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::error::{FeatureError, Result, ResultExt};

/// Resampler input chunk length in frames.
const RESAMPLE_CHUNK: usize = 1024;
/// Chunks fed when measuring the resampler lag.
const IMPULSE_CHUNKS: usize = 4;

/// Load an audio file as mono f32 samples at `target_rate`.
///
/// Supports WAV, M4A/AAC and other formats via symphonia. Multi-channel
/// audio is averaged to mono. A missing or unreadable file is reported as
/// [`FeatureError::Decode`].
pub fn load(path: impl AsRef<Path>, target_rate: u32) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let file = File::open(path).audio_decode(&format!("open {}", path.display()))?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        let _ = hint.with_extension(ext);
    }

    let (samples, source_rate) = decode_source(Box::new(file), &hint, target_rate)?;
    debug!(
        path = %path.display(),
        source_rate,
        samples = samples.len(),
        "loaded audio"
    );
    Ok(samples)
}

/// Decode in-memory audio bytes into mono f32 samples at `target_rate`.
///
/// `extension` (e.g. `"wav"`) is passed to the format probe as a hint.
/// Returns the samples and the source sample rate.
pub fn decode_audio(
    data: &[u8],
    extension: Option<&str>,
    target_rate: u32,
) -> Result<(Vec<f32>, u32)> {
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        let _ = hint.with_extension(ext);
    }
    decode_source(Box::new(Cursor::new(data.to_vec())), &hint, target_rate)
}

fn decode_source(
    source: Box<dyn MediaSource>,
    hint: &Hint,
    target_rate: u32,
) -> Result<(Vec<f32>, u32)> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .audio_decode("probe failed")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| FeatureError::Decode("no audio track found".into()))?;

    let codec_params = track.codec_params.clone();
    let track_id = track.id;
    let source_rate = codec_params.sample_rate.unwrap_or(target_rate);
    let channels = codec_params.channels.map_or(1, |c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .audio_decode("codec init failed")?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(FeatureError::Decode(format!("packet read: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet).audio_decode("decode")?;

        let spec = *decoded.spec();
        let n_frames = decoded.capacity();
        let mut sample_buf = SampleBuffer::<f32>::new(n_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();

        if channels > 1 {
            let scale = 1.0 / channels as f32;
            all_samples.extend(
                samples
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() * scale),
            );
        } else {
            all_samples.extend_from_slice(samples);
        }
    }

    if all_samples.is_empty() {
        return Err(FeatureError::Decode("no audio samples decoded".into()));
    }

    if source_rate != target_rate {
        debug!(source_rate, target_rate, "resampling");
        all_samples = resample(&all_samples, source_rate, target_rate)?;
    }

    Ok((all_samples, source_rate))
}

/// Resample mono audio from `from_rate` to `to_rate` using rubato.
///
/// The output is aligned to the input and holds exactly
/// `ceil(len * to_rate / from_rate)` samples. The sinc filter's lag is
/// measured with an impulse and trimmed (or padded) away.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::Resampler;

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let expected = (samples.len() as u64 * u64::from(to_rate)).div_ceil(u64::from(from_rate));
    let expected = usize::try_from(expected).resample("output length")?;

    let delay = measure_delay(ratio)?;
    let skip = usize::try_from(delay.max(0)).resample("delay")?;
    let lead = usize::try_from((-delay).max(0)).resample("delay")?;

    let mut resampler = sinc_resampler(ratio)?;
    let mut output = vec![0.0; lead];
    output.reserve(expected + skip + RESAMPLE_CHUNK);
    let mut chunks = samples.chunks(RESAMPLE_CHUNK);

    // Keep feeding (zero chunks once the input runs out) until the lagged
    // tail has been flushed.
    while output.len() < skip + expected {
        let mut chunk = chunks.next().map(<[f32]>::to_vec).unwrap_or_default();
        chunk.resize(RESAMPLE_CHUNK, 0.0);

        let resampled = resampler.process(&[chunk], None).resample("process")?;
        if let Some(channel) = resampled.first() {
            output.extend_from_slice(channel);
        }
    }

    debug!(delay, from_rate, to_rate, "resampled");
    Ok(output[skip..skip + expected].to_vec())
}

fn sinc_resampler(ratio: f64) -> Result<rubato::SincFixedIn<f32>> {
    use rubato::{SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK, 1).resample("init")
}

/// Output lag of [`sinc_resampler`] at `ratio`, in output samples.
///
/// A unit impulse is pushed through a fresh resampler and its peak, refined
/// to sub-sample precision, is compared with where the impulse belongs.
#[allow(clippy::cast_possible_truncation)]
fn measure_delay(ratio: f64) -> Result<i64> {
    use rubato::Resampler;

    let mut resampler = sinc_resampler(ratio)?;
    let at = RESAMPLE_CHUNK / 2;
    let mut chunk = vec![0.0_f32; RESAMPLE_CHUNK];
    chunk[at] = 1.0;

    let mut response = Vec::new();
    for _ in 0..IMPULSE_CHUNKS {
        let out = resampler
            .process(&[chunk.as_slice()], None)
            .resample("process")?;
        if let Some(channel) = out.first() {
            response.extend_from_slice(channel);
        }
        chunk.fill(0.0);
    }

    let peak = response
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(i, _)| i);
    let lag = refine_peak(&response, peak) - at as f64 * ratio;
    Ok(lag.round() as i64)
}

/// Parabolic interpolation of the peak at `i`.
fn refine_peak(y: &[f32], i: usize) -> f64 {
    if i == 0 || i + 1 >= y.len() {
        return i as f64;
    }
    let (a, b, c) = (f64::from(y[i - 1]), f64::from(y[i]), f64::from(y[i + 1]));
    let curvature = a - 2.0 * b + c;
    if curvature.abs() < f64::EPSILON {
        return i as f64;
    }
    i as f64 + 0.5 * (a - c) / curvature
}
