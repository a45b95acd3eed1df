//! # speechkit
//!
//! Command-line entry point: extract Mel-spectrogram or MFCC features from an
//! audio file, or run self-attention over its Mel features.

#![deny(unsafe_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ndarray::{Array2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use speechkit_attention::{AttentionConfig, MultiHeadAttention, mean_entropy};
use speechkit_features::{FeatureConfig, FeatureExtractor, FeatureKind, mel::power_to_db};
use speechkit_settings::{AttentionSettings, SpeechkitSettings};
use tracing::info;

/// Log-mel floor relative to the loudest bin, also used to scale attention input.
const ATTEND_TOP_DB: f32 = 80.0;

/// Speech feature extraction and attention toolkit.
#[derive(Parser, Debug)]
#[command(name = "speechkit", about = "Speech feature extraction and attention")]
struct Cli {
    /// Log level (overrides settings; `RUST_LOG` overrides both).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Mel-spectrogram `[frames, n_mels]`.
    Mel {
        /// Audio file (wav, m4a, ...).
        file: PathBuf,
        /// Number of Mel bands.
        #[arg(long)]
        n_mels: Option<usize>,
        /// Keep silent intervals (silence removal otherwise follows settings).
        #[arg(long)]
        keep_silence: bool,
        /// Print the matrix as JSON instead of its shape.
        #[arg(long)]
        json: bool,
    },
    /// Mel-frequency cepstral coefficients `[frames, n_mfcc]`.
    Mfcc {
        /// Audio file (wav, m4a, ...).
        file: PathBuf,
        /// Number of coefficients.
        #[arg(long)]
        n_mfcc: Option<usize>,
        /// Keep silent intervals (silence removal otherwise follows settings).
        #[arg(long)]
        keep_silence: bool,
        /// Print the matrix as JSON instead of its shape.
        #[arg(long)]
        json: bool,
    },
    /// Self-attention over the file's log-Mel features.
    Attend {
        /// Audio file (wav, m4a, ...).
        file: PathBuf,
        /// Number of Mel bands, also the attention hidden size.
        #[arg(long)]
        n_mels: Option<usize>,
        /// Number of attention heads (default from settings); must divide `n_mels`.
        #[arg(long)]
        n_head: Option<usize>,
        /// Seed for the projection weights.
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Keep silent intervals (silence removal otherwise follows settings).
        #[arg(long)]
        keep_silence: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = speechkit_settings::get_settings();

    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    speechkit_logging::init_subscriber(level);

    let stdout = std::io::stdout();
    run(&cli.command, settings, &mut stdout.lock())
}

fn run(command: &Command, settings: &SpeechkitSettings, out: &mut impl Write) -> Result<()> {
    let extractor = FeatureExtractor::new(FeatureConfig::from_settings(&settings.features))
        .context("Invalid feature settings")?;
    let defaults = &settings.features;
    let remove_silence = |keep: bool| defaults.remove_silence && !keep;

    match command {
        Command::Mel {
            file,
            n_mels,
            keep_silence,
            json,
        } => {
            let kind = FeatureKind::Mel {
                n_mels: n_mels.unwrap_or(defaults.n_mels),
            };
            let features = extract(&extractor, file, kind, remove_silence(*keep_silence))?;
            print_features(out, "mel", &features, *json)
        }
        Command::Mfcc {
            file,
            n_mfcc,
            keep_silence,
            json,
        } => {
            let kind = FeatureKind::Mfcc {
                n_mfcc: n_mfcc.unwrap_or(defaults.n_mfcc),
            };
            let features = extract(&extractor, file, kind, remove_silence(*keep_silence))?;
            print_features(out, "mfcc", &features, *json)
        }
        Command::Attend {
            file,
            n_mels,
            n_head,
            seed,
            keep_silence,
        } => {
            let n_mels = n_mels.unwrap_or(defaults.n_mels);
            let mut heads = settings.attention.clone();
            if let Some(n_head) = n_head {
                heads.n_head = *n_head;
            }
            attend(
                &extractor,
                file,
                n_mels,
                &heads,
                *seed,
                remove_silence(*keep_silence),
                out,
            )
        }
    }
}

fn extract(
    extractor: &FeatureExtractor,
    file: &Path,
    kind: FeatureKind,
    remove_silence: bool,
) -> Result<Array2<f32>> {
    let features = extractor
        .extract(file, kind, remove_silence)
        .with_context(|| format!("Failed to extract features from {}", file.display()))?;
    info!(
        file = %file.display(),
        frames = features.nrows(),
        dim = features.ncols(),
        "extracted features"
    );
    Ok(features)
}

fn print_features(out: &mut impl Write, name: &str, features: &Array2<f32>, as_json: bool) -> Result<()> {
    if as_json {
        let rows: Vec<Vec<f32>> = features.rows().into_iter().map(|r| r.to_vec()).collect();
        let value = json!({
            "feature": name,
            "shape": [features.nrows(), features.ncols()],
            "data": rows,
        });
        serde_json::to_writer(&mut *out, &value).context("Failed to write JSON")?;
        writeln!(out)?;
    } else {
        writeln!(
            out,
            "{name}: {} frames x {} features",
            features.nrows(),
            features.ncols()
        )?;
    }
    Ok(())
}

fn attend(
    extractor: &FeatureExtractor,
    file: &Path,
    n_mels: usize,
    heads: &AttentionSettings,
    seed: u64,
    remove_silence: bool,
    out: &mut impl Write,
) -> Result<()> {
    let config = AttentionConfig::from_settings(n_mels, heads);
    let mha = MultiHeadAttention::with_rng(config, &mut StdRng::seed_from_u64(seed))
        .with_context(|| {
            format!("Cannot split {n_mels} mel bands into {} heads", heads.n_head)
        })?;

    let mel = extract(extractor, file, FeatureKind::Mel { n_mels }, remove_silence)?;
    // Log compression keeps raw dot-product scores in a usable range.
    let log_mel = power_to_db(&mel, 1.0, 1e-10, Some(ATTEND_TOP_DB)) / ATTEND_TOP_DB;
    let batch = log_mel.insert_axis(Axis(0));

    let result = mha
        .attend(&batch, &batch)
        .context("Attention forward pass failed")?;
    let (b, len, hidden) = result.output.dim();
    writeln!(out, "output: ({b}, {len}, {hidden})")?;
    writeln!(
        out,
        "mean attention entropy: {:.4} nats",
        mean_entropy(&result.distribution)
    )?;
    Ok(())
}
