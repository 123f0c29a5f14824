//! # Singalong - Pitch Trainer
//!
//! Command-line front end for the sing-along pitch engine.
//!
//! ## Commands
//! - **live**: microphone against a WAV file or a reference note, ~60 frames/s
//! - **analyze**: the same pipeline over a recording, with a summary
//! - **init-config**: writes the default engine configuration as JSON

mod analyze;
mod live;
mod render;
mod sources;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use singalong_core::{Algorithm, EngineConfig, NoteResult, VocalPreset};
use tracing_subscriber::EnvFilter;

use crate::sources::{ReferenceSpec, WavSource};

/// Singalong - real-time pitch comparison for singers
#[derive(Parser)]
#[command(name = "singalong")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (JSON); flags below override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `singalong_core=debug`; RUST_LOG wins if set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Analysis window in samples (power of two)
    #[arg(long, global = true)]
    window: Option<usize>,

    /// Use a single algorithm for both sources
    #[arg(long, global = true)]
    algorithm: Option<Algorithm>,

    /// Vocal band preset (default, rock-pop, ballad, hip-hop, electronic)
    #[arg(long, global = true)]
    preset: Option<VocalPreset>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare your microphone against a reference in real time
    Live {
        #[command(flatten)]
        reference: ReferenceArgs,

        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<f64>,
    },

    /// Analyze a recorded WAV file
    Analyze {
        /// Recording of the singer
        file: PathBuf,

        #[command(flatten)]
        reference: ReferenceArgs,

        /// Print only the summary
        #[arg(short, long)]
        quiet: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Output path
        file: PathBuf,
    },
}

#[derive(Args)]
struct ReferenceArgs {
    /// Reference recording played back in real time
    #[arg(long, conflicts_with = "reference_note")]
    reference_wav: Option<PathBuf>,

    /// Reference note, e.g. A4 or Bb3
    #[arg(long)]
    reference_note: Option<NoteResult>,

    /// Run the reference through the vocal band filter
    #[arg(long)]
    vocal_filter: bool,
}

impl ReferenceArgs {
    fn spec(&self) -> Option<ReferenceSpec> {
        match (&self.reference_wav, self.reference_note) {
            (Some(path), _) => Some(ReferenceSpec::Wav(path.clone())),
            (None, Some(note)) => Some(ReferenceSpec::Note(note)),
            (None, None) => None,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Live { reference, seconds } => {
            config.reference.vocal_filter |= reference.vocal_filter;
            validate(&config)?;
            let limit = seconds.map(Duration::from_secs_f64);
            live::run(&config, reference.spec().as_ref(), limit)
        }
        Commands::Analyze {
            file,
            reference,
            quiet,
            json,
        } => {
            config.reference.vocal_filter |= reference.vocal_filter;
            validate(&config)?;

            let singer = WavSource::load(&file, config.window_size)?;
            let reference = reference
                .spec()
                .map(|spec| spec.open(singer.sample_rate(), &config))
                .transpose()?;

            let mut stdout = std::io::stdout().lock();
            let summary =
                analyze::analyze(&config, &singer, reference.as_ref(), quiet || json, &mut stdout)?;
            if json {
                writeln!(stdout, "{}", serde_json::to_string_pretty(&summary)?)?;
            } else {
                writeln!(stdout, "{}", analyze::summary_text(&summary))?;
            }
            Ok(())
        }
        Commands::InitConfig { file } => {
            validate(&config)?;
            config
                .save(&file)
                .with_context(|| format!("failed to write '{}'", file.display()))?;
            tracing::info!(path = %file.display(), "configuration written");
            Ok(())
        }
    }
}

/// Starts from the config file (or defaults) and applies command-line
/// overrides.
fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load configuration '{}'", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(window) = cli.window {
        config.window_size = window;
    }
    if let Some(algorithm) = cli.algorithm {
        config.force_algorithm(algorithm);
    }
    if let Some(preset) = cli.preset {
        config.vocal_band = preset.band();
    }
    Ok(config)
}

fn validate(config: &EngineConfig) -> Result<()> {
    config.validate().context("invalid configuration")
}
