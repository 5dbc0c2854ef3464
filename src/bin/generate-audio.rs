use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use tutor_audio::engines::elevenlabs::ElevenLabsEngine;
use tutor_audio::pipeline::{Pipeline, RunConfig};
use tutor_audio::template::ParameterTable;
use tutor_audio::{Error, Result};

/// Generate tutor audio and sentence timing from lesson sources.
#[derive(Debug, Parser)]
#[command(name = "generate-audio", version)]
struct Cli {
    /// Lesson source directory or file.
    #[arg(long, default_value = "src")]
    corpus: PathBuf,
    /// Extension of source files to scan.
    #[arg(long, default_value = "js")]
    extension: String,
    /// Output directory for audio, mapping and timing files.
    #[arg(long, default_value = "public/audio")]
    audio_dir: PathBuf,
    /// JSON file of placeholder values: `{"name": [values...]}`.
    #[arg(long)]
    params: Option<PathBuf>,
    /// Concurrent synthesis requests.
    #[arg(long, default_value_t = 1)]
    workers: usize,
    /// Skip character timing and sentence timing files.
    #[arg(long)]
    no_timing: bool,
    /// Print what would change without synthesizing or deleting anything.
    #[arg(long)]
    dry_run: bool,
}

fn load_params(path: Option<&PathBuf>) -> Result<ParameterTable> {
    let Some(path) = path else {
        return Ok(ParameterTable::tutor_defaults());
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("invalid parameter file {}: {e}", path.display())))
}

fn run(cli: Cli) -> Result<()> {
    let config = RunConfig {
        corpus_root: cli.corpus,
        extension: cli.extension,
        audio_dir: cli.audio_dir,
        params: load_params(cli.params.as_ref())?,
        workers: cli.workers.max(1),
        timing: !cli.no_timing,
        ..RunConfig::default()
    };

    if cli.dry_run {
        let pipeline = Pipeline::new(config, NoEngine);
        let (desired, plan) = pipeline.plan()?;
        println!("{} unique tutor texts", desired.len());
        for artifact in &plan.to_generate {
            println!("+ {}  {}", artifact.key, artifact.text);
        }
        for filename in &plan.to_remove {
            println!("- {filename}");
        }
        println!(
            "{} to generate, {} up to date, {} stale",
            plan.to_generate.len(),
            plan.to_skip.len(),
            plan.to_remove.len()
        );
        return Ok(());
    }

    let engine = ElevenLabsEngine::from_env()?;
    let summary = Pipeline::new(config, engine).run()?;

    println!("Summary:");
    println!("  generated: {}", summary.generated);
    println!("  skipped:   {}", summary.skipped);
    println!("  failed:    {}", summary.failed);
    println!("  removed:   {}", summary.removed);
    for (text, cause) in &summary.failures {
        println!("  ! {text}: {cause}");
    }
    Ok(())
}

/// Stand-in engine for dry runs; planning never synthesizes.
struct NoEngine;

impl tutor_audio::Synthesizer for NoEngine {
    fn synthesize(&self, _text: &str, _voice: &tutor_audio::VoiceConfig) -> Result<Vec<u8>> {
        Err(Error::Synthesis("dry run".to_string()))
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
