//! canto CLI: render MML scores with a voicebank.
//!
//! Usage:
//!   canto render song.mml --voicebank voices/teto -o song.wav
//!   canto tokens song.mml
//!   canto events song.mml
//!   canto syllables --voicebank voices/teto

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use canto_formats::ScoreError;
use canto_ir::Event;
use canto_master::{Config, Controller, ControllerError, Project};
use clap::{Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(name = "canto")]
#[command(about = "Singing synthesizer for MML scores", long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: ./canto.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a score to a WAV file
    Render {
        /// MML score
        score: PathBuf,

        /// Voicebank directory containing oto.ini
        #[arg(long)]
        voicebank: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Output sample rate in Hz
        #[arg(long)]
        sample_rate: Option<u32>,

        /// Neither read nor write the analysis cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Print the tokens of a score
    Tokens {
        score: PathBuf,
    },

    /// Print the events of each track of a score
    Events {
        score: PathBuf,
    },

    /// List the syllables of a voicebank
    Syllables {
        #[arg(long)]
        voicebank: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ControllerError> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            score,
            voicebank,
            output,
            sample_rate,
            no_cache,
        } => {
            if let Some(rate) = sample_rate {
                config.render.sample_rate = rate;
            }
            if no_cache {
                config.analysis.cache = false;
            }
            config.validate()?;

            let mut controller = Controller::new(config);
            controller.open_voicebank(&voicebank)?;
            let waveform = controller.render_to_file(&score, &output)?;
            println!(
                "{}: {:.2} s at {} Hz",
                output.display(),
                waveform.duration(),
                waveform.sample_rate()
            );
        }
        Commands::Tokens { score } => {
            let text = read_score(&score)?;
            let tokens = canto_formats::tokenize(&text).map_err(ScoreError::from)?;
            for token in tokens {
                println!("{:>6}  {:<14} {:?}", token.offset, token.kind.name(), token.span);
            }
        }
        Commands::Events { score } => {
            let project = Controller::new(config).load_score(&score)?;
            print_events(&project);
        }
        Commands::Syllables { voicebank } => {
            let mut controller = Controller::new(config);
            let index = controller.open_voicebank(&voicebank)?;
            for entry in index.entries() {
                println!(
                    "{:<12} {:<20} pitch {:>3}  offset {:.3}  consonant {:.3}  cutoff {:.3}",
                    entry.syllable,
                    entry.sample_path,
                    entry.recorded_pitch,
                    entry.onset_offset,
                    entry.consonant_boundary,
                    entry.cutoff_from_end
                );
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config, ControllerError> {
    if let Some(path) = path {
        return Ok(Config::load(path)?);
    }
    let local = Path::new(Config::FILE_NAME);
    if local.is_file() {
        return Ok(Config::load(local)?);
    }
    Ok(Config::default())
}

fn read_score(path: &Path) -> Result<String, ControllerError> {
    std::fs::read_to_string(path).map_err(|source| ControllerError::Read {
        path: path.to_owned(),
        source,
    })
}

fn print_events(project: &Project) {
    for track in &project.tracks {
        println!("@{} ({} events, {:.2} s)", track.name, track.events.len(), track.duration());
        for (i, event) in track.events.iter().enumerate() {
            match event {
                Event::Note {
                    pitch,
                    duration,
                    syllable,
                } => println!(
                    "  {:>4}  note {:>4}  {:.3} s  {}",
                    i,
                    pitch,
                    duration,
                    syllable.as_deref().unwrap_or("-")
                ),
                Event::Rest { duration } => println!("  {:>4}  rest       {:.3} s", i, duration),
            }
        }
    }
}
