use clap::{Parser, Subcommand};
use std::path::PathBuf;
use whistle2sheet::analysis::format_note_listing;
use whistle2sheet::{validate_input, Config, FailureKind, WhistleToSheet};

/// Whistle-to-Sheet Transcription System
#[derive(Parser)]
#[command(name = "whistle2sheet")]
#[command(about = "Turn a whistled melody into notes, MIDI and a staff preview")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe a WAV recording
    Transcribe {
        /// Input audio file (WAV)
        input: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the sample rate stored in the WAV header
        #[arg(long)]
        sample_rate: Option<u32>,

        /// Also write a sine-tone preview.wav
        #[arg(long)]
        preview: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Quiet output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Transcribe {
            input,
            output,
            config,
            sample_rate,
            preview,
            verbose,
            quiet,
        } => {
            if verbose && quiet {
                anyhow::bail!("Cannot specify both --verbose and --quiet");
            }
            init_logging(verbose, quiet);

            let config = if let Some(config_path) = config {
                whistle2sheet::config::load_config(config_path)?
            } else {
                Config::default()
            };

            validate_input(&input, &config, sample_rate)?;

            let processor = WhistleToSheet::new(config);

            if !quiet {
                println!("Analyzing whistled melody in {}...", input.display());
            }

            let (transcription, files) =
                match processor.process(&input, &output, sample_rate, preview) {
                    Ok(result) => result,
                    Err(e) if e.kind() == FailureKind::EmptyMelody => {
                        println!(
                            "No clear melody detected. Try whistling more clearly or loudly."
                        );
                        return Err(e.into());
                    }
                    Err(e) => return Err(e.into()),
                };

            if !quiet {
                println!("Detected {} musical notes:", transcription.notes.len());
                println!("{}", format_note_listing(&transcription.notes));
                for path in [&files.midi, &files.sheet, &files.analysis, &files.preview]
                    .into_iter()
                    .flatten()
                {
                    println!("Wrote {}", path.display());
                }
            }
            if let Err(e) = &transcription.sheet_image {
                eprintln!("Warning: {}", e);
            }
            if let Err(e) = &transcription.midi_bytes {
                eprintln!("Warning: {}", e);
            }
        }
        Commands::ValidateConfig { config } => {
            let config = whistle2sheet::config::load_config(config)?;
            println!("Configuration is valid");
            if let Ok(json) = serde_json::to_string_pretty(&config) {
                println!("{}", json);
            }
        }
        Commands::ShowConfig => {
            let config = Config::default();
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
    }

    Ok(())
}
