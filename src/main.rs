//! longtts CLI - Long-form speech assembly in Rust
//!
//! Command-line interface for chunking, parameter advice, quality analysis
//! and assembling pre-rendered chunk audio

use clap::{Parser, Subcommand};
use longtts::{
    advisor::{advise_crossfade, advise_steps, CrossfadeContext, TextFeatures},
    audio::{self, AudioBuffer, FadeLaw},
    pipeline::{CancellationToken, Orchestrator, PipelineOutcome, PipelineStage, WavDirectoryEngine},
    quality::QualityAnalyzer,
    text::{estimate_duration, ReferenceProfile},
    ChunkingStrategy, Config, Error, Result,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "longtts",
    about = "Long-form speech assembly: chunking, crossfading and quality checks",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split text into chunks and show the advised parameters
    Chunk {
        /// Text to chunk
        #[arg(short, long, conflicts_with = "input")]
        text: Option<String>,

        /// Input text file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Speaker reference audio (drives the adaptive budget)
        #[arg(short = 'v', long)]
        voice: Option<PathBuf>,

        /// Transcript of the reference audio
        #[arg(long, default_value = "")]
        reference_text: String,

        /// Chunking strategy (sentence, fixed, adaptive)
        #[arg(short, long)]
        strategy: Option<ChunkingStrategy>,

        /// Character budget per chunk
        #[arg(short, long)]
        max_chars: Option<usize>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show the advised step count for a text
    Advise {
        /// Text to inspect
        text: String,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Analyze the quality of an audio file
    Analyze {
        /// Audio file to analyze
        input: PathBuf,

        /// Print metrics as JSON
        #[arg(long)]
        json: bool,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Crossfade audio files together in order
    Stitch {
        /// Input audio files
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Output audio file path
        #[arg(short, long, default_value = "output.wav")]
        output: PathBuf,

        /// Crossfade duration in seconds
        #[arg(short, long, default_value = "0.15")]
        duration: f32,

        /// Fade law (equal_power, raised_cosine, linear)
        #[arg(short, long, default_value = "equal_power")]
        law: FadeLaw,

        /// Edge fade at both ends in seconds
        #[arg(long, default_value = "0.005")]
        edge_fade: f32,

        /// Peak-normalize the result to this level
        #[arg(long)]
        normalize: Option<f32>,
    },

    /// Run the full pipeline over pre-rendered chunk audio (NNNN.wav)
    Assemble {
        /// Input text file
        #[arg(short, long)]
        input: PathBuf,

        /// Speaker reference audio file
        #[arg(short = 'v', long)]
        voice: PathBuf,

        /// Transcript of the reference audio
        #[arg(long, default_value = "")]
        reference_text: String,

        /// Directory holding one WAV per chunk
        #[arg(short = 'd', long)]
        chunks_dir: PathBuf,

        /// Output audio file path
        #[arg(short, long, default_value = "output.wav")]
        output: PathBuf,

        /// Write run metadata as JSON
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Save the partial result if a chunk fails
        #[arg(long)]
        accept_partial: bool,
    },

    /// Generate default configuration file
    InitConfig {
        /// Output path for config file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Show information about the system
    Info,
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_any(path),
        None => Ok(Config::default()),
    }
}

fn read_text(text: Option<String>, input: Option<PathBuf>) -> Result<String> {
    match (text, input) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => Ok(std::fs::read_to_string(path)?),
        (None, None) => Err(Error::Config("Provide --text or --input".into())),
    }
}

fn load_reference(voice: Option<&Path>) -> Result<AudioBuffer> {
    match voice {
        Some(path) => audio::load_audio(path, None),
        None => AudioBuffer::new(Vec::new(), longtts::DEFAULT_SAMPLE_RATE),
    }
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chunk {
            text,
            input,
            voice,
            reference_text,
            strategy,
            max_chars,
            config,
        } => {
            let mut cfg = load_config(config)?;
            if let Some(strategy) = strategy {
                cfg.chunking.strategy = strategy;
            }
            if let Some(max_chars) = max_chars {
                cfg.chunking.max_chars = max_chars;
            }

            let text = read_text(text, input)?;
            let reference = load_reference(voice.as_deref())?;
            let orchestrator = Orchestrator::new(cfg)?;
            let session = orchestrator.prepare(&text, &reference, &reference_text)?;
            let advisor = &orchestrator.config().parameters.advisor;
            let rate = ReferenceProfile::new(reference.duration(), &reference_text)
                .chars_per_second(orchestrator.config().chunking.adaptive.min_reference_seconds);

            let chunks = session.chunks();
            for (i, (chunk, steps)) in chunks.iter().zip(session.steps()).enumerate() {
                println!(
                    "[{:04}] bytes {}..{} chars {:>4} steps {:>2}",
                    chunk.index(),
                    chunk.start(),
                    chunk.end(),
                    chunk.char_count(),
                    steps
                );
                println!("       {}", chunk.text());
                if let Some(rate) = rate {
                    println!("       ~{:.1}s", estimate_duration(chunk.text(), rate));
                }
                if let Some(next) = chunks.get(i + 1) {
                    let seconds =
                        advise_crossfade(&CrossfadeContext::between(chunk.text(), next.text()), advisor);
                    println!("       crossfade -> {:.3}s", seconds);
                }
            }
            println!("✓ {} chunks", chunks.len());
        }

        Commands::Advise { text, config } => {
            let cfg = load_config(config)?;
            let advisor = &cfg.parameters.advisor;
            let features = TextFeatures::extract(&text);

            println!("Characters: {}", features.chars);
            println!("Length band: {:?}", advisor.band(features.chars));
            println!("Expressive: {}", features.expressive);
            println!("Sentence marks: {}", features.sentence_marks);
            println!("Steps: {}", advise_steps(&text, advisor));
        }

        Commands::Analyze {
            input,
            json,
            config,
        } => {
            let cfg = load_config(config)?;
            let buffer = audio::load_audio(&input, None)?;
            let metrics = QualityAnalyzer::new(cfg.quality.thresholds).analyze(&buffer);

            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                println!("{} ({:.2}s @ {} Hz)", input.display(), buffer.duration(), buffer.sample_rate);
                print!("{}", metrics.report());
            }
        }

        Commands::Stitch {
            inputs,
            output,
            duration,
            law,
            edge_fade,
            normalize,
        } => {
            log::info!("Stitching {} files with {} crossfades", inputs.len(), law);

            let mut buffers = audio::load_audio_batch(&inputs, None)?.into_iter();
            let first = buffers
                .next()
                .ok_or_else(|| Error::Config("No input files".into()))?;

            let mut stitched = first;
            for buffer in buffers {
                let buffer = if buffer.sample_rate != stitched.sample_rate {
                    audio::resample(&buffer, stitched.sample_rate)?
                } else {
                    buffer
                };
                stitched = audio::crossfade(stitched, buffer, duration, law)?;
            }
            let mut stitched = audio::apply_edge_fades(stitched, edge_fade, law);
            if let Some(peak) = normalize {
                stitched.samples = audio::normalize_audio_peak(&stitched.samples, peak);
            }

            audio::save_audio(&output, &stitched)?;
            println!("✓ Stitched {:.2}s: {}", stitched.duration(), output.display());
        }

        Commands::Assemble {
            input,
            voice,
            reference_text,
            chunks_dir,
            output,
            metadata,
            config,
            accept_partial,
        } => {
            log::info!("longtts Assembler");
            log::info!("=================");

            let cfg = load_config(config)?;
            let text = std::fs::read_to_string(&input)?;
            let reference = audio::load_audio(&voice, None)?;
            let mut engine = WavDirectoryEngine::new(&chunks_dir)?;

            log::info!("Input file: {}", input.display());
            log::info!("Text length: {} characters", text.chars().count());
            log::info!("Voice: {}", voice.display());

            let progress = |stage: PipelineStage, fraction: f32| {
                log::debug!("{}: {:.0}%", stage.name(), fraction * 100.0);
            };
            let orchestrator = Orchestrator::new(cfg)?.with_progress(Box::new(progress));
            let outcome = orchestrator.run(
                &mut engine,
                &text,
                &reference,
                &reference_text,
                &CancellationToken::new(),
            )?;

            let (result, meta) = match outcome {
                PipelineOutcome::Completed { audio, metadata } => (audio, metadata),
                PipelineOutcome::Failed(failure) if accept_partial && failure.partial().is_some() => {
                    log::warn!("{}", failure.cause());
                    failure
                        .accept_partial()
                        .ok_or_else(|| Error::Audio("No partial audio to save".into()))?
                }
                PipelineOutcome::Failed(failure) => return Err(failure.into_cause()),
            };

            audio::save_audio(&output, &result)?;
            if let Some(path) = metadata {
                std::fs::write(&path, serde_json::to_string_pretty(&meta)?)?;
            }

            for warning in &meta.warnings {
                log::warn!("{}", warning);
            }
            log::info!("Duration: {}", meta.duration_formatted());
            log::info!("Processing time: {:.2}s", meta.processing_time);
            log::info!("Real-time factor: {:.3}x", meta.rtf);

            if meta.partial {
                println!(
                    "✓ Partial result ({} chunks): {}",
                    meta.chunks.len(),
                    output.display()
                );
            } else {
                println!("✓ Assembly complete: {}", output.display());
            }
        }

        Commands::InitConfig { output } => {
            log::info!("Creating default configuration...");

            Config::create_default(&output)?;

            println!("✓ Configuration saved to: {}", output.display());
        }

        Commands::Info => {
            println!("longtts - Long-form speech assembly");
            println!("===================================");
            println!("Version: {}", longtts::VERSION);
            println!("Platform: {}", std::env::consts::OS);
            println!("Architecture: {}", std::env::consts::ARCH);
            println!();
            println!("Chunking strategies: sentence, fixed, adaptive");
            println!(
                "Fade laws: {}",
                FadeLaw::ALL
                    .iter()
                    .map(|law| law.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!("Default sample rate: {} Hz", longtts::DEFAULT_SAMPLE_RATE);
            println!();
            println!("CPU Cores: {}", num_cpus::get());
            println!("Physical Cores: {}", num_cpus::get_physical());
        }
    }

    Ok(())
}
