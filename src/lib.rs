//! longtts - Long-form speech assembly in Rust
//!
//! Turns text of arbitrary length into one continuous waveform by driving a
//! short-utterance synthesis engine chunk by chunk and stitching the results.
//!
//! # Features
//! - Sentence, fixed-length and reference-adaptive text chunking
//! - Per-chunk step count and crossfade duration advice
//! - Equal-power, raised-cosine and linear crossfades with cached curves
//! - SNR / clipping / silence / dynamic range / flatness quality scoring
//! - Resumable runs that keep partial audio on failure
//!
//! # Example
//! ```no_run
//! use longtts::pipeline::{CancellationToken, Orchestrator, WavDirectoryEngine};
//! use longtts::{audio, Config};
//!
//! let config = Config::load("config.yaml").unwrap();
//! let orchestrator = Orchestrator::new(config).unwrap();
//! let reference = audio::load_audio("speaker.wav", None).unwrap();
//! let mut engine = WavDirectoryEngine::new("chunks/").unwrap();
//!
//! let outcome = orchestrator
//!     .run(&mut engine, "Long text...", &reference, "Reference words.", &CancellationToken::new())
//!     .unwrap();
//! let (audio, metadata) = outcome.into_result().unwrap();
//! audio::save_audio("out.wav", &audio).unwrap();
//! println!("{} chunks, {}", metadata.chunks.len(), metadata.duration_formatted());
//! ```

// Allow traditional for loops - often clearer for audio DSP code
#![allow(clippy::needless_range_loop)]

pub mod advisor;
pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod quality;
pub mod text;

pub use audio::{AudioBuffer, FadeLaw};
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{Orchestrator, PipelineOutcome, SynthesisEngine};
pub use quality::{QualityLevel, QualityMetrics};
pub use text::{ChunkingStrategy, TextChunk};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default sample rate for generated audio
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;
