//! Long-form pipeline orchestration
//!
//! Coordinates chunking, parameter advice, the external synthesis engine,
//! crossfading and quality checks.

mod engine;
mod orchestrator;

pub use engine::{engine_fn, FnEngine, WavDirectoryEngine};
pub use orchestrator::{
    ChunkReport, Orchestrator, PipelineFailure, PipelineMetadata, PipelineOutcome, Session,
};

use crate::audio::AudioBuffer;
use crate::config::Config;
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Pipeline stage enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Chunking,
    ReferenceCheck,
    Synthesis,
    Finalize,
    OutputCheck,
}

impl PipelineStage {
    /// Get stage name
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Chunking => "Chunking",
            PipelineStage::ReferenceCheck => "Reference Check",
            PipelineStage::Synthesis => "Synthesis",
            PipelineStage::Finalize => "Finalize",
            PipelineStage::OutputCheck => "Output Check",
        }
    }

    /// Get all stages in order
    pub fn all() -> Vec<PipelineStage> {
        vec![
            PipelineStage::Chunking,
            PipelineStage::ReferenceCheck,
            PipelineStage::Synthesis,
            PipelineStage::Finalize,
            PipelineStage::OutputCheck,
        ]
    }
}

/// Pipeline progress callback: stage and fraction of that stage completed
pub type ProgressCallback = Box<dyn Fn(PipelineStage, f32) + Send + Sync>;

/// Everything the engine needs to render one chunk
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    /// Position of the chunk in the run
    pub chunk_index: usize,
    /// Chunk text
    pub text: &'a str,
    /// Reference voice clip
    pub reference: &'a AudioBuffer,
    /// Transcript of the reference clip
    pub reference_text: &'a str,
    /// Refinement step count
    pub steps: u32,
}

/// External text-to-waveform engine
///
/// Calls are made strictly one at a time and in chunk order; an engine may
/// keep state between calls.
pub trait SynthesisEngine {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Render one chunk
    fn synthesize(
        &mut self,
        request: &SynthesisRequest<'_>,
    ) -> std::result::Result<AudioBuffer, Self::Error>;
}

impl<E: SynthesisEngine + ?Sized> SynthesisEngine for &mut E {
    type Error = E::Error;

    fn synthesize(
        &mut self,
        request: &SynthesisRequest<'_>,
    ) -> std::result::Result<AudioBuffer, Self::Error> {
        (**self).synthesize(request)
    }
}

/// Cooperative cancellation flag, checked before each synthesis call
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; a call already in flight is not interrupted
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused, e.g. for a resume
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Run the whole pipeline once with `config` and no cancellation
pub fn run<E: SynthesisEngine>(
    engine: &mut E,
    text: &str,
    reference: &AudioBuffer,
    reference_text: &str,
    config: Config,
) -> Result<PipelineOutcome> {
    Orchestrator::new(config)?.run(
        engine,
        text,
        reference,
        reference_text,
        &CancellationToken::new(),
    )
}
