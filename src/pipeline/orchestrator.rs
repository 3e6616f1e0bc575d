//! Chunk-by-chunk assembly
//!
//! Prepare (chunk, plan steps, check the reference) then synthesize and merge
//! each chunk in order, then finalize. Any failure after Prepare leaves the
//! already merged audio in the returned [`PipelineFailure`].

use super::{CancellationToken, PipelineStage, ProgressCallback, SynthesisEngine, SynthesisRequest};
use crate::advisor::{advise_crossfade, advise_steps, CrossfadeContext};
use crate::audio::{apply_edge_fades, compute_rms, resample, AudioBuffer, FadeCurveCache, FadeLaw};
use crate::config::{Config, QualityPolicy};
use crate::quality::{QualityAnalyzer, QualityMetrics};
use crate::text::{Chunker, ChunkingStrategy, ReferenceProfile, TextChunk};
use crate::{Error, Result};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::time::{Duration, Instant};

/// What happened to one chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkReport {
    pub index: usize,
    /// Byte offset of the chunk in the input text
    pub start: usize,
    pub text: String,
    pub steps: u32,
    /// Crossfade into the previous chunk; `None` for the first chunk
    pub crossfade_seconds: Option<f32>,
    /// Samples the engine produced for this chunk
    pub samples: usize,
}

/// Run metadata attached to a result
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineMetadata {
    pub strategy: ChunkingStrategy,
    /// Character budget actually used by the chunker
    pub max_chars: usize,
    pub chunks: Vec<ChunkReport>,
    pub reference_quality: Option<QualityMetrics>,
    pub output_quality: Option<QualityMetrics>,
    pub warnings: Vec<String>,
    pub sample_rate: u32,
    /// Output duration in seconds
    pub duration: f32,
    /// Wall time spent inside the pipeline in seconds
    pub processing_time: f32,
    /// Real-time factor
    pub rtf: f32,
    /// Not every chunk made it into the audio
    pub partial: bool,
}

impl PipelineMetadata {
    /// Get duration as formatted string (MM:SS)
    pub fn duration_formatted(&self) -> String {
        let minutes = (self.duration / 60.0) as u32;
        let seconds = (self.duration % 60.0) as u32;
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Progress of one run, carried across failures so work is never redone
#[derive(Debug)]
pub struct Session {
    chunks: Vec<TextChunk>,
    steps: Vec<u32>,
    strategy: ChunkingStrategy,
    max_chars: usize,
    next: usize,
    assembled: Option<AudioBuffer>,
    /// `assembled` already has its final edge fades
    finalized: bool,
    reports: Vec<ChunkReport>,
    warnings: Vec<String>,
    reference_quality: Option<QualityMetrics>,
    output_quality: Option<QualityMetrics>,
    elapsed: Duration,
}

impl Session {
    fn new(
        chunks: Vec<TextChunk>,
        steps: Vec<u32>,
        strategy: ChunkingStrategy,
        max_chars: usize,
    ) -> Self {
        Self {
            chunks,
            steps,
            strategy,
            max_chars,
            next: 0,
            assembled: None,
            finalized: false,
            reports: Vec::new(),
            warnings: Vec::new(),
            reference_quality: None,
            output_quality: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn chunks(&self) -> &[TextChunk] {
        &self.chunks
    }

    /// Planned step count per chunk
    pub fn steps(&self) -> &[u32] {
        &self.steps
    }

    /// Number of chunks already merged
    pub fn completed(&self) -> usize {
        self.next
    }

    pub fn is_complete(&self) -> bool {
        self.next == self.chunks.len()
    }

    /// Audio merged so far, without final edge fades
    pub fn assembled(&self) -> Option<&AudioBuffer> {
        self.assembled.as_ref()
    }

    pub fn reports(&self) -> &[ChunkReport] {
        &self.reports
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn reference_quality(&self) -> Option<&QualityMetrics> {
        self.reference_quality.as_ref()
    }

    fn metadata(&self, audio: &AudioBuffer) -> PipelineMetadata {
        let duration = audio.duration();
        let processing_time = self.elapsed.as_secs_f32();
        let rtf = if duration > 0.0 {
            processing_time / duration
        } else {
            0.0
        };

        PipelineMetadata {
            strategy: self.strategy,
            max_chars: self.max_chars,
            chunks: self.reports.clone(),
            reference_quality: self.reference_quality.clone(),
            output_quality: self.output_quality.clone(),
            warnings: self.warnings.clone(),
            sample_rate: audio.sample_rate,
            duration,
            processing_time,
            rtf,
            partial: !self.is_complete(),
        }
    }
}

/// A run that stopped before producing its final output
#[derive(Debug)]
pub struct PipelineFailure {
    chunk_index: usize,
    cause: Error,
    session: Session,
    law: FadeLaw,
    edge_fade_seconds: f32,
}

impl PipelineFailure {
    /// Chunk the run stopped at; equals the chunk count for a rejected output
    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    pub fn cause(&self) -> &Error {
        &self.cause
    }

    pub fn into_cause(self) -> Error {
        self.cause
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Audio merged from chunks `0..chunk_index`, if any
    pub fn partial(&self) -> Option<&AudioBuffer> {
        self.session.assembled.as_ref()
    }

    /// Take the partial audio as the result, with edge fades applied
    pub fn accept_partial(self) -> Option<(AudioBuffer, PipelineMetadata)> {
        let PipelineFailure {
            mut session,
            law,
            edge_fade_seconds,
            ..
        } = self;
        let audio = session.assembled.take()?;
        let audio = if session.finalized {
            audio
        } else {
            apply_edge_fades(audio, edge_fade_seconds, law)
        };

        warn!(
            "Accepting partial output: {}/{} chunks, {:.2}s",
            session.next,
            session.chunks.len(),
            audio.duration()
        );
        let metadata = session.metadata(&audio);
        Some((audio, metadata))
    }
}

/// Terminal state of a run
#[derive(Debug)]
pub enum PipelineOutcome {
    Completed {
        audio: AudioBuffer,
        metadata: PipelineMetadata,
    },
    Failed(PipelineFailure),
}

impl PipelineOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PipelineOutcome::Completed { .. })
    }

    /// Completed audio, or the failure cause with partial work discarded
    pub fn into_result(self) -> Result<(AudioBuffer, PipelineMetadata)> {
        match self {
            PipelineOutcome::Completed { audio, metadata } => Ok((audio, metadata)),
            PipelineOutcome::Failed(failure) => Err(failure.into_cause()),
        }
    }
}

/// Drives a [`SynthesisEngine`] over long text
pub struct Orchestrator {
    config: Config,
    analyzer: QualityAnalyzer,
    curves: FadeCurveCache,
    progress: Option<ProgressCallback>,
}

impl Orchestrator {
    /// Create orchestrator from a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            analyzer: QualityAnalyzer::new(config.quality.thresholds.clone()),
            config,
            curves: FadeCurveCache::new(),
            progress: None,
        })
    }

    /// Set progress callback
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn report(&self, stage: PipelineStage, fraction: f32) {
        if let Some(ref callback) = self.progress {
            callback(stage, fraction);
        }
    }

    /// Chunker for the configured strategy
    pub fn chunker(&self, reference: &AudioBuffer, reference_text: &str) -> Chunker {
        let chunking = &self.config.chunking;
        match chunking.strategy {
            ChunkingStrategy::Sentence => Chunker::Sentence,
            ChunkingStrategy::Fixed => Chunker::Fixed {
                lookback: chunking.fixed_lookback,
            },
            ChunkingStrategy::Adaptive => Chunker::Adaptive {
                reference: ReferenceProfile::new(reference.duration(), reference_text),
                budget: chunking.adaptive,
            },
        }
    }

    /// Step count for every chunk, computed in parallel
    pub fn plan_steps(&self, chunks: &[TextChunk]) -> Vec<u32> {
        let params = &self.config.parameters;
        if params.adaptive {
            chunks
                .par_iter()
                .map(|chunk| advise_steps(chunk.text(), &params.advisor))
                .collect()
        } else {
            vec![params.fixed_steps; chunks.len()]
        }
    }

    /// Chunk the text and plan steps without touching the engine
    pub fn prepare(
        &self,
        text: &str,
        reference: &AudioBuffer,
        reference_text: &str,
    ) -> Result<Session> {
        self.report(PipelineStage::Chunking, 0.0);

        let chunker = self.chunker(reference, reference_text);
        let requested = self.config.chunking.max_chars;
        let max_chars = chunker.effective_max_chars(requested);
        let chunks = chunker.chunk(text, requested)?;
        let steps = self.plan_steps(&chunks);

        info!(
            "Split {} chars into {} chunks ({} strategy, {} chars per chunk)",
            text.chars().count(),
            chunks.len(),
            chunker.strategy(),
            max_chars
        );
        self.report(PipelineStage::Chunking, 1.0);

        Ok(Session::new(chunks, steps, chunker.strategy(), max_chars))
    }

    /// Run the pipeline from the start
    ///
    /// Structural errors (bad configuration, chunking) are returned as `Err`.
    /// Engine failures, cancellation and blocking quality rejections end in
    /// [`PipelineOutcome::Failed`] with the partial audio preserved.
    pub fn run<E: SynthesisEngine>(
        &self,
        engine: &mut E,
        text: &str,
        reference: &AudioBuffer,
        reference_text: &str,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome> {
        let started = Instant::now();
        let mut session = self.prepare(text, reference, reference_text)?;

        if self.config.quality.check_reference {
            self.report(PipelineStage::ReferenceCheck, 0.0);
            let metrics = self.analyzer.analyze(reference);
            debug!("Reference quality: {} ({:.1})", metrics.level, metrics.overall_score);
            let rejection = self.judge("reference", &metrics, &mut session.warnings);
            session.reference_quality = Some(metrics);
            if let Some(cause) = rejection {
                return Ok(self.fail(session, started, cause));
            }
            self.report(PipelineStage::ReferenceCheck, 1.0);
        }

        self.execute(session, engine, reference, reference_text, cancel, started)
    }

    /// Continue a failed run from the chunk it stopped at
    ///
    /// Resuming after a rejected reference or output accepts that audio.
    pub fn resume<E: SynthesisEngine>(
        &self,
        failure: PipelineFailure,
        engine: &mut E,
        reference: &AudioBuffer,
        reference_text: &str,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome> {
        info!(
            "Resuming at chunk {}/{} after: {}",
            failure.chunk_index + 1,
            failure.session.chunks.len(),
            failure.cause
        );
        self.execute(
            failure.session,
            engine,
            reference,
            reference_text,
            cancel,
            Instant::now(),
        )
    }

    fn execute<E: SynthesisEngine>(
        &self,
        mut session: Session,
        engine: &mut E,
        reference: &AudioBuffer,
        reference_text: &str,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<PipelineOutcome> {
        let total = session.chunks.len();

        while session.next < total {
            let index = session.next;
            if cancel.is_cancelled() {
                return Ok(self.fail(session, started, Error::Cancelled { chunk_index: index }));
            }

            let audio = match self.synthesize_chunk(engine, &session, reference, reference_text) {
                Ok(audio) => audio,
                Err(e) => return Ok(self.fail(session, started, e)),
            };
            self.merge(&mut session, audio)?;
            self.report(PipelineStage::Synthesis, session.next as f32 / total as f32);
        }

        self.finalize(session, started, reference.sample_rate)
    }

    fn synthesize_chunk<E: SynthesisEngine>(
        &self,
        engine: &mut E,
        session: &Session,
        reference: &AudioBuffer,
        reference_text: &str,
    ) -> Result<AudioBuffer> {
        let index = session.next;
        let chunk = &session.chunks[index];
        let request = SynthesisRequest {
            chunk_index: index,
            text: chunk.text(),
            reference,
            reference_text,
            steps: session.steps[index],
        };
        debug!(
            "Synthesizing chunk {}/{} ({} chars, {} steps)",
            index + 1,
            session.chunks.len(),
            chunk.char_count(),
            request.steps
        );

        let audio = engine.synthesize(&request).map_err(|e| Error::Synthesis {
            chunk_index: index,
            source: Box::new(e),
        })?;
        if audio.is_empty() {
            return Err(Error::Synthesis {
                chunk_index: index,
                source: "engine returned an empty buffer".into(),
            });
        }

        match session.assembled.as_ref() {
            Some(running) if running.sample_rate != audio.sample_rate => {
                warn!(
                    "Chunk {} came back at {} Hz, resampling to {} Hz",
                    index, audio.sample_rate, running.sample_rate
                );
                resample(&audio, running.sample_rate)
            }
            _ => Ok(audio),
        }
    }

    fn merge(&self, session: &mut Session, audio: AudioBuffer) -> Result<()> {
        let index = session.next;
        let law = self.config.crossfade.law;
        let samples = audio.len();

        let (assembled, crossfade_seconds) = match session.assembled.take() {
            None => (
                self.curves
                    .apply_edge_fades(audio, self.config.crossfade.edge_fade_seconds, law),
                None,
            ),
            Some(running) => {
                let seconds =
                    self.crossfade_seconds(&session.chunks[index - 1], &session.chunks[index], &running);
                (self.curves.crossfade(running, audio, seconds, law)?, Some(seconds))
            }
        };
        debug!(
            "Merged chunk {}: {} samples, crossfade {:?}s, running {:.2}s",
            index,
            samples,
            crossfade_seconds,
            assembled.duration()
        );
        session.assembled = Some(assembled);

        let chunk = &session.chunks[index];
        session.reports.push(ChunkReport {
            index,
            start: chunk.start(),
            text: chunk.text().to_string(),
            steps: session.steps[index],
            crossfade_seconds,
            samples,
        });
        session.next += 1;
        Ok(())
    }

    fn crossfade_seconds(
        &self,
        preceding: &TextChunk,
        following: &TextChunk,
        running: &AudioBuffer,
    ) -> f32 {
        let params = &self.config.parameters;
        if !params.adaptive {
            return params.fixed_crossfade_seconds;
        }

        let tail_rms = compute_rms(running.tail(self.config.crossfade.tail_window_seconds));
        let context =
            CrossfadeContext::between(preceding.text(), following.text()).with_tail_rms(tail_rms);
        advise_crossfade(&context, &params.advisor)
    }

    fn finalize(
        &self,
        mut session: Session,
        started: Instant,
        fallback_rate: u32,
    ) -> Result<PipelineOutcome> {
        self.report(PipelineStage::Finalize, 0.0);

        let crossfade = &self.config.crossfade;
        let audio = match session.assembled.take() {
            Some(audio) if session.finalized => audio,
            Some(audio) => {
                self.curves
                    .apply_edge_fades(audio, crossfade.edge_fade_seconds, crossfade.law)
            }
            None => {
                warn!("Nothing to synthesize");
                session.warnings.push("Input text produced no chunks".to_string());
                AudioBuffer::new(Vec::new(), fallback_rate)?
            }
        };

        if self.config.quality.check_output && !session.finalized && !audio.is_empty() {
            self.report(PipelineStage::OutputCheck, 0.0);
            let metrics = self.analyzer.analyze(&audio);
            debug!("Output quality: {} ({:.1})", metrics.level, metrics.overall_score);
            let rejection = self.judge("output", &metrics, &mut session.warnings);
            session.output_quality = Some(metrics);
            if let Some(cause) = rejection {
                session.assembled = Some(audio);
                session.finalized = true;
                return Ok(self.fail(session, started, cause));
            }
            self.report(PipelineStage::OutputCheck, 1.0);
        }

        session.elapsed += started.elapsed();
        let metadata = session.metadata(&audio);
        info!(
            "Assembled {} chunks: {:.2}s audio in {:.2}s (RTF: {:.3})",
            metadata.chunks.len(),
            metadata.duration,
            metadata.processing_time,
            metadata.rtf
        );

        Ok(PipelineOutcome::Completed { audio, metadata })
    }

    /// Record a below-minimum result; `Some` when the policy blocks the run
    fn judge(
        &self,
        stage: &str,
        metrics: &QualityMetrics,
        warnings: &mut Vec<String>,
    ) -> Option<Error> {
        let quality = &self.config.quality;
        if metrics.meets(quality.min_level) {
            return None;
        }

        let message = format!(
            "{} quality is {} ({:.1}/100), below {}",
            stage, metrics.level, metrics.overall_score, quality.min_level
        );
        warn!("{}", message);
        warnings.push(message);
        warnings.extend(metrics.issues.iter().map(|issue| format!("{}: {}", stage, issue)));

        match quality.policy {
            QualityPolicy::Advisory => None,
            QualityPolicy::Blocking => Some(Error::QualityRejected {
                stage: stage.to_string(),
                level: metrics.level.to_string(),
                issues: metrics.issues.clone(),
            }),
        }
    }

    fn fail(&self, mut session: Session, started: Instant, cause: Error) -> PipelineOutcome {
        session.elapsed += started.elapsed();
        let chunk_index = cause.chunk_index().unwrap_or(session.next);
        error!("Pipeline stopped at chunk {}: {}", chunk_index, cause);

        PipelineOutcome::Failed(PipelineFailure {
            chunk_index,
            cause,
            session,
            law: self.config.crossfade.law,
            edge_fade_seconds: self.config.crossfade.edge_fade_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::engine_fn;

    fn reference() -> AudioBuffer {
        AudioBuffer::new(vec![0.0; 2400], 24000).unwrap()
    }

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.quality.check_reference = false;
        config.quality.check_output = false;
        config
    }

    #[test]
    fn test_fixed_parameters() {
        let mut config = quiet_config();
        config.parameters.adaptive = false;
        config.parameters.fixed_steps = 20;
        let orchestrator = Orchestrator::new(config).unwrap();

        let session = orchestrator
            .prepare("One. Two! Three?", &reference(), "")
            .unwrap();
        assert!(session.steps().iter().all(|&s| s == 20));
        assert_eq!(session.completed(), 0);
    }

    #[test]
    fn test_adaptive_plan_matches_advisor() {
        let mut config = quiet_config();
        config.chunking.strategy = ChunkingStrategy::Sentence;
        config.chunking.max_chars = 10;
        let orchestrator = Orchestrator::new(config.clone()).unwrap();

        let session = orchestrator
            .prepare("Short one. What is this?!", &reference(), "")
            .unwrap();
        assert_eq!(session.chunks().len(), 2);
        for (chunk, &steps) in session.chunks().iter().zip(session.steps()) {
            assert_eq!(steps, advise_steps(chunk.text(), &config.parameters.advisor));
        }
    }

    #[test]
    fn test_empty_text_completes_empty() {
        let orchestrator = Orchestrator::new(quiet_config()).unwrap();
        let mut engine = engine_fn(|_: &SynthesisRequest<'_>| -> Result<AudioBuffer> {
            panic!("engine must not be called")
        });

        let outcome = orchestrator
            .run(&mut engine, "   ", &reference(), "", &CancellationToken::new())
            .unwrap();
        let (audio, metadata) = outcome.into_result().unwrap();
        assert!(audio.is_empty());
        assert_eq!(audio.sample_rate, 24000);
        assert_eq!(metadata.warnings.len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.chunking.max_chars = 0;
        assert!(Orchestrator::new(config).is_err());
    }

    #[test]
    fn test_duration_formatted() {
        let metadata = PipelineMetadata {
            duration: 125.5,
            ..Default::default()
        };
        assert_eq!(metadata.duration_formatted(), "02:05");
    }
}
