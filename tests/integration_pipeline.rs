//! Pipeline Integration Tests for longtts
//!
//! These tests drive the orchestrator end to end with in-test engines:
//! text → chunks → engine → crossfade → finalize → quality check
//!
//! # Test Categories
//!
//! 1. **Assembly**: output length, ordering, resampling
//! 2. **Failure handling**: engine errors, resume, cancellation, partial results
//! 3. **Quality policy**: advisory and blocking checks
//! 4. **Chunk coverage**: randomized texts under every strategy

use longtts::audio::{self, AudioBuffer, FadeLaw};
use longtts::config::QualityPolicy;
use longtts::pipeline::{
    CancellationToken, Orchestrator, PipelineOutcome, PipelineStage, SynthesisEngine,
    SynthesisRequest,
};
use longtts::text::{self, Chunker};
use longtts::{ChunkingStrategy, Config, Error};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::io;
use std::sync::Arc;

const SR: u32 = 24000;
const SAMPLES_PER_CHAR: usize = 1200;
const TEXT: &str = "The first sentence is here. A second one follows it! Is this the third? The end.";

/// Sine tone whose length is proportional to the chunk's character count
struct ToneEngine {
    sample_rate: u32,
    calls: Vec<usize>,
}

impl ToneEngine {
    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            calls: Vec::new(),
        }
    }
}

fn tone(chars: usize, sample_rate: u32) -> Vec<f32> {
    (0..chars * SAMPLES_PER_CHAR)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            0.3 * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
        })
        .collect()
}

impl SynthesisEngine for ToneEngine {
    type Error = io::Error;

    fn synthesize(&mut self, request: &SynthesisRequest<'_>) -> Result<AudioBuffer, io::Error> {
        self.calls.push(request.chunk_index);
        let samples = tone(request.text.chars().count(), self.sample_rate);
        AudioBuffer::new(samples, self.sample_rate)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

/// Fails once it reaches `fail_at`
struct FlakyEngine {
    inner: ToneEngine,
    fail_at: usize,
}

impl SynthesisEngine for FlakyEngine {
    type Error = io::Error;

    fn synthesize(&mut self, request: &SynthesisRequest<'_>) -> Result<AudioBuffer, io::Error> {
        if request.chunk_index == self.fail_at {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "device lost"));
        }
        self.inner.synthesize(request)
    }
}

/// Requests cancellation while rendering `cancel_at`
struct CancellingEngine {
    inner: ToneEngine,
    token: CancellationToken,
    cancel_at: usize,
}

impl SynthesisEngine for CancellingEngine {
    type Error = io::Error;

    fn synthesize(&mut self, request: &SynthesisRequest<'_>) -> Result<AudioBuffer, io::Error> {
        if request.chunk_index == self.cancel_at {
            self.token.cancel();
        }
        self.inner.synthesize(request)
    }
}

fn config() -> Config {
    let mut config = Config::default();
    config.chunking.strategy = ChunkingStrategy::Sentence;
    config.chunking.max_chars = 30;
    config.parameters.adaptive = false;
    config.parameters.fixed_crossfade_seconds = 0.1;
    config.quality.check_reference = false;
    config.quality.check_output = false;
    config
}

fn reference() -> AudioBuffer {
    AudioBuffer::new(tone(20, SR), SR).unwrap()
}

/// Length after merging `lengths` with a fixed overlap
fn expected_len(lengths: &[usize], overlap: usize) -> usize {
    lengths.iter().sum::<usize>() - overlap * lengths.len().saturating_sub(1)
}

fn chunk_lengths(text: &str, max_chars: usize) -> Vec<usize> {
    Chunker::Sentence
        .chunk(text, max_chars)
        .unwrap()
        .iter()
        .map(|c| c.char_count() * SAMPLES_PER_CHAR)
        .collect()
}

// ============================================================================
// Assembly
// ============================================================================

#[test]
fn test_end_to_end_length() {
    let orchestrator = Orchestrator::new(config()).unwrap();
    let mut engine = ToneEngine::new(SR);

    let outcome = orchestrator
        .run(&mut engine, TEXT, &reference(), "", &CancellationToken::new())
        .unwrap();
    let (audio, metadata) = outcome.into_result().unwrap();

    let lengths = chunk_lengths(TEXT, 30);
    assert_eq!(lengths.len(), 3);
    assert_eq!(audio.len(), expected_len(&lengths, 2400));
    assert_eq!(audio.sample_rate, SR);
    assert_eq!(engine.calls, vec![0, 1, 2]);

    assert!(!metadata.partial);
    assert_eq!(metadata.chunks.len(), 3);
    assert_eq!(metadata.chunks[0].crossfade_seconds, None);
    assert_eq!(metadata.chunks[1].crossfade_seconds, Some(0.1));
    assert_eq!(metadata.chunks[2].text, "Is this the third? The end.");
    assert_eq!(metadata.chunks[2].start, TEXT.find("Is this").unwrap());

    // Edge fades leave the ends near silent
    assert!(audio.samples[0].abs() < 1e-6);
    assert!(audio.samples[audio.len() - 1].abs() < 1e-3);
}

#[test]
fn test_spanish_scenario_calls_engine_per_sentence() {
    let text = "Hola. ¿Cómo estás? Muy bien, gracias.";
    let mut cfg = config();
    cfg.chunking.max_chars = 15;
    let orchestrator = Orchestrator::new(cfg).unwrap();
    let mut engine = ToneEngine::new(SR);

    let (_, metadata) = orchestrator
        .run(&mut engine, text, &reference(), "", &CancellationToken::new())
        .unwrap()
        .into_result()
        .unwrap();

    let texts: Vec<&str> = metadata.chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["Hola.", "¿Cómo estás?", "Muy bien, gracias."]);
    assert_eq!(engine.calls.len(), 3);
}

#[test]
fn test_adaptive_parameters_are_bounded() {
    let mut cfg = config();
    cfg.parameters.adaptive = true;
    let advisor = cfg.parameters.advisor.clone();
    let orchestrator = Orchestrator::new(cfg).unwrap();
    let mut engine = ToneEngine::new(SR);

    let (audio, metadata) = orchestrator
        .run(&mut engine, TEXT, &reference(), "", &CancellationToken::new())
        .unwrap()
        .into_result()
        .unwrap();

    for report in &metadata.chunks[1..] {
        let seconds = report.crossfade_seconds.unwrap();
        assert!(seconds >= advisor.min_crossfade_seconds && seconds <= advisor.max_crossfade_seconds);
    }
    for report in &metadata.chunks {
        assert!(report.steps >= advisor.min_steps && report.steps <= advisor.max_steps);
    }

    let overlaps: usize = metadata.chunks[1..]
        .iter()
        .map(|r| audio::seconds_to_samples(r.crossfade_seconds.unwrap(), SR))
        .sum();
    let total: usize = metadata.chunks.iter().map(|r| r.samples).sum();
    assert_eq!(audio.len(), total - overlaps);
}

#[test]
fn test_mismatched_engine_rate_is_resampled() {
    struct MixedRateEngine;

    impl SynthesisEngine for MixedRateEngine {
        type Error = io::Error;

        fn synthesize(&mut self, request: &SynthesisRequest<'_>) -> Result<AudioBuffer, io::Error> {
            let sr = if request.chunk_index == 1 { 16000 } else { SR };
            Ok(AudioBuffer::new(tone(request.text.chars().count(), sr), sr).unwrap())
        }
    }

    let orchestrator = Orchestrator::new(config()).unwrap();
    let (audio, metadata) = orchestrator
        .run(&mut MixedRateEngine, TEXT, &reference(), "", &CancellationToken::new())
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(audio.sample_rate, SR);
    let raw = chunk_lengths(TEXT, 30);
    assert_eq!(metadata.chunks[1].samples, (raw[1] as f64 * 1.5).ceil() as usize);
}

#[test]
fn test_progress_reports_every_chunk() {
    let seen: Arc<Mutex<Vec<(PipelineStage, f32)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let orchestrator = Orchestrator::new(config())
        .unwrap()
        .with_progress(Box::new(move |stage: PipelineStage, fraction: f32| {
            sink.lock().push((stage, fraction))
        }));

    orchestrator
        .run(&mut ToneEngine::new(SR), TEXT, &reference(), "", &CancellationToken::new())
        .unwrap();

    let seen = seen.lock();
    let synthesis: Vec<f32> = seen
        .iter()
        .filter(|(stage, _)| *stage == PipelineStage::Synthesis)
        .map(|&(_, f)| f)
        .collect();
    assert_eq!(synthesis.len(), 3);
    assert_eq!(synthesis.last().copied(), Some(1.0));
    assert_eq!(seen[0].0, PipelineStage::Chunking);
    assert_eq!(seen.last().map(|s| s.0), Some(PipelineStage::Finalize));
}

// ============================================================================
// Failure handling
// ============================================================================

#[test]
fn test_engine_failure_preserves_partial_and_resumes() {
    let orchestrator = Orchestrator::new(config()).unwrap();
    let reference = reference();
    let mut flaky = FlakyEngine {
        inner: ToneEngine::new(SR),
        fail_at: 2,
    };

    let outcome = orchestrator
        .run(&mut flaky, TEXT, &reference, "", &CancellationToken::new())
        .unwrap();
    let failure = match outcome {
        PipelineOutcome::Failed(failure) => failure,
        PipelineOutcome::Completed { .. } => panic!("expected failure"),
    };

    let lengths = chunk_lengths(TEXT, 30);
    assert_eq!(failure.chunk_index(), 2);
    assert!(matches!(failure.cause(), Error::Synthesis { chunk_index: 2, .. }));
    assert!(failure.cause().is_transient());
    assert_eq!(failure.session().completed(), 2);
    assert_eq!(
        failure.partial().map(|a| a.len()),
        Some(expected_len(&lengths[..2], 2400))
    );

    let mut healthy = ToneEngine::new(SR);
    let (audio, metadata) = orchestrator
        .resume(failure, &mut healthy, &reference, "", &CancellationToken::new())
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(healthy.calls, vec![2]);
    assert_eq!(audio.len(), expected_len(&lengths, 2400));
    assert!(!metadata.partial);
    assert_eq!(metadata.chunks.len(), 3);
}

#[test]
fn test_first_chunk_failure_has_no_partial() {
    let orchestrator = Orchestrator::new(config()).unwrap();
    let mut flaky = FlakyEngine {
        inner: ToneEngine::new(SR),
        fail_at: 0,
    };

    match orchestrator
        .run(&mut flaky, TEXT, &reference(), "", &CancellationToken::new())
        .unwrap()
    {
        PipelineOutcome::Failed(failure) => {
            assert_eq!(failure.chunk_index(), 0);
            assert!(failure.partial().is_none());
            assert!(failure.accept_partial().is_none());
        }
        PipelineOutcome::Completed { .. } => panic!("expected failure"),
    }
}

#[test]
fn test_empty_engine_output_is_a_synthesis_failure() {
    let orchestrator = Orchestrator::new(config()).unwrap();
    let mut engine = longtts::pipeline::engine_fn(|req: &SynthesisRequest<'_>| {
        let len = if req.chunk_index == 1 { 0 } else { 48000 };
        AudioBuffer::new(vec![0.1; len], SR)
    });

    let outcome = orchestrator
        .run(&mut engine, TEXT, &reference(), "", &CancellationToken::new())
        .unwrap();
    let err = outcome.into_result().unwrap_err();
    assert_eq!(err.chunk_index(), Some(1));
}

#[test]
fn test_cancellation_between_chunks() {
    let orchestrator = Orchestrator::new(config()).unwrap();
    let token = CancellationToken::new();
    let mut engine = CancellingEngine {
        inner: ToneEngine::new(SR),
        token: token.clone(),
        cancel_at: 1,
    };

    let outcome = orchestrator
        .run(&mut engine, TEXT, &reference(), "", &token)
        .unwrap();
    let failure = match outcome {
        PipelineOutcome::Failed(failure) => failure,
        PipelineOutcome::Completed { .. } => panic!("expected cancellation"),
    };

    // The in-flight call for chunk 1 finishes; chunk 2 never starts
    assert_eq!(engine.inner.calls, vec![0, 1]);
    assert!(matches!(failure.cause(), Error::Cancelled { chunk_index: 2 }));

    let lengths = chunk_lengths(TEXT, 30);
    let (audio, metadata) = failure.accept_partial().unwrap();
    assert_eq!(audio.len(), expected_len(&lengths[..2], 2400));
    assert!(metadata.partial);
    assert_eq!(metadata.chunks.len(), 2);
}

#[test]
fn test_already_cancelled_token_stops_before_first_chunk() {
    let orchestrator = Orchestrator::new(config()).unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let mut engine = ToneEngine::new(SR);

    let outcome = orchestrator
        .run(&mut engine, TEXT, &reference(), "", &token)
        .unwrap();
    assert!(!outcome.is_completed());
    assert!(engine.calls.is_empty());
}

#[test]
fn test_structural_errors_are_returned_directly() {
    let mut cfg = config();
    cfg.chunking.max_chars = 0;
    assert!(matches!(Orchestrator::new(cfg), Err(Error::Config(_))));

    let a = AudioBuffer::new(vec![], SR).unwrap();
    let b = AudioBuffer::new(vec![0.5; 10], SR).unwrap();
    assert!(matches!(
        audio::crossfade(a, b, 0.1, FadeLaw::Linear),
        Err(Error::Crossfade(_))
    ));
}

// ============================================================================
// Quality policy
// ============================================================================

#[test]
fn test_advisory_reference_check_warns() {
    let mut cfg = config();
    cfg.quality.check_reference = true;
    let orchestrator = Orchestrator::new(cfg).unwrap();
    let silent_reference = AudioBuffer::new(vec![0.0; SR as usize], SR).unwrap();
    let mut engine = ToneEngine::new(SR);

    let (_, metadata) = orchestrator
        .run(&mut engine, TEXT, &silent_reference, "", &CancellationToken::new())
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(engine.calls.len(), 3);
    assert!(metadata.reference_quality.is_some());
    assert!(metadata.warnings.iter().any(|w| w.starts_with("reference")));
}

#[test]
fn test_blocking_reference_check_aborts() {
    let mut cfg = config();
    cfg.quality.check_reference = true;
    cfg.quality.policy = QualityPolicy::Blocking;
    let orchestrator = Orchestrator::new(cfg).unwrap();
    let silent_reference = AudioBuffer::new(vec![0.0; SR as usize], SR).unwrap();
    let mut engine = ToneEngine::new(SR);

    let outcome = orchestrator
        .run(&mut engine, TEXT, &silent_reference, "", &CancellationToken::new())
        .unwrap();

    assert!(engine.calls.is_empty());
    match outcome {
        PipelineOutcome::Failed(failure) => {
            assert_eq!(failure.chunk_index(), 0);
            match failure.cause() {
                Error::QualityRejected { stage, .. } => assert_eq!(stage, "reference"),
                other => panic!("unexpected cause: {}", other),
            }
        }
        PipelineOutcome::Completed { .. } => panic!("expected rejection"),
    }
}

#[test]
fn test_blocking_output_check_keeps_audio() {
    let mut cfg = config();
    cfg.quality.check_output = true;
    cfg.quality.policy = QualityPolicy::Blocking;
    let orchestrator = Orchestrator::new(cfg).unwrap();
    let mut silent = longtts::pipeline::engine_fn(|_: &SynthesisRequest<'_>| {
        AudioBuffer::new(vec![0.0; 48000], SR)
    });

    let failure = match orchestrator
        .run(&mut silent, TEXT, &reference(), "", &CancellationToken::new())
        .unwrap()
    {
        PipelineOutcome::Failed(failure) => failure,
        PipelineOutcome::Completed { .. } => panic!("expected rejection"),
    };

    assert_eq!(failure.chunk_index(), 3);
    assert_eq!(failure.session().completed(), 3);
    let expected = expected_len(&[48000; 3], 2400);

    // Resuming accepts the rejected output without calling the engine again
    let mut engine = ToneEngine::new(SR);
    let (audio, metadata) = orchestrator
        .resume(failure, &mut engine, &reference(), "", &CancellationToken::new())
        .unwrap()
        .into_result()
        .unwrap();
    assert!(engine.calls.is_empty());
    assert_eq!(audio.len(), expected);
    assert!(metadata.output_quality.is_some());
}

// ============================================================================
// Chunk coverage
// ============================================================================

#[test]
fn test_random_texts_are_covered_by_every_strategy() {
    let words = [
        "alpha", "beta", "gamma", "déjà", "vu", "naïve", "über", "日本語", "テキスト", "supercalifragilistic",
    ];
    let marks = ["", "", "", ",", ".", "!", "?", "...", "。", "\"", "?!"];
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..200 {
        let count = rng.gen_range(1..60);
        let mut text = String::new();
        for _ in 0..count {
            text.push_str(words.choose(&mut rng).unwrap());
            text.push_str(marks.choose(&mut rng).unwrap());
            text.push_str(if rng.gen_bool(0.1) { "\n\n" } else { " " });
        }

        let max_chars = rng.gen_range(1..80);
        for chunker in [Chunker::Sentence, Chunker::Fixed { lookback: 8 }] {
            let chunks = chunker.chunk(&text, max_chars).unwrap();
            assert!(!chunks.is_empty());
            assert!(text::covers(&text, &chunks), "{:?} lost text: {:?}", chunker, text);
            if chunker == (Chunker::Fixed { lookback: 8 }) {
                assert!(chunks.iter().all(|c| c.char_count() <= max_chars));
            }
        }
    }
}
