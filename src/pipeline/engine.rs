//! Engine adapters
//!
//! The neural engine lives outside this crate. These adapters cover the two
//! cases the crate itself needs: re-assembling pre-rendered chunk files, and
//! wrapping a closure.

use crate::audio::{load_audio, AudioBuffer};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

use super::{SynthesisEngine, SynthesisRequest};

/// Serves pre-rendered chunk audio from `<dir>/<index:04>.wav`
#[derive(Debug, Clone)]
pub struct WavDirectoryEngine {
    dir: PathBuf,
    target_sr: Option<u32>,
}

impl WavDirectoryEngine {
    /// Create engine reading from `dir`
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::FileNotFound(dir.display().to_string()));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            target_sr: None,
        })
    }

    /// Resample every file to `sample_rate` on load
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.target_sr = Some(sample_rate);
        self
    }

    /// File that holds the audio for chunk `index`
    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{:04}.wav", index))
    }
}

impl SynthesisEngine for WavDirectoryEngine {
    type Error = Error;

    fn synthesize(&mut self, request: &SynthesisRequest<'_>) -> Result<AudioBuffer> {
        let path = self.path_for(request.chunk_index);
        log::debug!(
            "Loading chunk {} from {} ({} steps requested)",
            request.chunk_index,
            path.display(),
            request.steps
        );
        load_audio(&path, self.target_sr)
    }
}

/// Engine backed by a closure
pub struct FnEngine<F> {
    f: F,
}

/// Wrap a closure as a [`SynthesisEngine`]
pub fn engine_fn<F, E>(f: F) -> FnEngine<F>
where
    F: FnMut(&SynthesisRequest<'_>) -> std::result::Result<AudioBuffer, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    FnEngine { f }
}

impl<F, E> SynthesisEngine for FnEngine<F>
where
    F: FnMut(&SynthesisRequest<'_>) -> std::result::Result<AudioBuffer, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    type Error = E;

    fn synthesize(&mut self, request: &SynthesisRequest<'_>) -> std::result::Result<AudioBuffer, E> {
        (self.f)(request)
    }
}
