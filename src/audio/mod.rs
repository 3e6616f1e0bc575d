//! Audio processing module for longtts
//!
//! Provides the PCM buffer type, WAV I/O, resampling, crossfading and the
//! DSP primitives used by the quality analyzer.

mod buffer;
pub mod crossfade;
mod dsp;
mod io;
mod resample;
pub mod spectrum;

pub use buffer::{seconds_to_samples, AudioBuffer};
pub use crossfade::{apply_edge_fades, crossfade, fade_curve, FadeCurve, FadeCurveCache, FadeLaw};
pub use dsp::{
    amplitude_to_db, compute_peak, compute_rms, frame_rms, normalize_audio_peak, percentile,
    AMPLITUDE_FLOOR,
};
pub use io::{load_audio, load_audio_batch, save_audio};
pub use resample::resample;
pub use spectrum::{power_spectrogram, stft};
