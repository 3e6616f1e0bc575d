//! Quality validation module
//!
//! Scores reference clips and assembled output on SNR, clipping, silence,
//! dynamic range and spectral flatness. Analysis is advisory: it reports,
//! it never fails.

pub mod analyzer;

pub use analyzer::{analyze, QualityAnalyzer, QualityLevel, QualityMetrics, QualityThresholds};
