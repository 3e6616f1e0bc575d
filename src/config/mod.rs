//! Configuration management for longtts
//!
//! A [`Config`] is built once (defaults, YAML or JSON) and handed to the
//! orchestrator; nothing reads configuration from global state.

use crate::advisor::AdvisorConfig;
use crate::audio::FadeLaw;
use crate::quality::{QualityLevel, QualityThresholds};
use crate::text::{AdaptiveBudget, ChunkingStrategy};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Main configuration for longtts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Text chunking
    pub chunking: ChunkingConfig,
    /// Crossfade and edge fades
    pub crossfade: CrossfadeConfig,
    /// Step count / crossfade duration selection
    pub parameters: ParameterConfig,
    /// Reference and output quality checks
    pub quality: QualityConfig,
}

/// Text chunking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Strategy to use
    pub strategy: ChunkingStrategy,
    /// Character budget (fallback budget for the adaptive strategy)
    pub max_chars: usize,
    /// Whitespace look-back window for the fixed strategy
    pub fixed_lookback: usize,
    /// Constants for the adaptive strategy
    pub adaptive: AdaptiveBudget,
}

/// Crossfade configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeConfig {
    /// Fade law for inter-chunk crossfades and edge fades
    pub law: FadeLaw,
    /// Fade applied to both ends of the assembled output
    pub edge_fade_seconds: f32,
    /// Window (seconds) of running output whose RMS informs the crossfade advice
    pub tail_window_seconds: f32,
}

/// Generation parameter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterConfig {
    /// Ask the advisor per chunk; otherwise use the fixed values below
    pub adaptive: bool,
    /// Step count when `adaptive` is off
    pub fixed_steps: u32,
    /// Crossfade duration when `adaptive` is off
    pub fixed_crossfade_seconds: f32,
    /// Advisor constants
    pub advisor: AdvisorConfig,
}

/// What to do when a quality check falls below the minimum level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityPolicy {
    /// Attach warnings and continue
    #[default]
    Advisory,
    /// Abort the run
    Blocking,
}

impl fmt::Display for QualityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityPolicy::Advisory => "advisory",
            QualityPolicy::Blocking => "blocking",
        })
    }
}

impl FromStr for QualityPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advisory" | "warn" => Ok(QualityPolicy::Advisory),
            "blocking" | "strict" => Ok(QualityPolicy::Blocking),
            other => Err(Error::Config(format!("Unknown quality policy: {}", other))),
        }
    }
}

/// Quality check configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Analyze the reference clip before synthesis
    pub check_reference: bool,
    /// Analyze the assembled output
    pub check_output: bool,
    /// Advisory or blocking
    pub policy: QualityPolicy,
    /// Lowest level that passes without a warning
    pub min_level: QualityLevel,
    /// Analyzer thresholds
    pub thresholds: QualityThresholds,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::default(),
            max_chars: 135,
            fixed_lookback: 16,
            adaptive: AdaptiveBudget::default(),
        }
    }
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            law: FadeLaw::default(),
            edge_fade_seconds: 0.005,
            tail_window_seconds: 0.05,
        }
    }
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self {
            adaptive: true,
            fixed_steps: 32,
            fixed_crossfade_seconds: 0.15,
            advisor: AdvisorConfig::default(),
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            check_reference: true,
            check_output: true,
            policy: QualityPolicy::default(),
            min_level: QualityLevel::Fair,
            thresholds: QualityThresholds::default(),
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load YAML or JSON depending on the file extension
    pub fn load_any<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::load_json(path),
            _ => Self::load(path),
        }
    }

    /// Create default configuration and save to file
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            return Err(Error::Config("chunking.max_chars must be > 0".into()));
        }
        let adaptive = &self.chunking.adaptive;
        if adaptive.min_chars == 0 || adaptive.min_chars > adaptive.max_chars_ceiling {
            return Err(Error::Config(
                "chunking.adaptive requires 0 < min_chars <= max_chars_ceiling".into(),
            ));
        }
        if !(adaptive.scale > 0.0 && adaptive.target_chunk_seconds > 0.0) {
            return Err(Error::Config(
                "chunking.adaptive scale and target_chunk_seconds must be > 0".into(),
            ));
        }

        if !(self.crossfade.edge_fade_seconds >= 0.0) {
            return Err(Error::Config("crossfade.edge_fade_seconds must be >= 0".into()));
        }
        if !(self.crossfade.tail_window_seconds > 0.0) {
            return Err(Error::Config("crossfade.tail_window_seconds must be > 0".into()));
        }

        if self.parameters.fixed_steps == 0 {
            return Err(Error::Config("parameters.fixed_steps must be > 0".into()));
        }
        if !(self.parameters.fixed_crossfade_seconds >= 0.0) {
            return Err(Error::Config(
                "parameters.fixed_crossfade_seconds must be >= 0".into(),
            ));
        }
        self.parameters.advisor.validate()?;
        self.quality.thresholds.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let path = std::env::temp_dir().join("longtts_config_roundtrip.yaml");
        let mut config = Config::default();
        config.chunking.strategy = ChunkingStrategy::Fixed;
        config.crossfade.law = FadeLaw::RaisedCosine;
        config.quality.policy = QualityPolicy::Blocking;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "chunking:\n  strategy: sentence\n  max_chars: 80\ncrossfade:\n  law: linear\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.chunking.strategy, ChunkingStrategy::Sentence);
        assert_eq!(config.chunking.max_chars, 80);
        assert_eq!(config.chunking.fixed_lookback, 16);
        assert_eq!(config.crossfade.law, FadeLaw::Linear);
        assert!(config.parameters.adaptive);
    }

    #[test]
    fn test_json_enums_are_snake_case() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("\"equal_power\""));
        assert!(json.contains("\"adaptive\""));
        assert!(json.contains("\"advisory\""));
        assert!(json.contains("\"fair\""));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.chunking.max_chars = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.crossfade.edge_fade_seconds = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.parameters.advisor.min_crossfade_seconds = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::load("/no/such/config.yaml"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Blocking".parse::<QualityPolicy>().unwrap(), QualityPolicy::Blocking);
        assert!("sometimes".parse::<QualityPolicy>().is_err());
    }
}
