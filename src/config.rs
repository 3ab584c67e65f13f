use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::analyzer::AnalyzeOptions;
use crate::analyzer::intensity::{IntensityWeights, ThresholdError, Thresholds};
use crate::choreography::SequencerSettings;
use crate::scoring::{ScoreWeights, ScorerSettings};
use crate::weights::WeightsError;

/// Application configuration loaded from TOML config file.
/// All fields have defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Directory of motion clip JSON files.
    pub clips_dir: Option<PathBuf>,
    /// Intensity catalog CSV (`index,m`).
    pub catalog_path: Option<PathBuf>,
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Seed for clip selection. Unset = seeded from entropy.
    pub seed: Option<u64>,
    pub sequencer: SequencerConfig,
    pub scorer: ScorerConfig,
}

/// Song analysis and clip sequencing settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub amplitude_weight: f64,
    pub bpm_weight: f64,
    /// Seconds per analysis segment.
    pub segment_duration: f64,
    /// Output frames per second.
    pub frame_rate: f64,
    /// Seconds added to every output frame time.
    pub frame_delay: f64,
    pub low_threshold: f64,
    pub high_threshold: f64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            amplitude_weight: 0.6,
            bpm_weight: 0.4,
            segment_duration: 5.0,
            frame_rate: 30.0,
            frame_delay: 0.0,
            low_threshold: 0.3,
            high_threshold: 0.7,
        }
    }
}

/// Live performance scoring settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub spatial_weight: f64,
    pub timing_weight: f64,
    pub rhythm_weight: f64,
    pub alpha: f64,
    pub smoothing_factor: f64,
    pub max_history: usize,
    pub reference_frame_rate: f64,
    /// Treat joints at exactly (0, 0) in pose files as undetected.
    pub zero_is_missing: bool,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            spatial_weight: 0.4,
            timing_weight: 0.3,
            rhythm_weight: 0.3,
            alpha: 2.0,
            smoothing_factor: 0.3,
            max_history: 100,
            reference_frame_rate: 60.0,
            zero_is_missing: true,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid weights: {0}")]
    Weights(#[from] WeightsError),
    #[error("Invalid thresholds: {0}")]
    Thresholds(#[from] ThresholdError),
}

impl SequencerConfig {
    /// Analysis options; `workers` is already resolved.
    pub fn analyze_options(&self, workers: usize) -> Result<AnalyzeOptions, ConfigError> {
        Ok(AnalyzeOptions {
            segment_duration: self.segment_duration,
            song_duration: None,
            weights: IntensityWeights::new(self.amplitude_weight, self.bpm_weight)?,
            thresholds: Thresholds::new(self.low_threshold, self.high_threshold)?,
            workers,
            show_progress: false,
        })
    }

    pub fn sequencer_settings(&self) -> SequencerSettings {
        SequencerSettings {
            frame_rate: self.frame_rate,
            frame_delay: self.frame_delay,
        }
    }
}

impl ScorerConfig {
    pub fn scorer_settings(&self) -> Result<ScorerSettings, ConfigError> {
        Ok(ScorerSettings {
            weights: ScoreWeights::new(
                self.spatial_weight,
                self.timing_weight,
                self.rhythm_weight,
            )?,
            alpha: self.alpha,
            smoothing_factor: self.smoothing_factor,
            max_history: self.max_history,
            reference_frame_rate: self.reference_frame_rate,
        })
    }
}

impl AppConfig {
    /// Load config from `~/.config/stepsync/config.toml`.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path.
    /// Logs a warning and returns defaults if the file can't be read or parsed.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.sequencer.segment_duration, 5.0);
        assert_eq!(config.scorer.max_history, 100);
        assert!(config.scorer.zero_is_missing);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "workers = 3\nseed = 42\n\n[sequencer]\nlow_threshold = 0.2\n\n[scorer]\nalpha = 4.0\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.resolve_workers(), 3);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.sequencer.low_threshold, 0.2);
        assert_eq!(config.sequencer.high_threshold, 0.7);
        assert_eq!(config.scorer.alpha, 4.0);
        assert_eq!(config.scorer.timing_weight, 0.3);
    }

    #[test]
    fn test_bad_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "workers = \"many\"").unwrap();
        assert_eq!(AppConfig::load_from(&path).workers, 0);
        assert_eq!(AppConfig::load_from(&dir.path().join("absent.toml")).workers, 0);
    }

    #[test]
    fn test_auto_workers_at_least_one() {
        assert!(AppConfig::default().resolve_workers() >= 1);
    }

    #[test]
    fn test_conversions_validate() {
        let mut config = AppConfig::default();
        let options = config.sequencer.analyze_options(2).unwrap();
        assert_eq!(options.workers, 2);
        assert!((options.weights.amplitude() - 0.6).abs() < 1e-12);

        config.sequencer.low_threshold = 0.9;
        assert!(matches!(
            config.sequencer.analyze_options(1),
            Err(ConfigError::Thresholds(_))
        ));

        config.scorer.rhythm_weight = -1.0;
        assert!(matches!(config.scorer.scorer_settings(), Err(ConfigError::Weights(_))));
    }
}
