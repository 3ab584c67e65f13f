use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::weights::{self, WeightsError};

/// Dance intensity bucket for a song segment or a motion clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

impl Intensity {
    pub const ALL: [Intensity; 3] = [Intensity::Low, Intensity::Medium, Intensity::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amplitude/tempo mix, normalized to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityWeights {
    amplitude: f64,
    bpm: f64,
}

impl IntensityWeights {
    pub fn new(amplitude: f64, bpm: f64) -> Result<Self, WeightsError> {
        let [amplitude, bpm] = weights::normalize([amplitude, bpm])?;
        Ok(Self { amplitude, bpm })
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Weighted sum of normalized amplitude and tempo.
    pub fn combine(&self, normalized_amplitude: f64, normalized_bpm: f64) -> f64 {
        self.amplitude * normalized_amplitude + self.bpm * normalized_bpm
    }
}

impl Default for IntensityWeights {
    fn default() -> Self {
        Self {
            amplitude: 0.6,
            bpm: 0.4,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Low threshold {low} is above high threshold {high}")]
pub struct ThresholdError {
    pub low: f64,
    pub high: f64,
}

/// Bucket boundaries. Inclusive toward the extremes: `score <= low` is Low,
/// `score >= high` is High, Medium is the open interval between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    low: f64,
    high: f64,
}

impl Thresholds {
    pub fn new(low: f64, high: f64) -> Result<Self, ThresholdError> {
        if low.is_nan() || high.is_nan() || low > high {
            return Err(ThresholdError { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn bucket(&self, score: f64) -> Intensity {
        if score <= self.low {
            Intensity::Low
        } else if score >= self.high {
            Intensity::High
        } else {
            Intensity::Medium
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: 0.3,
            high: 0.7,
        }
    }
}

/// Combine normalized features and bucket the result.
pub fn classify(
    normalized_amplitude: f64,
    normalized_bpm: f64,
    weights: &IntensityWeights,
    thresholds: &Thresholds,
) -> (f64, Intensity) {
    let score = weights.combine(normalized_amplitude, normalized_bpm);
    (score, thresholds.bucket(score))
}
