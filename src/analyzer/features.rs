//! Per-segment audio features: loudness (frame RMS) and tempo.
//!
//! Tempo comes from the autocorrelation of an onset envelope (positive RMS
//! flux), searched over the dance tempo range with a mild prior toward
//! 120 BPM to resolve octave ambiguity. Windows that are too short, silent,
//! or aperiodic fall back to [`DEFAULT_BPM`].

use super::normalize::{BPM_CEILING, BPM_FLOOR};

/// Tempo reported when a window has no reliable beat.
pub const DEFAULT_BPM: f64 = 120.0;

const RMS_FRAME: usize = 2048;
const RMS_HOP: usize = 512;

const ONSET_FRAME: usize = 1024;
const ONSET_HOP: usize = 256;

/// Minimum normalized autocorrelation for a tempo peak to count as a beat.
const MIN_PERIODICITY: f64 = 0.1;

/// Outcome of a recoverable estimate: either measured from the signal or a
/// documented default substituted because the signal could not support one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate<T> {
    Measured(T),
    Defaulted(T),
}

impl<T: Copy> Estimate<T> {
    pub fn value(&self) -> T {
        match *self {
            Self::Measured(v) | Self::Defaulted(v) => v,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Defaulted(_))
    }
}

/// Raw features of one song segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentFeatures {
    pub amplitude: Estimate<f64>,
    pub bpm: Estimate<f64>,
}

/// Source of per-window amplitude and tempo estimates.
///
/// Implementations must not fail: anything unmeasurable is reported as an
/// [`Estimate::Defaulted`] value. `Sync` so segments can be analyzed on a
/// thread pool.
pub trait AudioFeatureProvider: Sync {
    /// Analyze `[start, end)` seconds of a mono signal.
    fn analyze_segment(
        &self,
        samples: &[f32],
        sample_rate: u32,
        start: f64,
        end: f64,
    ) -> SegmentFeatures;
}

/// RMS loudness + onset-autocorrelation tempo.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyTempoAnalyzer;

impl AudioFeatureProvider for EnergyTempoAnalyzer {
    fn analyze_segment(
        &self,
        samples: &[f32],
        sample_rate: u32,
        start: f64,
        end: f64,
    ) -> SegmentFeatures {
        let window = slice_window(samples, sample_rate, start, end);
        SegmentFeatures {
            amplitude: estimate_amplitude(window),
            bpm: estimate_bpm(window, sample_rate),
        }
    }
}

/// Samples covering `[start, end)` seconds, clipped to the signal.
fn slice_window(samples: &[f32], sample_rate: u32, start: f64, end: f64) -> &[f32] {
    let sr = sample_rate as f64;
    let from = ((start.max(0.0) * sr) as usize).min(samples.len());
    let to = ((end.max(0.0) * sr) as usize).clamp(from, samples.len());
    &samples[from..to]
}

/// Root-mean-square of each analysis frame. The final frame may be short.
fn rms_envelope(samples: &[f32], frame: usize, hop: usize) -> Vec<f64> {
    (0..samples.len())
        .step_by(hop)
        .map(|start| {
            let chunk = &samples[start..(start + frame).min(samples.len())];
            let energy: f64 = chunk.iter().map(|&s| (s as f64) * (s as f64)).sum();
            (energy / chunk.len() as f64).sqrt()
        })
        .collect()
}

fn estimate_amplitude(window: &[f32]) -> Estimate<f64> {
    if window.is_empty() {
        return Estimate::Defaulted(0.0);
    }
    let envelope = rms_envelope(window, RMS_FRAME, RMS_HOP);
    Estimate::Measured(envelope.iter().sum::<f64>() / envelope.len() as f64)
}

/// Log-normal weight centered on the default tempo, one octave = one sigma.
fn tempo_prior(bpm: f64) -> f64 {
    let octaves = (bpm / DEFAULT_BPM).log2();
    (-0.5 * octaves * octaves).exp()
}

fn estimate_bpm(window: &[f32], sample_rate: u32) -> Estimate<f64> {
    if sample_rate == 0 || window.is_empty() {
        return Estimate::Defaulted(DEFAULT_BPM);
    }

    let envelope = rms_envelope(window, ONSET_FRAME, ONSET_HOP);
    let onset: Vec<f64> = envelope
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0))
        .collect();

    let frames_per_sec = sample_rate as f64 / ONSET_HOP as f64;
    let min_lag = ((frames_per_sec * 60.0 / BPM_CEILING).floor() as usize).max(1);
    let max_lag = (frames_per_sec * 60.0 / BPM_FLOOR).ceil() as usize;

    // Need two full periods of the slowest tempo
    let n = onset.len();
    if n < max_lag * 2 {
        log::trace!("Tempo window too short ({} onset frames)", n);
        return Estimate::Defaulted(DEFAULT_BPM);
    }

    let mean = onset.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = onset.iter().map(|v| v - mean).collect();
    let variance = centered.iter().map(|v| v * v).sum::<f64>() / n as f64;
    if variance <= 1e-12 {
        return Estimate::Defaulted(DEFAULT_BPM);
    }

    let mut best: Option<(usize, f64, f64)> = None; // (lag, weighted, raw)
    for lag in min_lag..=max_lag {
        let overlap = n - lag;
        let sum: f64 = (0..overlap).map(|i| centered[i] * centered[i + lag]).sum();
        let raw = sum / overlap as f64 / variance;
        let weighted = raw * tempo_prior(60.0 * frames_per_sec / lag as f64);
        if best.is_none_or(|(_, w, _)| weighted > w) {
            best = Some((lag, weighted, raw));
        }
    }

    match best {
        Some((lag, _, raw)) if raw >= MIN_PERIODICITY => {
            Estimate::Measured(60.0 * frames_per_sec / lag as f64)
        }
        _ => Estimate::Defaulted(DEFAULT_BPM),
    }
}
