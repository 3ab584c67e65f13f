pub mod decode;
pub mod features;
pub mod intensity;
pub mod normalize;

use decode::DecodedAudio;
use features::{AudioFeatureProvider, SegmentFeatures};
use indicatif::{ProgressBar, ProgressStyle};
use intensity::{Intensity, IntensityWeights, Thresholds};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Decode error: {0}")]
    Decode(#[from] decode::DecodeError),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Segment duration must be positive, got {0}")]
    InvalidSegmentDuration(f64),
}

/// One fixed-length window of a song with its features and intensity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioSegment {
    pub start_time: f64,
    pub end_time: f64,
    pub amplitude: f64,
    pub bpm: f64,
    /// The tempo could not be measured and the default was used.
    pub bpm_defaulted: bool,
    pub normalized_amplitude: f64,
    pub normalized_bpm: f64,
    pub combined_score: f64,
    pub intensity: Intensity,
}

impl AudioSegment {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Settings for one song analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub segment_duration: f64,
    /// Analyze this many seconds instead of the decoded length.
    pub song_duration: Option<f64>,
    pub weights: IntensityWeights,
    pub thresholds: Thresholds,
    pub workers: usize,
    pub show_progress: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            segment_duration: 5.0,
            song_duration: None,
            weights: IntensityWeights::default(),
            thresholds: Thresholds::default(),
            workers: 1,
            show_progress: false,
        }
    }
}

/// Split `[0, song_duration)` into consecutive windows. The last window is
/// clipped to the song end.
pub fn segment_windows(song_duration: f64, segment_duration: f64) -> Vec<(f64, f64)> {
    if !(song_duration > 0.0) || !(segment_duration > 0.0) || !segment_duration.is_finite() {
        return Vec::new();
    }
    let count = (song_duration / segment_duration).ceil() as usize;
    (0..count)
        .map(|i| {
            let start = i as f64 * segment_duration;
            (start, (start + segment_duration).min(song_duration))
        })
        .filter(|(start, end)| end > start)
        .collect()
}

/// Normalize features across the song and classify every window.
pub fn build_segments(
    windows: &[(f64, f64)],
    features: &[SegmentFeatures],
    weights: &IntensityWeights,
    thresholds: &Thresholds,
) -> Vec<AudioSegment> {
    let amplitudes: Vec<f64> = features.iter().map(|f| f.amplitude.value()).collect();
    let bpms: Vec<f64> = features.iter().map(|f| f.bpm.value()).collect();
    let (norm_amplitudes, norm_bpms) = normalize::normalize_features(&amplitudes, &bpms);

    windows
        .iter()
        .zip(features)
        .enumerate()
        .map(|(i, (&(start_time, end_time), f))| {
            let (combined_score, intensity) =
                intensity::classify(norm_amplitudes[i], norm_bpms[i], weights, thresholds);
            AudioSegment {
                start_time,
                end_time,
                amplitude: amplitudes[i],
                bpm: bpms[i],
                bpm_defaulted: f.bpm.is_default(),
                normalized_amplitude: norm_amplitudes[i],
                normalized_bpm: norm_bpms[i],
                combined_score,
                intensity,
            }
        })
        .collect()
}

/// Analyze decoded audio: features per window in parallel, then a
/// song-wide normalization and classification pass.
pub fn analyze_audio<P: AudioFeatureProvider + ?Sized>(
    audio: &DecodedAudio,
    provider: &P,
    options: &AnalyzeOptions,
) -> Result<Vec<AudioSegment>, AnalyzeError> {
    if !(options.segment_duration > 0.0) || !options.segment_duration.is_finite() {
        return Err(AnalyzeError::InvalidSegmentDuration(options.segment_duration));
    }

    let song_duration = options.song_duration.unwrap_or_else(|| audio.duration());
    let windows = segment_windows(song_duration, options.segment_duration);

    if windows.is_empty() {
        log::info!("No audio to analyze");
        return Ok(Vec::new());
    }

    log::info!(
        "Analyzing {} segments ({:.1}s) with {} workers",
        windows.len(),
        song_duration,
        options.workers
    );

    let pb = if options.show_progress {
        let pb = ProgressBar::new(windows.len() as u64);
        let template = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} segments ({eta})";
        if let Ok(style) = ProgressStyle::with_template(template) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    } else {
        ProgressBar::hidden()
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.max(1))
        .build()?;

    // Windows are independent; only the sequencing that follows is ordered
    let features: Vec<SegmentFeatures> = pool.install(|| {
        use rayon::prelude::*;
        windows
            .par_iter()
            .map(|&(start, end)| {
                let f = provider.analyze_segment(&audio.samples, audio.sample_rate, start, end);
                pb.inc(1);
                f
            })
            .collect()
    });

    pb.finish_and_clear();

    let defaulted = features.iter().filter(|f| f.bpm.is_default()).count();
    if defaulted > 0 {
        log::debug!("{} of {} segments used the default tempo", defaulted, features.len());
    }

    Ok(build_segments(
        &windows,
        &features,
        &options.weights,
        &options.thresholds,
    ))
}

/// Decode a song and analyze it.
pub fn analyze_file<P: AudioFeatureProvider + ?Sized>(
    path: &Path,
    provider: &P,
    options: &AnalyzeOptions,
) -> Result<Vec<AudioSegment>, AnalyzeError> {
    log::debug!(
        "Analyzing: {}",
        path.file_name().and_then(|f| f.to_str()).unwrap_or("?")
    );
    let audio = decode::load_audio(path)?;
    analyze_audio(&audio, provider, options)
}
