//! Real-time scoring of a live pose stream against a looping reference.
//!
//! Each live pose is normalized, smoothed and compared with the reference
//! pose at the same point of the reference loop. Spatial, timing and rhythm
//! sub-scores are kept in a bounded history that feeds the rolling and final
//! scores.

pub mod align;
pub mod components;
pub mod feedback;
pub mod preprocess;

use preprocess::PoseSmoother;
use serde::Serialize;
use std::collections::VecDeque;

use crate::pose::PoseFrame;
use crate::weights::{self, WeightsError};

/// Samples averaged by [`ScoringSession::current_score`].
pub const ROLLING_WINDOW: usize = 30;

/// Spatial/timing/rhythm mix, normalized to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    spatial: f64,
    timing: f64,
    rhythm: f64,
}

impl ScoreWeights {
    pub fn new(spatial: f64, timing: f64, rhythm: f64) -> Result<Self, WeightsError> {
        let [spatial, timing, rhythm] = weights::normalize([spatial, timing, rhythm])?;
        Ok(Self { spatial, timing, rhythm })
    }

    pub fn spatial(&self) -> f64 {
        self.spatial
    }

    pub fn timing(&self) -> f64 {
        self.timing
    }

    pub fn rhythm(&self) -> f64 {
        self.rhythm
    }

    pub fn combine(&self, spatial: f64, timing: f64, rhythm: f64) -> f64 {
        self.spatial * spatial + self.timing * timing + self.rhythm * rhythm
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            spatial: 0.4,
            timing: 0.3,
            rhythm: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorerSettings {
    pub weights: ScoreWeights,
    /// Decay rate of the spatial score with pose distance.
    pub alpha: f64,
    /// Weight of the newest pose in the smoothing average.
    pub smoothing_factor: f64,
    /// Capacity of every rolling buffer.
    pub max_history: usize,
    /// Spacing assumed for reference poses loaded without timestamps.
    pub reference_frame_rate: f64,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            alpha: 2.0,
            smoothing_factor: 0.3,
            max_history: 100,
            reference_frame_rate: 60.0,
        }
    }
}

/// Scores for one live pose, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoseScoreSample {
    pub spatial_score: f64,
    pub timing_score: f64,
    pub rhythm_score: f64,
    pub frame_score: f64,
    pub timestamp: f64,
}

/// End-of-performance breakdown; scores are percentages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalScore {
    pub overall_score: f64,
    pub spatial_score: f64,
    pub timing_score: f64,
    pub rhythm_score: f64,
    pub total_poses: usize,
    pub alignment_quality: f64,
    pub feedback: String,
}

fn wall_clock_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, capacity: usize, value: T) {
    while buffer.len() >= capacity.max(1) {
        buffer.pop_front();
    }
    buffer.push_back(value);
}

/// Scoring state for one performer.
#[derive(Debug, Clone)]
pub struct ScoringSession {
    settings: ScorerSettings,
    reference: Vec<PoseFrame>,
    reference_timestamps: Vec<f64>,
    user_poses: VecDeque<PoseFrame>,
    user_timestamps: VecDeque<f64>,
    samples: VecDeque<PoseScoreSample>,
    smoother: PoseSmoother,
    start_time: Option<f64>,
}

impl ScoringSession {
    pub fn new(settings: ScorerSettings) -> Self {
        Self {
            smoother: PoseSmoother::new(settings.smoothing_factor),
            settings,
            reference: Vec::new(),
            reference_timestamps: Vec::new(),
            user_poses: VecDeque::new(),
            user_timestamps: VecDeque::new(),
            samples: VecDeque::new(),
            start_time: None,
        }
    }

    pub fn with_reference(
        settings: ScorerSettings,
        poses: Vec<PoseFrame>,
        timestamps: Option<Vec<f64>>,
    ) -> Self {
        let mut session = Self::new(settings);
        session.load_reference(poses, timestamps);
        session
    }

    /// Replace the reference sequence. Without timestamps the poses are
    /// spaced at the configured reference frame rate.
    pub fn load_reference(&mut self, poses: Vec<PoseFrame>, timestamps: Option<Vec<f64>>) {
        let timestamps = timestamps.unwrap_or_else(|| {
            let fps = self.settings.reference_frame_rate;
            let fps = if fps > 0.0 { fps } else { 60.0 };
            (0..poses.len()).map(|i| i as f64 / fps).collect()
        });
        if timestamps.len() != poses.len() {
            log::warn!(
                "Reference has {} poses but {} timestamps",
                poses.len(),
                timestamps.len()
            );
        }

        self.reference = poses.iter().map(preprocess::normalize_pose).collect();
        self.reference_timestamps = timestamps;
        log::info!(
            "Loaded reference with {} poses ({:.2}s loop)",
            self.reference.len(),
            self.reference_duration()
        );
    }

    /// Loop length: the last reference timestamp.
    pub fn reference_duration(&self) -> f64 {
        self.reference_timestamps.last().copied().unwrap_or(1.0)
    }

    pub fn reference_len(&self) -> usize {
        self.reference.len()
    }

    /// Scored poses currently held.
    pub fn history_len(&self) -> usize {
        self.samples.len()
    }

    /// Score one live pose. A missing timestamp is taken from the wall clock.
    pub fn score_pose(&mut self, pose: &PoseFrame, timestamp: Option<f64>) -> PoseScoreSample {
        let timestamp = timestamp.unwrap_or_else(wall_clock_secs);
        let capacity = self.settings.max_history;

        let normalized = preprocess::normalize_pose(pose);
        let smoothed = self.smoother.smooth(&normalized);

        let distance = self.reference_distance(&smoothed, timestamp);
        push_bounded(&mut self.user_poses, capacity, smoothed);
        push_bounded(&mut self.user_timestamps, capacity, timestamp);

        let frame_score = components::frame_score(distance, self.settings.alpha);
        let sample = PoseScoreSample {
            spatial_score: frame_score,
            timing_score: components::timing_score(&self.user_timestamps),
            rhythm_score: components::rhythm_score(self.user_poses.iter(), &self.reference),
            frame_score,
            timestamp,
        };
        log::trace!(
            "t={:.3} d={:.4} spatial={:.3} timing={:.3} rhythm={:.3}",
            timestamp,
            distance,
            sample.spatial_score,
            sample.timing_score,
            sample.rhythm_score
        );

        push_bounded(&mut self.samples, capacity, sample);
        sample
    }

    fn reference_distance(&mut self, pose: &PoseFrame, timestamp: f64) -> f64 {
        if self.reference.is_empty() {
            return f64::INFINITY;
        }
        let start = *self.start_time.get_or_insert(timestamp);
        let index = align::reference_index(
            timestamp - start,
            self.reference_duration(),
            self.reference.len(),
        );
        align::pose_distance(pose, &self.reference[index])
    }

    fn component_means<'a>(
        samples: impl Iterator<Item = &'a PoseScoreSample>,
    ) -> (f64, f64, f64, f64) {
        let mut sums = (0.0, 0.0, 0.0, 0.0);
        let mut n = 0usize;
        for s in samples {
            sums.0 += s.spatial_score;
            sums.1 += s.timing_score;
            sums.2 += s.rhythm_score;
            sums.3 += s.frame_score;
            n += 1;
        }
        if n == 0 {
            return sums;
        }
        let n = n as f64;
        (sums.0 / n, sums.1 / n, sums.2 / n, sums.3 / n)
    }

    /// Weighted score over the most recent samples, 0-100.
    pub fn current_score(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let skip = self.samples.len().saturating_sub(ROLLING_WINDOW);
        let (spatial, timing, rhythm, _) = Self::component_means(self.samples.iter().skip(skip));
        self.settings.weights.combine(spatial, timing, rhythm) * 100.0
    }

    /// Breakdown over every sample still held.
    pub fn final_score(&self) -> FinalScore {
        if self.samples.is_empty() {
            return FinalScore {
                overall_score: 0.0,
                spatial_score: 0.0,
                timing_score: 0.0,
                rhythm_score: 0.0,
                total_poses: 0,
                alignment_quality: 0.0,
                feedback: "No poses scored".to_string(),
            };
        }

        let (spatial, timing, rhythm, frame) = Self::component_means(self.samples.iter());
        let (spatial, timing, rhythm) = (spatial * 100.0, timing * 100.0, rhythm * 100.0);
        let overall = self.settings.weights.combine(spatial, timing, rhythm);

        FinalScore {
            overall_score: overall,
            spatial_score: spatial,
            timing_score: timing,
            rhythm_score: rhythm,
            total_poses: self.samples.len(),
            alignment_quality: frame * 100.0,
            feedback: feedback::feedback(overall, spatial, timing, rhythm),
        }
    }

    /// Forget the performance so far; the reference stays loaded.
    pub fn reset(&mut self) {
        self.user_poses.clear();
        self.user_timestamps.clear();
        self.samples.clear();
        self.smoother.reset();
        self.start_time = None;
    }
}

/// Score a recorded performance in one go. Poses without a timestamp are
/// spaced one expected capture interval apart from the current time.
pub fn score_performance(
    reference: Vec<PoseFrame>,
    user_poses: &[PoseFrame],
    timestamps: Option<&[f64]>,
    settings: ScorerSettings,
) -> FinalScore {
    let mut session = ScoringSession::with_reference(settings, reference, None);
    let base = wall_clock_secs();
    for (i, pose) in user_poses.iter().enumerate() {
        let timestamp = timestamps
            .and_then(|t| t.get(i).copied())
            .unwrap_or(base + i as f64 * components::EXPECTED_FRAME_INTERVAL);
        session.score_pose(pose, Some(timestamp));
    }
    session.final_score()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Joint;

    fn standing(offset: f64) -> PoseFrame {
        PoseFrame::from_joints((0..17).map(|i| {
            Joint::new(100.0 + (i % 3) as f64 * 20.0 + offset, 50.0 + i as f64 * 10.0)
        }))
    }

    fn stream(session: &mut ScoringSession, poses: &[PoseFrame]) -> Vec<PoseScoreSample> {
        poses
            .iter()
            .enumerate()
            .map(|(i, p)| session.score_pose(p, Some(i as f64 / 30.0)))
            .collect()
    }

    #[test]
    fn test_weights_normalized() {
        let w = ScoreWeights::new(2.0, 1.0, 1.0).unwrap();
        assert_eq!(w.spatial(), 0.5);
        assert_eq!(w.timing(), 0.25);
        assert!(ScoreWeights::new(0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_perfect_mirror_scores_high() {
        let reference = vec![standing(0.0); 60];
        let mut session =
            ScoringSession::with_reference(ScorerSettings::default(), reference, None);
        // translated copy of the reference; normalization removes the offset
        let live = vec![standing(300.0); 40];
        let samples = stream(&mut session, &live);

        assert!(samples.iter().all(|s| (s.spatial_score - 1.0).abs() < 1e-9));
        let result = session.final_score();
        // the first samples carry neutral timing/rhythm scores
        assert!(result.overall_score > 95.0, "{result:?}");
        assert_eq!(result.total_poses, 40);
        assert!((result.alignment_quality - 100.0).abs() < 1e-6);
        assert_eq!(result.feedback, "Outstanding performance! Perfect execution!");
        // the rolling window has moved past them
        assert!(session.current_score() > 99.0);
        assert!(session.current_score() > result.overall_score);
    }

    #[test]
    fn test_no_reference_scores_zero_spatial() {
        let mut session = ScoringSession::new(ScorerSettings::default());
        let sample = session.score_pose(&standing(0.0), Some(0.0));
        assert_eq!(sample.spatial_score, 0.0);
        assert_eq!(sample.frame_score, 0.0);
        assert_eq!(sample.timing_score, components::NEUTRAL_SCORE);
        assert_eq!(sample.rhythm_score, components::NEUTRAL_SCORE);
    }

    #[test]
    fn test_default_reference_timestamps() {
        let reference = vec![standing(0.0); 121];
        let session = ScoringSession::with_reference(ScorerSettings::default(), reference, None);
        assert!((session.reference_duration() - 2.0).abs() < 1e-12);

        let session = ScoringSession::with_reference(
            ScorerSettings::default(),
            vec![standing(0.0); 3],
            Some(vec![0.0, 0.5, 3.0]),
        );
        assert_eq!(session.reference_duration(), 3.0);
    }

    #[test]
    fn test_empty_history() {
        let session = ScoringSession::new(ScorerSettings::default());
        assert_eq!(session.current_score(), 0.0);
        let result = session.final_score();
        assert_eq!(result.overall_score, 0.0);
        assert_eq!(result.total_poses, 0);
        assert_eq!(result.feedback, "No poses scored");
    }

    #[test]
    fn test_history_is_bounded() {
        let settings = ScorerSettings {
            max_history: 10,
            ..ScorerSettings::default()
        };
        let mut session = ScoringSession::with_reference(settings, vec![standing(0.0); 5], None);
        stream(&mut session, &vec![standing(0.0); 25]);
        assert_eq!(session.history_len(), 10);
        assert_eq!(session.final_score().total_poses, 10);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let reference: Vec<PoseFrame> = (0..30).map(|i| standing(i as f64)).collect();
        let live: Vec<PoseFrame> = (0..20).map(|i| standing((i * 7 % 11) as f64)).collect();

        let mut fresh =
            ScoringSession::with_reference(ScorerSettings::default(), reference.clone(), None);
        let expected = stream(&mut fresh, &live);

        let mut reused = ScoringSession::with_reference(ScorerSettings::default(), reference, None);
        stream(&mut reused, &[standing(50.0), standing(-20.0), standing(3.0)]);
        assert!(reused.current_score() > 0.0);
        reused.reset();
        reused.reset();
        assert_eq!(reused.history_len(), 0);
        assert_eq!(reused.current_score(), 0.0);
        assert_eq!(reused.final_score().total_poses, 0);
        assert_eq!(reused.reference_len(), 30);
        assert_eq!(stream(&mut reused, &live), expected);
    }

    #[test]
    fn test_wall_clock_timestamp() {
        let mut session = ScoringSession::new(ScorerSettings::default());
        let sample = session.score_pose(&standing(0.0), None);
        assert!(sample.timestamp > 1_000_000_000.0);
    }

    #[test]
    fn test_score_performance() {
        let reference = vec![standing(0.0); 30];
        let live = vec![standing(10.0); 15];
        let times: Vec<f64> = (0..15).map(|i| i as f64 / 30.0).collect();

        let with_times =
            score_performance(reference.clone(), &live, Some(&times), ScorerSettings::default());
        assert_eq!(with_times.total_poses, 15);
        assert!(with_times.overall_score > 90.0);

        let without = score_performance(reference, &live, None, ScorerSettings::default());
        assert_eq!(without.total_poses, 15);
        assert!(without.timing_score > 95.0);
    }
}
