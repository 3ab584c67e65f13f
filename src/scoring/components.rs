//! Spatial, timing and rhythm sub-scores, each in [0, 1].

use crate::pose::PoseFrame;

/// Capture interval the timing score expects between live frames.
pub const EXPECTED_FRAME_INTERVAL: f64 = 1.0 / 30.0;

/// Returned when there is too little data to judge a component.
pub const NEUTRAL_SCORE: f64 = 0.5;

const CV_EPSILON: f64 = 1e-6;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Pearson correlation of two equal-length series. NaN when either is
/// constant.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va += (x - ma) * (x - ma);
        vb += (y - mb) * (y - mb);
    }
    cov / (va * vb).sqrt()
}

/// Exponential decay of pose distance.
pub fn frame_score(distance: f64, alpha: f64) -> f64 {
    let score = (-alpha * distance).exp();
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

/// Regularity of the capture clock: 1 for perfectly even frame spacing,
/// falling to 0 as the spacing jitter reaches one expected interval.
pub fn timing_score<'a>(timestamps: impl IntoIterator<Item = &'a f64>) -> f64 {
    let timestamps: Vec<f64> = timestamps.into_iter().copied().collect();
    if timestamps.len() < 2 {
        return NEUTRAL_SCORE;
    }
    let diffs: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
    (1.0 - (std_dev(&diffs) / EXPECTED_FRAME_INTERVAL).min(1.0)).max(0.0)
}

fn velocities<'a>(poses: impl Iterator<Item = &'a PoseFrame>) -> Vec<f64> {
    let poses: Vec<&PoseFrame> = poses.collect();
    poses.windows(2).map(|w| w[1].displacement(w[0])).collect()
}

/// How well the performer's movement speed tracks the reference's.
///
/// With enough movement on both sides this is the correlation of the two
/// speed curves (negative correlation scores 0). Otherwise it falls back to
/// how steady the performer's own speed is.
pub fn rhythm_score<'a>(
    live: impl ExactSizeIterator<Item = &'a PoseFrame>,
    reference: &[PoseFrame],
) -> f64 {
    if live.len() < 3 {
        return NEUTRAL_SCORE;
    }
    let live_velocities = velocities(live);

    if reference.len() >= 2 {
        let take = reference.len().min(live_velocities.len() + 1);
        let reference_velocities = velocities(reference[..take].iter());

        if live_velocities.len() >= 3 && reference_velocities.len() >= 3 {
            let n = live_velocities.len().min(reference_velocities.len());
            let (lv, rv) = (&live_velocities[..n], &reference_velocities[..n]);
            if std_dev(lv) > 0.0 && std_dev(rv) > 0.0 {
                let correlation = pearson(lv, rv);
                return if correlation.is_finite() {
                    correlation.clamp(0.0, 1.0)
                } else {
                    NEUTRAL_SCORE
                };
            }
        }
    }

    if live_velocities.len() >= 2 {
        let cv = std_dev(&live_velocities) / (mean(&live_velocities) + CV_EPSILON);
        return (1.0 - cv.min(1.0)).max(0.0);
    }
    NEUTRAL_SCORE
}
