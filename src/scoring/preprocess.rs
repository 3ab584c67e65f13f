//! Per-frame pose cleanup before scoring: scale/translation normalization
//! and exponential smoothing.

use std::collections::VecDeque;

use crate::pose::{Joint, PoseFrame};

/// Smoothed poses kept; only the newest feeds the recurrence.
pub const SMOOTHING_HISTORY: usize = 5;

/// Heights below this are treated as degenerate.
const MIN_HEIGHT: f64 = 1e-9;

fn has_finite_xy(joint: &Joint) -> bool {
    joint.x.is_finite() && joint.y.is_finite()
}

fn span(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Center the pose on its bounding box and scale it by its height, so
/// poses of different sizes and positions compare. A pose with no usable
/// joints is returned unchanged.
pub fn normalize_pose(pose: &PoseFrame) -> PoseFrame {
    let valid = || pose.joints().iter().flatten().filter(|j| has_finite_xy(j));

    let (Some((min_x, max_x)), Some((min_y, max_y))) =
        (span(valid().map(|j| j.x)), span(valid().map(|j| j.y)))
    else {
        return pose.clone();
    };
    let z_center = span(valid().filter_map(|j| j.z).filter(|z| z.is_finite()))
        .map(|(lo, hi)| (lo + hi) / 2.0);

    let mut height = max_y - min_y;
    if height < MIN_HEIGHT {
        height = 1.0;
    }
    let cx = (min_x + max_x) / 2.0;
    let cy = (min_y + max_y) / 2.0;

    PoseFrame::new(
        pose.joints()
            .iter()
            .map(|slot| {
                slot.map(|j| Joint {
                    x: (j.x - cx) / height,
                    y: (j.y - cy) / height,
                    z: j.z.map(|z| (z - z_center.unwrap_or(0.0)) / height),
                    visibility: j.visibility,
                })
            })
            .collect(),
    )
}

fn lerp(factor: f64, current: f64, previous: f64) -> f64 {
    factor * current + (1.0 - factor) * previous
}

fn blend_joint(factor: f64, current: Option<Joint>, previous: Option<Joint>) -> Option<Joint> {
    // A corrupt current joint is treated like a missing one
    let current = current.filter(Joint::is_finite);
    match (current, previous) {
        (Some(c), Some(p)) => Some(Joint {
            x: lerp(factor, c.x, p.x),
            y: lerp(factor, c.y, p.y),
            z: match (c.z, p.z) {
                (Some(cz), Some(pz)) => Some(lerp(factor, cz, pz)),
                (cz, pz) => cz.or(pz),
            },
            visibility: match (c.visibility, p.visibility) {
                (Some(cv), Some(pv)) => Some(lerp(factor, cv, pv)),
                (cv, pv) => cv.or(pv),
            },
        }),
        (c, p) => c.or(p),
    }
}

/// Exponentially weighted moving average over poses:
/// `smoothed = factor * pose + (1 - factor) * previous_smoothed`.
#[derive(Debug, Clone)]
pub struct PoseSmoother {
    factor: f64,
    history: VecDeque<PoseFrame>,
}

impl PoseSmoother {
    /// `factor` is clamped to [0, 1]; 1 disables smoothing.
    pub fn new(factor: f64) -> Self {
        let factor = if factor.is_finite() { factor.clamp(0.0, 1.0) } else { 1.0 };
        Self {
            factor,
            history: VecDeque::with_capacity(SMOOTHING_HISTORY),
        }
    }

    pub fn smooth(&mut self, pose: &PoseFrame) -> PoseFrame {
        let smoothed = match self.history.back() {
            None => pose.clone(),
            Some(previous) => {
                let len = pose.len().max(previous.len());
                PoseFrame::new(
                    (0..len)
                        .map(|slot| {
                            blend_joint(
                                self.factor,
                                pose.joint(slot).copied(),
                                previous.joint(slot).copied(),
                            )
                        })
                        .collect(),
                )
            }
        };

        if self.history.len() == SMOOTHING_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(smoothed.clone());
        smoothed
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(points: &[(f64, f64)]) -> PoseFrame {
        PoseFrame::from_joints(points.iter().map(|&(x, y)| Joint::new(x, y)))
    }

    #[test]
    fn test_normalize_centers_and_scales() {
        let normalized = normalize_pose(&pose(&[(100.0, 100.0), (200.0, 300.0)]));
        assert_eq!(normalized.joint(0), Some(&Joint::new(-0.25, -0.5)));
        assert_eq!(normalized.joint(1), Some(&Joint::new(0.25, 0.5)));
    }

    #[test]
    fn test_normalize_is_scale_invariant() {
        let small = normalize_pose(&pose(&[(0.0, 0.0), (1.0, 2.0), (3.0, 1.0)]));
        let large = normalize_pose(&pose(&[(10.0, 10.0), (20.0, 30.0), (40.0, 20.0)]));
        assert!(small.displacement(&large) < 1e-12);
    }

    #[test]
    fn test_flat_pose_uses_unit_height() {
        let normalized = normalize_pose(&pose(&[(0.0, 5.0), (4.0, 5.0)]));
        assert_eq!(normalized.joint(0), Some(&Joint::new(-2.0, 0.0)));
    }

    #[test]
    fn test_normalize_skips_missing_and_corrupt() {
        let frame = PoseFrame::new(vec![
            Some(Joint::new(0.0, 0.0)),
            None,
            Some(Joint::new(f64::NAN, 50.0)),
            Some(Joint::new(2.0, 2.0)),
        ]);
        let normalized = normalize_pose(&frame);
        assert!(normalized.joint(1).is_none());
        assert_eq!(normalized.joint(3), Some(&Joint::new(0.5, 0.5)));

        let empty = PoseFrame::new(vec![None, None]);
        assert_eq!(normalize_pose(&empty), empty);
    }

    #[test]
    fn test_smoothing_recurrence() {
        let mut smoother = PoseSmoother::new(0.3);
        let first = smoother.smooth(&pose(&[(10.0, 0.0)]));
        assert_eq!(first, pose(&[(10.0, 0.0)]));

        let second = smoother.smooth(&pose(&[(20.0, 10.0)]));
        let j = second.joint(0).unwrap();
        assert!((j.x - 13.0).abs() < 1e-12);
        assert!((j.y - 3.0).abs() < 1e-12);

        // recurrence runs on the smoothed value, not the raw previous pose
        let third = smoother.smooth(&pose(&[(20.0, 10.0)]));
        assert!((third.joint(0).unwrap().x - (0.3 * 20.0 + 0.7 * 13.0)).abs() < 1e-12);
    }

    #[test]
    fn test_smoothing_with_missing_joints() {
        let mut smoother = PoseSmoother::new(0.5);
        smoother.smooth(&PoseFrame::new(vec![Some(Joint::new(2.0, 2.0)), None]));
        let out = smoother.smooth(&PoseFrame::new(vec![None, Some(Joint::new(4.0, 4.0))]));
        assert_eq!(out.joint(0), Some(&Joint::new(2.0, 2.0)));
        assert_eq!(out.joint(1), Some(&Joint::new(4.0, 4.0)));
    }

    #[test]
    fn test_history_bounded_and_reset() {
        let mut smoother = PoseSmoother::new(0.3);
        for i in 0..12 {
            smoother.smooth(&pose(&[(i as f64, 0.0)]));
        }
        assert_eq!(smoother.len(), SMOOTHING_HISTORY);

        smoother.reset();
        assert!(smoother.is_empty());
        let fresh = smoother.smooth(&pose(&[(7.0, 7.0)]));
        assert_eq!(fresh, pose(&[(7.0, 7.0)]));
    }
}
