//! Pose frames: ordered joint slots with an explicit "missing" marker per slot.
//!
//! A slot holding `None` means the detector or recording has no data for that
//! joint. A present joint may still carry non-finite coordinates, which is how
//! corrupt recordings show up; [`PoseFrame::is_fully_valid`] rejects those.

use serde::{Deserialize, Serialize};

/// Joint count of the COCO keypoint layout.
pub const COCO_JOINT_COUNT: usize = 17;

/// COCO slots from the shoulders down to the ankles.
pub const COCO_LIMB_SLOTS: std::ops::RangeInclusive<usize> = 5..=16;

/// A single keypoint. `z` and `visibility` are absent for 2D layouts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
    pub visibility: Option<f64>,
}

impl Joint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None, visibility: None }
    }

    pub const fn with_z(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z), visibility: None }
    }

    pub const fn with_visibility(mut self, visibility: f64) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// True when every component this joint carries is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_none_or(f64::is_finite)
            && self.visibility.is_none_or(f64::is_finite)
    }

    /// Squared spatial distance. `z` only contributes when both joints have it.
    pub fn distance_sq(&self, other: &Joint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = match (self.z, other.z) {
            (Some(a), Some(b)) => a - b,
            _ => 0.0,
        };
        dx * dx + dy * dy + dz * dz
    }
}

/// One frame of a pose stream or motion clip.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PoseFrame {
    joints: Vec<Option<Joint>>,
}

impl PoseFrame {
    pub fn new(joints: Vec<Option<Joint>>) -> Self {
        Self { joints }
    }

    /// Build a frame where every slot is present.
    pub fn from_joints(joints: impl IntoIterator<Item = Joint>) -> Self {
        Self {
            joints: joints.into_iter().map(Some).collect(),
        }
    }

    pub fn joints(&self) -> &[Option<Joint>] {
        &self.joints
    }

    pub fn joint(&self, slot: usize) -> Option<&Joint> {
        self.joints.get(slot).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// No present joint carries a non-finite component.
    pub fn is_fully_valid(&self) -> bool {
        self.joints.iter().flatten().all(Joint::is_finite)
    }

    /// Present joints with finite coordinates.
    pub fn valid_joints(&self) -> impl Iterator<Item = &Joint> {
        self.joints.iter().flatten().filter(|j| j.is_finite())
    }

    /// Euclidean distance over the flattened coordinates of `slots`.
    /// Slots that are missing or invalid on either side are skipped.
    pub fn distance_over(&self, other: &PoseFrame, slots: impl IntoIterator<Item = usize>) -> f64 {
        slots
            .into_iter()
            .filter_map(|slot| match (self.joint(slot), other.joint(slot)) {
                (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Some(a.distance_sq(b)),
                _ => None,
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Norm of the frame-to-frame displacement over every shared slot.
    pub fn displacement(&self, other: &PoseFrame) -> f64 {
        self.distance_over(other, 0..self.len().min(other.len()))
    }

    /// Canonical standing figure used when a clip has no usable frame nearby.
    /// COCO layout; only the head, shoulders and hips are populated.
    pub fn default_standing() -> Self {
        const POPULATED: [(usize, f64, f64); 7] = [
            (0, 500.0, 200.0),  // nose
            (1, 490.0, 210.0),  // left eye
            (2, 510.0, 210.0),  // right eye
            (5, 480.0, 300.0),  // left shoulder
            (6, 520.0, 300.0),  // right shoulder
            (11, 480.0, 500.0), // left hip
            (12, 520.0, 500.0), // right hip
        ];

        let mut joints = vec![None; COCO_JOINT_COUNT];
        for (slot, x, y) in POPULATED {
            joints[slot] = Some(Joint::new(x, y).with_visibility(0.9));
        }
        Self { joints }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_joint_invalidates_frame() {
        let mut joints: Vec<Option<Joint>> =
            (0..4).map(|i| Some(Joint::new(i as f64, 1.0))).collect();
        assert!(PoseFrame::new(joints.clone()).is_fully_valid());

        joints[2] = Some(Joint::new(f64::NAN, 1.0));
        assert!(!PoseFrame::new(joints).is_fully_valid());
    }

    #[test]
    fn test_missing_slots_are_not_invalid() {
        let frame = PoseFrame::new(vec![Some(Joint::new(1.0, 2.0)), None, None]);
        assert!(frame.is_fully_valid());
        assert_eq!(frame.valid_joints().count(), 1);
    }

    #[test]
    fn test_distance_skips_missing_slots() {
        let a = PoseFrame::new(vec![Some(Joint::new(0.0, 0.0)), Some(Joint::new(5.0, 5.0))]);
        let b = PoseFrame::new(vec![Some(Joint::new(3.0, 4.0)), None]);
        assert!((a.distance_over(&b, 0..2) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_z_only_counts_when_shared() {
        let a = PoseFrame::from_joints([Joint::with_z(0.0, 0.0, 10.0)]);
        let b = PoseFrame::from_joints([Joint::new(0.0, 0.0)]);
        let c = PoseFrame::from_joints([Joint::with_z(0.0, 0.0, 7.0)]);
        assert_eq!(a.displacement(&b), 0.0);
        assert!((a.displacement(&c) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_standing_layout() {
        let pose = PoseFrame::default_standing();
        assert_eq!(pose.len(), COCO_JOINT_COUNT);
        assert!(pose.is_fully_valid());
        assert_eq!(pose.valid_joints().count(), 7);
        assert_eq!(pose.joint(0), Some(&Joint::new(500.0, 200.0).with_visibility(0.9)));
        assert!(pose.joint(7).is_none());
    }
}
