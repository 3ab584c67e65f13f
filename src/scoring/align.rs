use crate::pose::{COCO_JOINT_COUNT, COCO_LIMB_SLOTS, PoseFrame};

/// Reference pose index for `elapsed` seconds into a looping reference of
/// `duration` seconds and `count` poses.
pub fn reference_index(elapsed: f64, duration: f64, count: usize) -> usize {
    if count == 0 || !(duration > 0.0) || !duration.is_finite() || !elapsed.is_finite() {
        return 0;
    }
    let progress = elapsed.rem_euclid(duration) / duration;
    ((progress * count as f64).floor() as usize).min(count - 1)
}

/// Distance between a live pose and a reference pose. Full-body COCO poses
/// are compared on the limbs (shoulders down); anything else on every slot
/// both poses have.
pub fn pose_distance(live: &PoseFrame, reference: &PoseFrame) -> f64 {
    if live.len() >= COCO_JOINT_COUNT && reference.len() >= COCO_JOINT_COUNT {
        live.distance_over(reference, COCO_LIMB_SLOTS)
    } else {
        live.displacement(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Joint;

    #[test]
    fn test_reference_index_progress() {
        assert_eq!(reference_index(0.0, 2.0, 120), 0);
        assert_eq!(reference_index(1.0, 2.0, 120), 60);
        assert_eq!(reference_index(1.999, 2.0, 120), 119);
    }

    #[test]
    fn test_alignment_wraps() {
        assert_eq!(reference_index(2.5, 2.0, 120), reference_index(0.5, 2.0, 120));
        assert_eq!(reference_index(4.0, 2.0, 120), 0);
    }

    #[test]
    fn test_degenerate_reference() {
        assert_eq!(reference_index(3.0, 0.0, 10), 0);
        assert_eq!(reference_index(3.0, -1.0, 10), 0);
        assert_eq!(reference_index(3.0, 2.0, 0), 0);
    }

    #[test]
    fn test_head_is_ignored_for_coco() {
        let base = PoseFrame::from_joints((0..17).map(|i| Joint::new(i as f64, 0.0)));
        let mut joints: Vec<Option<Joint>> = base.joints().to_vec();
        joints[0] = Some(Joint::new(100.0, 100.0));
        let moved_head = PoseFrame::new(joints.clone());
        assert_eq!(pose_distance(&moved_head, &base), 0.0);

        joints[9] = Some(Joint::new(9.0, 4.0));
        assert!((pose_distance(&PoseFrame::new(joints), &base) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_small_poses_use_shared_slots() {
        let a = PoseFrame::from_joints([
            Joint::new(0.0, 0.0),
            Joint::new(3.0, 0.0),
            Joint::new(9.0, 9.0),
        ]);
        let b = PoseFrame::from_joints([Joint::new(0.0, 4.0), Joint::new(3.0, 0.0)]);
        assert!((pose_distance(&a, &b) - 4.0).abs() < 1e-12);
    }
}
