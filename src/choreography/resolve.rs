use crate::pose::PoseFrame;

/// How far either side of a corrupt frame to look for a usable one.
pub const SEARCH_RADIUS: usize = 50;

/// Loop `raw` into `[0, count)`. `count` of zero maps to 0.
pub fn wrap_index(raw: usize, count: usize) -> usize {
    if count == 0 { 0 } else { raw % count }
}

/// Pose for frame `index` of a clip. Corrupt frames are replaced by the
/// nearest fully valid frame within [`SEARCH_RADIUS`] (forward first at each
/// distance, wrapping around the clip), else by the default standing pose.
pub fn resolve_pose(frames: &[PoseFrame], index: usize) -> PoseFrame {
    let count = frames.len();
    if count == 0 {
        return PoseFrame::default_standing();
    }

    let index = wrap_index(index, count);
    if frames[index].is_fully_valid() {
        return frames[index].clone();
    }

    for offset in 1..SEARCH_RADIUS.min(count) {
        let forward = (index + offset) % count;
        let backward = (index + count - offset) % count;
        for candidate in [forward, backward] {
            if frames[candidate].is_fully_valid() {
                log::trace!("Frame {} corrupt, using {}", index, candidate);
                return frames[candidate].clone();
            }
        }
    }

    PoseFrame::default_standing()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Joint;

    fn marked(tag: f64) -> PoseFrame {
        PoseFrame::from_joints([Joint::new(tag, 0.0)])
    }

    fn corrupt() -> PoseFrame {
        PoseFrame::from_joints([Joint::new(f64::NAN, 0.0)])
    }

    #[test]
    fn test_wrap_index() {
        assert_eq!(wrap_index(0, 40), 0);
        assert_eq!(wrap_index(45, 40), 5);
        assert_eq!(wrap_index(80, 40), 0);
        assert_eq!(wrap_index(7, 0), 0);
    }

    #[test]
    fn test_valid_frame_used_directly() {
        let frames = vec![marked(0.0), marked(1.0), marked(2.0)];
        assert_eq!(resolve_pose(&frames, 1), marked(1.0));
        assert_eq!(resolve_pose(&frames, 4), marked(1.0));
    }

    #[test]
    fn test_forward_neighbor_wins_ties() {
        let frames = vec![marked(0.0), corrupt(), marked(2.0)];
        assert_eq!(resolve_pose(&frames, 1), marked(2.0));
    }

    #[test]
    fn test_backward_neighbor_when_closer() {
        let frames = vec![marked(0.0), corrupt(), corrupt(), corrupt(), marked(4.0), marked(5.0)];
        // index 2: +1 corrupt, -1 corrupt, +2 valid(4)
        assert_eq!(resolve_pose(&frames, 2), marked(4.0));
        // index 1: +1 corrupt, -1 valid(0)
        assert_eq!(resolve_pose(&frames, 1), marked(0.0));
    }

    #[test]
    fn test_search_wraps_around() {
        let frames = vec![corrupt(), corrupt(), corrupt(), marked(3.0)];
        // from 0: +1 corrupt, -1 wraps to 3
        assert_eq!(resolve_pose(&frames, 0), marked(3.0));
    }

    #[test]
    fn test_search_radius_limit() {
        let mut frames = vec![corrupt(); 200];
        frames[100] = marked(100.0);
        assert_eq!(resolve_pose(&frames, 60), marked(100.0));
        assert_eq!(resolve_pose(&frames, 0), PoseFrame::default_standing());
    }

    #[test]
    fn test_all_corrupt_uses_default() {
        let frames = vec![corrupt(); 5];
        assert_eq!(resolve_pose(&frames, 2), PoseFrame::default_standing());
        assert_eq!(resolve_pose(&[], 0), PoseFrame::default_standing());
    }
}
