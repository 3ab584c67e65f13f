//! Random clip selection with a data-quality screen.

use rand::Rng;

use crate::clips::MotionClipStore;
use crate::pose::PoseFrame;

/// Picks tried before settling for whatever was drawn last.
pub const MAX_SELECTION_ATTEMPTS: usize = 10;

/// Frames sampled per candidate by the quality screen.
pub const QUALITY_SAMPLES: usize = 10;

/// A candidate is rejected at or above this share of corrupt sampled frames.
pub const MAX_INVALID_FRACTION: f64 = 0.3;

/// Outcome of a selection round.
#[derive(Debug, Clone)]
pub struct Selection {
    pub clip_index: usize,
    /// `None` when the clip's frames could not be loaded.
    pub frames: Option<Vec<PoseFrame>>,
    /// Playback length reported by the same read as `frames`.
    pub duration: Option<f64>,
    pub attempts: usize,
    /// False when every attempt failed and the last pick was kept anyway.
    pub passed_quality: bool,
}

/// Sample frames with replacement; true when the corrupt share stays
/// below [`MAX_INVALID_FRACTION`]. Empty clips never pass.
pub fn passes_quality_check<R: Rng + ?Sized>(frames: &[PoseFrame], rng: &mut R) -> bool {
    if frames.is_empty() {
        return false;
    }
    let sampled = QUALITY_SAMPLES.min(frames.len());
    let invalid = (0..sampled)
        .filter(|_| !frames[rng.gen_range(0..frames.len())].is_fully_valid())
        .count();
    (invalid as f64 / sampled as f64) < MAX_INVALID_FRACTION
}

/// Draw clips uniformly from `pool` (indices into `clips`) until one loads
/// and passes the quality screen. After [`MAX_SELECTION_ATTEMPTS`] failures
/// the last pick is returned unconditionally. `None` only for an empty pool.
pub fn select_clip<S, R>(
    store: &S,
    clips: &[String],
    pool: &[usize],
    rng: &mut R,
) -> Option<Selection>
where
    S: MotionClipStore + ?Sized,
    R: Rng + ?Sized,
{
    if pool.is_empty() {
        return None;
    }

    let mut last: Option<Selection> = None;
    for attempt in 1..=MAX_SELECTION_ATTEMPTS {
        let clip_index = pool[rng.gen_range(0..pool.len())];
        let id = &clips[clip_index];

        let (frames, duration) = match store.load_clip(id) {
            Ok(clip) => (Some(clip.frames), clip.duration),
            Err(e) => {
                log::warn!("Could not load clip {}: {}", id, e);
                (None, None)
            }
        };

        let passed = frames
            .as_deref()
            .is_some_and(|f| passes_quality_check(f, rng));
        let selection = Selection {
            clip_index,
            frames,
            duration,
            attempts: attempt,
            passed_quality: passed,
        };
        if passed {
            return Some(selection);
        }
        log::debug!("Rejected clip {} (attempt {})", id, attempt);
        last = Some(selection);
    }

    if let Some(selection) = &last {
        log::debug!(
            "No clip passed the quality check; keeping {}",
            clips[selection.clip_index]
        );
    }
    last
}
