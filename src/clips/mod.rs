pub mod layout;
pub mod metadata;

use crate::analyzer::intensity::Intensity;
use crate::pose::PoseFrame;
use layout::{ClipData, LayoutError};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ClipError {
    #[error("Clip not found: {0}")]
    NotFound(String),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Bad keypoint data in clip {id}: {source}")]
    Layout { id: String, source: LayoutError },
    #[error("Clip {0} has no readable frames")]
    Unreadable(String),
}

/// A motion clip as the sequencer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionClip {
    pub id: String,
    pub intensity: Option<Intensity>,
    pub frame_count: usize,
}

/// Frames and playback length from a single read of a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedClip {
    pub frames: Vec<PoseFrame>,
    /// `None` for an empty clip.
    pub duration: Option<f64>,
}

/// Read-only access to a collection of recorded motion clips.
pub trait MotionClipStore {
    /// Clip ids in a stable order. Position in this list is the clip's
    /// index into the intensity catalog.
    fn list_clips(&self) -> Vec<String>;

    fn load_clip(&self, id: &str) -> Result<LoadedClip, ClipError>;

    fn load_clip_frames(&self, id: &str) -> Result<Vec<PoseFrame>, ClipError> {
        Ok(self.load_clip(id)?.frames)
    }

    /// Playback length in seconds, if it can be determined.
    fn clip_duration(&self, id: &str) -> Option<f64> {
        match self.load_clip(id) {
            Ok(clip) => clip.duration,
            Err(e) => {
                log::debug!("No duration for {}: {}", id, e);
                None
            }
        }
    }
}

/// Load a uniformly chosen clip, optionally restricted to one dance style.
/// `Ok(None)` when no clip matches.
pub fn load_random_clip<S, R>(
    store: &S,
    style: Option<&str>,
    rng: &mut R,
) -> Result<Option<(String, Vec<PoseFrame>)>, ClipError>
where
    S: MotionClipStore + ?Sized,
    R: Rng + ?Sized,
{
    let ids = store.list_clips();
    let candidates: Vec<&String> = match style {
        Some(style) => metadata::clips_by_style(&ids, style),
        None => ids.iter().collect(),
    };
    let Some(id) = candidates.choose(rng) else {
        return Ok(None);
    };
    let frames = store.load_clip_frames(id)?;
    log::info!("Picked reference clip {} ({} frames)", id, frames.len());
    Ok(Some((id.to_string(), frames)))
}

/// Directory of JSON keypoint files; the file stem is the clip id.
#[derive(Debug, Clone)]
pub struct JsonClipStore {
    files: BTreeMap<String, PathBuf>,
}

impl JsonClipStore {
    /// Discover `*.json` clip files under `root`, recursively.
    pub fn open(root: &Path) -> Result<Self, ClipError> {
        if !root.is_dir() {
            return Err(ClipError::Io {
                path: root.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "clip directory not found",
                ),
            });
        }

        let mut files = BTreeMap::new();
        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_json = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json"));
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if is_json {
                if let Some(previous) = files.insert(stem.to_string(), path.to_path_buf()) {
                    log::warn!("Duplicate clip id {}: ignoring {}", stem, previous.display());
                }
            }
        }

        log::info!("Found {} clips in {}", files.len(), root.display());
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn read_clip(&self, id: &str) -> Result<ClipData, ClipError> {
        let path = self
            .files
            .get(id)
            .ok_or_else(|| ClipError::NotFound(id.to_string()))?;
        let text = std::fs::read_to_string(path).map_err(|source| ClipError::Io {
            path: path.display().to_string(),
            source,
        })?;
        layout::parse_clip(&text).map_err(|source| ClipError::Layout {
            id: id.to_string(),
            source,
        })
    }
}

impl MotionClipStore for JsonClipStore {
    fn list_clips(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    fn load_clip(&self, id: &str) -> Result<LoadedClip, ClipError> {
        let clip = self.read_clip(id)?;
        Ok(LoadedClip {
            duration: clip.duration(),
            frames: clip.frames,
        })
    }
}

/// In-memory clips, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipStore {
    clips: BTreeMap<String, MemoryClip>,
}

#[derive(Debug, Clone)]
struct MemoryClip {
    /// `None` simulates a clip whose data cannot be read.
    frames: Option<Vec<PoseFrame>>,
    frame_rate: f64,
}

impl MemoryClipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, frames: Vec<PoseFrame>, frame_rate: f64) {
        self.clips.insert(
            id.into(),
            MemoryClip {
                frames: Some(frames),
                frame_rate,
            },
        );
    }

    /// Register a clip that is listed but fails to load.
    pub fn insert_unreadable(&mut self, id: impl Into<String>) {
        self.clips.insert(
            id.into(),
            MemoryClip {
                frames: None,
                frame_rate: layout::DEFAULT_CLIP_FRAME_RATE,
            },
        );
    }
}

impl MotionClipStore for MemoryClipStore {
    fn list_clips(&self) -> Vec<String> {
        self.clips.keys().cloned().collect()
    }

    fn load_clip(&self, id: &str) -> Result<LoadedClip, ClipError> {
        let clip = self
            .clips
            .get(id)
            .ok_or_else(|| ClipError::NotFound(id.to_string()))?;
        let frames = clip
            .frames
            .clone()
            .ok_or_else(|| ClipError::Unreadable(id.to_string()))?;
        let duration = (!frames.is_empty() && clip.frame_rate > 0.0)
            .then(|| frames.len() as f64 / clip.frame_rate);
        Ok(LoadedClip { frames, duration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Joint;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn write_clip(dir: &Path, name: &str, frames: usize) {
        let frame = vec![vec![1.0, 2.0]; 17];
        let text = serde_json::to_string(&vec![frame; frames]).unwrap();
        std::fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn test_json_store_discovers_sorted_clips() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        write_clip(dir.path(), "gPO_sBM.json", 30);
        write_clip(&nested, "gBR_sBM.json", 60);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = JsonClipStore::open(dir.path()).unwrap();
        assert_eq!(store.list_clips(), vec!["gBR_sBM", "gPO_sBM"]);
        assert_eq!(store.load_clip_frames("gBR_sBM").unwrap().len(), 60);
        assert!((store.clip_duration("gBR_sBM").unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_json_store_loads_frames_and_duration_together() {
        let dir = tempfile::tempdir().unwrap();
        let frame = vec![vec![1.0, 2.0]; 17];
        let text = serde_json::json!({ "keypoints": vec![frame; 90], "fps": 60 }).to_string();
        std::fs::write(dir.path().join("gJB_sFM.json"), text).unwrap();

        let store = JsonClipStore::open(dir.path()).unwrap();
        let clip = store.load_clip("gJB_sFM").unwrap();
        assert_eq!(clip.frames.len(), 90);
        assert_eq!(clip.duration, Some(1.5));
        assert_eq!(store.clip_duration("gJB_sFM"), Some(1.5));
    }

    #[test]
    fn test_json_store_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let store = JsonClipStore::open(dir.path()).unwrap();

        assert!(matches!(store.load_clip_frames("broken"), Err(ClipError::Layout { .. })));
        assert!(matches!(store.load_clip_frames("absent"), Err(ClipError::NotFound(_))));
        assert_eq!(store.clip_duration("broken"), None);

        assert!(JsonClipStore::open(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_random_clip_respects_style() {
        let mut store = MemoryClipStore::new();
        let frames = vec![PoseFrame::from_joints([Joint::new(1.0, 1.0)]); 5];
        store.insert("gBR_sBM_cAll_d04_mBR0_ch01", frames.clone(), 30.0);
        store.insert("gPO_sBM_cAll_d04_mPO0_ch01", frames.clone(), 30.0);
        store.insert("gPO_sFM_cAll_d05_mPO1_ch02", frames, 30.0);

        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..10 {
            let (id, loaded) = load_random_clip(&store, Some("gPO"), &mut rng)
                .unwrap()
                .unwrap();
            assert!(id.starts_with("gPO_"));
            assert_eq!(loaded.len(), 5);
        }
        assert!(load_random_clip(&store, None, &mut rng).unwrap().is_some());
        assert!(load_random_clip(&store, Some("gTP"), &mut rng).unwrap().is_none());

        let mut broken = MemoryClipStore::new();
        broken.insert_unreadable("gBR_only");
        assert!(matches!(
            load_random_clip(&broken, None, &mut rng),
            Err(ClipError::Unreadable(_))
        ));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryClipStore::new();
        store.insert("b", vec![PoseFrame::from_joints([Joint::new(0.0, 0.0)]); 15], 30.0);
        store.insert("a", Vec::new(), 30.0);
        store.insert_unreadable("c");

        assert_eq!(store.list_clips(), vec!["a", "b", "c"]);
        assert_eq!(store.clip_duration("b"), Some(0.5));
        assert_eq!(store.clip_duration("a"), None);
        assert_eq!(store.clip_duration("c"), None);
        assert!(matches!(store.load_clip_frames("c"), Err(ClipError::Unreadable(_))));
        assert_eq!(store.load_clip("a").unwrap().duration, None);
    }
}
