//! Turns classified song segments into a frame-by-frame choreography.
//!
//! Once per segment the sequencer decides whether the active clip keeps
//! playing or a new one is drawn from the pool matching the segment's
//! intensity. It then emits one frame per output tick, looping the active
//! clip and patching over corrupt frames.

pub mod resolve;
pub mod selection;

use crate::analyzer::features::AudioFeatureProvider;
use crate::analyzer::intensity::Intensity;
use crate::analyzer::{self, AnalyzeError, AnalyzeOptions, AudioSegment};
use crate::catalog::{CatalogError, IntensityCatalog};
use crate::clips::{MotionClip, MotionClipStore};
use crate::pose::PoseFrame;
use rand::Rng;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// An active clip may not switch on intensity alone before this many seconds.
pub const MIN_DWELL_SECS: f64 = 2.0;

/// Duration assumed when the store cannot report one.
pub const DEFAULT_CLIP_DURATION: f64 = 5.0;

#[derive(Error, Debug)]
pub enum ChoreographyError {
    #[error("Intensity catalog is empty")]
    EmptyCatalog,
    #[error("Output frame rate must be positive, got {0}")]
    InvalidFrameRate(f64),
    #[error("Frame delay must be zero or positive, got {0}")]
    InvalidFrameDelay(f64),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Analysis error: {0}")]
    Analyze(#[from] AnalyzeError),
}

/// One output frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoreographyFrame {
    pub frame_number: usize,
    pub time: f64,
    pub clip_id: Option<String>,
    pub clip_frame_index: usize,
    pub intensity: Intensity,
    pub pose: Option<PoseFrame>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencerSettings {
    /// Output frames per second.
    pub frame_rate: f64,
    /// Seconds added to every emitted frame time.
    pub frame_delay: f64,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            frame_rate: 30.0,
            frame_delay: 0.0,
        }
    }
}

/// Why the sequencer drew a new clip for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchReason {
    NoActiveClip,
    /// Played for at least its duration.
    Exhausted,
    /// Segment intensity differs and the minimum dwell has passed.
    IntensityChanged,
    /// Not enough frames left to cover the segment.
    InsufficientFrames,
}

#[derive(Debug, Clone)]
struct ActiveClip {
    clip: MotionClip,
    /// `None` when the frames could not be loaded.
    frames: Option<Vec<PoseFrame>>,
    elapsed: f64,
    duration: f64,
}

impl ActiveClip {
    /// Decide whether this clip must be replaced before `target` plays.
    fn switch_reason(
        &self,
        target: Intensity,
        segment_frames: usize,
        frame_rate: f64,
    ) -> Option<SwitchReason> {
        if self.elapsed >= self.duration {
            return Some(SwitchReason::Exhausted);
        }
        if self.clip.intensity != Some(target) && self.elapsed > MIN_DWELL_SECS {
            return Some(SwitchReason::IntensityChanged);
        }
        if let Some(frames) = &self.frames {
            let played = (self.elapsed * frame_rate).floor() as usize;
            if played + segment_frames >= frames.len() {
                return Some(SwitchReason::InsufficientFrames);
            }
        }
        None
    }
}

/// Stateful segment-by-segment clip sequencer.
pub struct Sequencer<'a, S: MotionClipStore + ?Sized, R: Rng> {
    store: &'a S,
    clips: Vec<String>,
    pools: BTreeMap<Intensity, Vec<usize>>,
    settings: SequencerSettings,
    rng: R,
    active: Option<ActiveClip>,
    frame_number: usize,
}

impl<'a, S: MotionClipStore + ?Sized, R: Rng> Sequencer<'a, S, R> {
    /// `labels[i]` is the intensity of the store's i-th clip.
    pub fn new(
        store: &'a S,
        labels: &[Intensity],
        settings: SequencerSettings,
        rng: R,
    ) -> Result<Self, ChoreographyError> {
        if labels.is_empty() {
            return Err(ChoreographyError::EmptyCatalog);
        }
        if !(settings.frame_rate > 0.0) || !settings.frame_rate.is_finite() {
            return Err(ChoreographyError::InvalidFrameRate(settings.frame_rate));
        }
        if !(settings.frame_delay >= 0.0) || !settings.frame_delay.is_finite() {
            return Err(ChoreographyError::InvalidFrameDelay(settings.frame_delay));
        }

        let clips = store.list_clips();
        if clips.len() != labels.len() {
            log::warn!(
                "Catalog has {} labels for {} clips; unlabeled clips only play as fallback",
                labels.len(),
                clips.len()
            );
        }

        let mut pools: BTreeMap<Intensity, Vec<usize>> = BTreeMap::new();
        for (i, label) in labels.iter().enumerate().take(clips.len()) {
            pools.entry(*label).or_default().push(i);
        }
        for intensity in Intensity::ALL {
            log::debug!(
                "{} pool: {} clips",
                intensity,
                pools.get(&intensity).map_or(0, Vec::len)
            );
        }

        Ok(Self {
            store,
            clips,
            pools,
            settings,
            rng,
            active: None,
            frame_number: 0,
        })
    }

    /// Sequence every segment in order.
    pub fn run(&mut self, segments: &[AudioSegment]) -> Vec<ChoreographyFrame> {
        let mut frames = Vec::new();
        for segment in segments {
            frames.extend(self.process_segment(segment));
        }
        log::info!(
            "Sequenced {} frames over {} segments",
            frames.len(),
            segments.len()
        );
        frames
    }

    fn segment_frames(&self, segment: &AudioSegment) -> usize {
        (segment.duration().max(0.0) * self.settings.frame_rate).floor() as usize
    }

    /// Keep, or replace, the active clip, then emit this segment's frames.
    pub fn process_segment(&mut self, segment: &AudioSegment) -> Vec<ChoreographyFrame> {
        let segment_frames = self.segment_frames(segment);
        let target = segment.intensity;

        let reason = match &self.active {
            None => Some(SwitchReason::NoActiveClip),
            Some(active) => {
                active.switch_reason(target, segment_frames, self.settings.frame_rate)
            }
        };
        if let Some(reason) = reason {
            log::debug!(
                "{:.1}s: selecting {} clip ({:?})",
                segment.start_time,
                target,
                reason
            );
            self.select(target);
        }

        let frame_rate = self.settings.frame_rate;
        let frame_delay = self.settings.frame_delay;
        let start_tick = self
            .active
            .as_ref()
            .map_or(0, |a| (a.elapsed * frame_rate).floor() as usize);

        let mut out = Vec::with_capacity(segment_frames);
        for i in 0..segment_frames {
            let (clip_id, clip_frame_index, pose) = match &self.active {
                None => (None, 0, None),
                Some(active) => {
                    let raw = start_tick + i;
                    match active.frames.as_deref() {
                        Some(frames) => {
                            let index = resolve::wrap_index(raw, frames.len());
                            let pose = resolve::resolve_pose(frames, index);
                            (Some(active.clip.id.clone()), index, Some(pose))
                        }
                        None => (Some(active.clip.id.clone()), raw, None),
                    }
                }
            };
            out.push(ChoreographyFrame {
                frame_number: self.frame_number,
                time: segment.start_time + i as f64 / frame_rate + frame_delay,
                clip_id,
                clip_frame_index,
                intensity: target,
                pose,
            });
            self.frame_number += 1;
        }

        if let Some(active) = self.active.as_mut() {
            active.elapsed += segment.duration();
        }
        out
    }

    fn select(&mut self, target: Intensity) {
        let pool: Vec<usize> = match self.pools.get(&target) {
            Some(pool) if !pool.is_empty() => pool.clone(),
            _ => (0..self.clips.len()).collect(),
        };

        let picked = selection::select_clip(self.store, &self.clips, &pool, &mut self.rng);
        let Some(picked) = picked else {
            log::warn!("No clips available; emitting frames without poses");
            self.active = None;
            return;
        };

        let id = self.clips[picked.clip_index].clone();
        let frames = picked.frames.filter(|f| !f.is_empty());
        let duration = picked.duration.unwrap_or(DEFAULT_CLIP_DURATION);
        log::debug!(
            "Selected {} after {} attempt(s) ({:.2}s)",
            id,
            picked.attempts,
            duration
        );

        self.active = Some(ActiveClip {
            clip: MotionClip {
                frame_count: frames.as_ref().map_or(0, Vec::len),
                intensity: Some(target),
                id,
            },
            frames,
            elapsed: 0.0,
            duration,
        });
    }

    /// The clip currently playing, if any.
    pub fn active_clip(&self) -> Option<&MotionClip> {
        self.active.as_ref().map(|a| &a.clip)
    }
}

/// Everything needed to choreograph one song.
#[derive(Debug, Clone, Default)]
pub struct ChoreographyOptions {
    pub analyze: AnalyzeOptions,
    pub sequencer: SequencerSettings,
}

/// Result of a full run: the classified segments and the emitted frames.
#[derive(Debug, Clone)]
pub struct Choreography {
    pub segments: Vec<AudioSegment>,
    pub frames: Vec<ChoreographyFrame>,
}

/// Sequence already classified segments against the catalog and store.
pub fn choreograph_segments<S, C, R>(
    segments: Vec<AudioSegment>,
    store: &S,
    catalog: &C,
    settings: SequencerSettings,
    rng: R,
) -> Result<Choreography, ChoreographyError>
where
    S: MotionClipStore + ?Sized,
    C: IntensityCatalog + ?Sized,
    R: Rng,
{
    let labels = catalog.load()?;
    let mut sequencer = Sequencer::new(store, &labels, settings, rng)?;
    let frames = sequencer.run(&segments);
    Ok(Choreography { segments, frames })
}

/// Decode, analyze and sequence a song file. The catalog is checked before
/// decoding starts.
pub fn choreograph_file<P, S, C, R>(
    path: &Path,
    provider: &P,
    store: &S,
    catalog: &C,
    options: &ChoreographyOptions,
    rng: R,
) -> Result<Choreography, ChoreographyError>
where
    P: AudioFeatureProvider + ?Sized,
    S: MotionClipStore + ?Sized,
    C: IntensityCatalog + ?Sized,
    R: Rng,
{
    let labels = catalog.load()?;
    if labels.is_empty() {
        return Err(ChoreographyError::EmptyCatalog);
    }
    let segments = analyzer::analyze_file(path, provider, &options.analyze)?;
    choreograph_segments(segments, store, &labels, options.sequencer, rng)
}
