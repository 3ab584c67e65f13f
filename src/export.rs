//! JSON export of choreography frames.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::analyzer::intensity::Intensity;
use crate::choreography::{Choreography, ChoreographyFrame};
use crate::pose::PoseFrame;

/// A joint as written to disk. Missing slots are written as zeros with
/// visibility 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JointRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub visibility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRecord {
    pub frame_number: usize,
    pub time: f64,
    pub clip_id: Option<String>,
    pub clip_frame_index: usize,
    pub intensity: Intensity,
    pub pose: Option<Vec<JointRecord>>,
}

/// JSON has no NaN; corrupt coordinates that survive to export become 0.
fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

pub fn pose_record(pose: &PoseFrame) -> Vec<JointRecord> {
    pose.joints()
        .iter()
        .map(|slot| match slot {
            Some(j) => JointRecord {
                x: finite_or(j.x, 0.0),
                y: finite_or(j.y, 0.0),
                z: finite_or(j.z.unwrap_or(0.0), 0.0),
                visibility: finite_or(j.visibility.unwrap_or(1.0), 0.0),
            },
            None => JointRecord {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                visibility: 0.0,
            },
        })
        .collect()
}

pub fn to_records(frames: &[ChoreographyFrame]) -> Vec<FrameRecord> {
    frames
        .iter()
        .map(|f| FrameRecord {
            frame_number: f.frame_number,
            time: f.time,
            clip_id: f.clip_id.clone(),
            clip_frame_index: f.clip_frame_index,
            intensity: f.intensity,
            pose: f.pose.as_ref().map(pose_record),
        })
        .collect()
}

pub fn to_json(frames: &[ChoreographyFrame]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&to_records(frames))
}

/// Headline numbers for a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoreographySummary {
    pub total_frames: usize,
    pub duration_secs: f64,
    pub unique_clips: usize,
    pub segments_by_intensity: [usize; 3],
}

pub fn summarize(choreography: &Choreography) -> ChoreographySummary {
    let unique: BTreeSet<&str> = choreography
        .frames
        .iter()
        .filter_map(|f| f.clip_id.as_deref())
        .collect();

    let mut segments_by_intensity = [0; 3];
    for segment in &choreography.segments {
        if let Some(slot) = Intensity::ALL.iter().position(|i| *i == segment.intensity) {
            segments_by_intensity[slot] += 1;
        }
    }

    ChoreographySummary {
        total_frames: choreography.frames.len(),
        duration_secs: choreography.segments.last().map_or(0.0, |s| s.end_time),
        unique_clips: unique.len(),
        segments_by_intensity,
    }
}
