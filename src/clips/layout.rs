//! Keypoint array shapes found in clip and pose files.
//!
//! A clip file is a JSON numeric array (or an object wrapping one). Its
//! nesting depth decides how it maps onto frames and joints; the mapping is
//! resolved once into a [`PoseLayout`] and every frame is read through it.

use serde_json::Value;
use thiserror::Error;

use crate::pose::{COCO_JOINT_COUNT, Joint, PoseFrame};

/// Frame rate assumed when a clip file does not carry one.
pub const DEFAULT_CLIP_FRAME_RATE: f64 = 30.0;

/// Joint count of the BODY_25 layout.
const BODY25_JOINT_COUNT: usize = 25;

/// Object keys that may hold the keypoint array.
const DATA_KEYS: [&str; 4] = ["keypoints", "poses", "joints", "landmarks"];

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Non-numeric value in keypoint array: {0}")]
    NonNumeric(String),
    #[error("Ragged keypoint array (rows of unequal shape)")]
    Ragged,
    #[error("Unsupported keypoint array shape {0:?}")]
    UnsupportedShape(Vec<usize>),
    #[error("No keypoint array found (expected one of keypoints, poses, joints, landmarks)")]
    MissingData,
    #[error("Invalid pose entry at index {index}: {reason}")]
    InvalidPose { index: usize, reason: String },
}

/// How a clip's numeric array maps onto frames of joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseLayout {
    /// Flat list of x,y pairs, `joints` per frame.
    FlatPairs { joints: usize },
    /// Flat list of x,y,z triplets, `joints` per frame.
    FlatTriplets { joints: usize },
    /// One frame: joints × components.
    SingleFrame { components: usize },
    /// frames × joints × components.
    Frames { components: usize },
    /// cameras × frames × joints × components; the first camera is read.
    MultiCamera { cameras: usize, components: usize },
}

impl PoseLayout {
    /// Resolve the layout for an array shape.
    pub fn detect(shape: &[usize]) -> Result<Self, LayoutError> {
        let unsupported = || LayoutError::UnsupportedShape(shape.to_vec());
        let checked = |components: usize| {
            if components >= 2 { Ok(components) } else { Err(unsupported()) }
        };

        match *shape {
            [len] if len > 0 && len % (COCO_JOINT_COUNT * 2) == 0 => {
                Ok(Self::FlatPairs { joints: COCO_JOINT_COUNT })
            }
            [len] if len > 0 && len % (BODY25_JOINT_COUNT * 2) == 0 => {
                Ok(Self::FlatPairs { joints: BODY25_JOINT_COUNT })
            }
            [len] if len > 0 && len % (COCO_JOINT_COUNT * 3) == 0 => {
                Ok(Self::FlatTriplets { joints: COCO_JOINT_COUNT })
            }
            [_, components] => Ok(Self::SingleFrame { components: checked(components)? }),
            [_, _, components] => Ok(Self::Frames { components: checked(components)? }),
            [cameras, _, _, components] if cameras > 0 => Ok(Self::MultiCamera {
                cameras,
                components: checked(components)?,
            }),
            _ => Err(unsupported()),
        }
    }

    /// Numbers per joint.
    fn stride(&self) -> usize {
        match *self {
            Self::FlatPairs { .. } => 2,
            Self::FlatTriplets { .. } => 3,
            Self::SingleFrame { components }
            | Self::Frames { components }
            | Self::MultiCamera { components, .. } => components,
        }
    }
}

/// Dense row-major numeric array with its shape. JSON `null` reads as NaN.
#[derive(Debug, Clone, PartialEq)]
struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Tensor {
    fn from_value(value: &Value) -> Result<Self, LayoutError> {
        match value {
            Value::Null => Ok(Self {
                shape: Vec::new(),
                data: vec![f64::NAN],
            }),
            Value::Number(n) => Ok(Self {
                shape: Vec::new(),
                data: vec![n.as_f64().unwrap_or(f64::NAN)],
            }),
            Value::Array(items) => {
                let mut shape: Option<Vec<usize>> = None;
                let mut data = Vec::new();
                for item in items {
                    let child = Self::from_value(item)?;
                    match &shape {
                        Some(s) if *s != child.shape => return Err(LayoutError::Ragged),
                        Some(_) => {}
                        None => shape = Some(child.shape.clone()),
                    }
                    data.extend(child.data);
                }
                let mut full = vec![items.len()];
                full.extend(shape.unwrap_or_default());
                Ok(Self { shape: full, data })
            }
            other => Err(LayoutError::NonNumeric(other.to_string())),
        }
    }
}

/// A parsed clip file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipData {
    pub layout: PoseLayout,
    pub frames: Vec<PoseFrame>,
    pub frame_rate: f64,
}

impl ClipData {
    /// Playback length in seconds; `None` for an empty clip.
    pub fn duration(&self) -> Option<f64> {
        if self.frames.is_empty() || !(self.frame_rate > 0.0) {
            return None;
        }
        Some(self.frames.len() as f64 / self.frame_rate)
    }
}

/// Components beyond the fourth are ignored.
fn joint_from_components(c: &[f64]) -> Joint {
    Joint {
        x: c[0],
        y: c[1],
        z: c.get(2).copied(),
        visibility: c.get(3).copied(),
    }
}

fn frames_from_tensor(tensor: &Tensor, layout: PoseLayout) -> Vec<PoseFrame> {
    let stride = layout.stride();
    let data: &[f64] = match (layout, tensor.shape.as_slice()) {
        // camera 0 is the leading block
        (PoseLayout::MultiCamera { .. }, [_, frames, joints, components]) => {
            &tensor.data[..frames * joints * components]
        }
        _ => &tensor.data,
    };

    let joints_per_frame = match (layout, tensor.shape.as_slice()) {
        (PoseLayout::FlatPairs { joints } | PoseLayout::FlatTriplets { joints }, _) => joints,
        (PoseLayout::SingleFrame { .. }, [joints, _]) => *joints,
        (_, [.., joints, _]) => *joints,
        _ => 0,
    };
    let frame_len = joints_per_frame * stride;
    if frame_len == 0 {
        return Vec::new();
    }

    data.chunks_exact(frame_len)
        .map(|frame| PoseFrame::from_joints(frame.chunks_exact(stride).map(joint_from_components)))
        .collect()
}

/// Parse a clip file. Accepts a bare numeric array or an object holding
/// the array under one of the [`DATA_KEYS`] with an optional `frame_rate`.
pub fn parse_clip(text: &str) -> Result<ClipData, LayoutError> {
    let value: Value = serde_json::from_str(text)?;

    let (array, frame_rate) = match &value {
        Value::Object(map) => {
            let array = DATA_KEYS
                .iter()
                .find_map(|key| map.get(*key))
                .ok_or(LayoutError::MissingData)?;
            let frame_rate = map
                .get("frame_rate")
                .or_else(|| map.get("fps"))
                .and_then(Value::as_f64)
                .filter(|fr| fr.is_finite() && *fr > 0.0)
                .unwrap_or(DEFAULT_CLIP_FRAME_RATE);
            (array, frame_rate)
        }
        array @ Value::Array(_) => (array, DEFAULT_CLIP_FRAME_RATE),
        _ => return Err(LayoutError::MissingData),
    };

    let tensor = Tensor::from_value(array)?;
    let layout = PoseLayout::detect(&tensor.shape)?;
    let frames = frames_from_tensor(&tensor, layout);

    log::trace!(
        "Clip layout {:?}: {} frames at {} fps",
        layout,
        frames.len(),
        frame_rate
    );
    Ok(ClipData {
        layout,
        frames,
        frame_rate,
    })
}

fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Null => None,
        v => v.as_f64(),
    }
}

fn row_joint(row: &Value, index: usize) -> Result<Option<Joint>, LayoutError> {
    match row {
        Value::Array(components) => {
            if components.len() < 2 {
                return Err(LayoutError::InvalidPose {
                    index,
                    reason: format!("joint row has {} components", components.len()),
                });
            }
            let (Some(x), Some(y)) = (coordinate(&components[0]), coordinate(&components[1])) else {
                return Ok(None);
            };
            Ok(Some(Joint {
                x,
                y,
                z: components.get(2).and_then(coordinate),
                visibility: components.get(3).and_then(coordinate),
            }))
        }
        Value::Object(_) => serde_json::from_value::<Joint>(row.clone())
            .map(Some)
            .map_err(|e| LayoutError::InvalidPose { index, reason: e.to_string() }),
        Value::Null => Ok(None),
        other => Err(LayoutError::InvalidPose {
            index,
            reason: format!("unexpected joint value {other}"),
        }),
    }
}

/// One live or reference pose: a list of joint rows (`[x, y, z?, vis?]` or
/// `{x, y, ...}` objects) or a flat `[x0, y0, x1, y1, ...]` list. An odd
/// trailing coordinate is paired with 0.
pub fn parse_pose(
    value: &Value,
    index: usize,
    zero_is_missing: bool,
) -> Result<PoseFrame, LayoutError> {
    let Value::Array(items) = value else {
        return Err(LayoutError::InvalidPose {
            index,
            reason: "pose is not an array".to_string(),
        });
    };

    let flat = items.iter().all(|v| v.is_number() || v.is_null());
    let mut joints: Vec<Option<Joint>> = if flat && !items.is_empty() {
        items
            .chunks(2)
            .map(|pair| {
                let x = coordinate(&pair[0]);
                let y = pair.get(1).map_or(Some(0.0), coordinate);
                x.zip(y).map(|(x, y)| Joint::new(x, y))
            })
            .collect()
    } else {
        items
            .iter()
            .map(|row| row_joint(row, index))
            .collect::<Result<_, _>>()?
    };

    if zero_is_missing {
        for slot in joints.iter_mut() {
            if slot.is_some_and(|j| j.x == 0.0 && j.y == 0.0) {
                *slot = None;
            }
        }
    }

    Ok(PoseFrame::new(joints))
}

/// A JSON list of poses, or an object holding one under a data key.
pub fn parse_pose_sequence(
    text: &str,
    zero_is_missing: bool,
) -> Result<Vec<PoseFrame>, LayoutError> {
    let value: Value = serde_json::from_str(text)?;
    let poses = match &value {
        Value::Array(poses) => poses,
        Value::Object(map) => DATA_KEYS
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(Value::as_array)
            .ok_or(LayoutError::MissingData)?,
        _ => return Err(LayoutError::MissingData),
    };

    poses
        .iter()
        .enumerate()
        .map(|(i, pose)| parse_pose(pose, i, zero_is_missing))
        .collect()
}
