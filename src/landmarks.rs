// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Landmark types and per-frame joint extraction.
//!
//! A detector reports up to three landmark groups per frame: left hand, right hand and the
//! full-body pose. [`extract`] flattens them into a fixed [`JointFrame`] with the row layout
//! the classifier was trained on:
//!
//! | Rows    | Source                                   |
//! |---------|------------------------------------------|
//! | 0..21   | left hand, detector-native order         |
//! | 21..42  | right hand, detector-native order        |
//! | 42..47  | selected pose joints, [`PoseJointIndexSet`] order |
//!
//! Missing groups leave their rows at `(0, 0, 0)`.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, Result};

/// Landmarks per hand.
pub const HAND_LANDMARKS: usize = 21;

/// First row of the left hand block.
pub const LEFT_HAND_OFFSET: usize = 0;

/// First row of the right hand block.
pub const RIGHT_HAND_OFFSET: usize = LEFT_HAND_OFFSET + HAND_LANDMARKS;

/// First row of the pose block.
pub const POSE_OFFSET: usize = RIGHT_HAND_OFFSET + HAND_LANDMARKS;

/// Number of pose joints kept per frame.
pub const POSE_JOINTS: usize = 5;

/// Rows in a [`JointFrame`].
pub const NUM_JOINTS: usize = POSE_OFFSET + POSE_JOINTS;

/// Coordinates per joint (x, y, z).
pub const NUM_COORDS: usize = 3;

/// Pose landmarks retained by default: nose, shoulders, elbows.
pub const DEFAULT_POSE_INDICES: [usize; POSE_JOINTS] = [0, 11, 12, 13, 14];

/// A single detected keypoint.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Landmark {
    /// Normalized horizontal position.
    pub x: f32,
    /// Normalized vertical position.
    pub y: f32,
    /// Relative depth.
    pub z: f32,
}

impl Landmark {
    /// Create a landmark.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Coordinates as an array.
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Landmark {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Landmark> for [f32; 3] {
    fn from(lm: Landmark) -> Self {
        lm.to_array()
    }
}

/// One detected landmark group (a hand or the body pose).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkGroup {
    /// Landmarks in detector-native order.
    pub points: Vec<Landmark>,
    /// Detection confidence, when the detector reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl LandmarkGroup {
    /// Create a group without a confidence score.
    #[must_use]
    pub const fn new(points: Vec<Landmark>) -> Self {
        Self {
            points,
            score: None,
        }
    }

    /// Attach a confidence score.
    #[must_use]
    pub const fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    /// Number of landmarks in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the group holds no landmarks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Output of the landmark detector for one frame. Any group may be absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawDetectionFrame {
    /// Left hand landmarks.
    #[serde(default)]
    pub left_hand: Option<LandmarkGroup>,
    /// Right hand landmarks.
    #[serde(default)]
    pub right_hand: Option<LandmarkGroup>,
    /// Full-body pose landmarks.
    #[serde(default)]
    pub pose: Option<LandmarkGroup>,
}

impl RawDetectionFrame {
    /// A frame in which the detector saw nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            left_hand: None,
            right_hand: None,
            pose: None,
        }
    }

    /// Whether no group was detected.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.left_hand.is_none() && self.right_hand.is_none() && self.pose.is_none()
    }
}

/// Ordered pose landmark indices kept in rows 42..47.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoseJointIndexSet([usize; POSE_JOINTS]);

impl PoseJointIndexSet {
    /// Build the set from a slice, which must hold exactly [`POSE_JOINTS`] indices.
    ///
    /// # Errors
    ///
    /// Returns a config error if the length is wrong.
    pub fn new(indices: &[usize]) -> Result<Self> {
        let indices: [usize; POSE_JOINTS] = indices.try_into().map_err(|_| {
            InferenceError::ConfigError(format!(
                "Expected {POSE_JOINTS} pose indices, got {}",
                indices.len()
            ))
        })?;
        Ok(Self(indices))
    }

    /// Indices in output-row order.
    #[must_use]
    pub const fn indices(&self) -> &[usize; POSE_JOINTS] {
        &self.0
    }

    /// Minimum pose landmark count the detector must report.
    #[must_use]
    pub fn required_landmarks(&self) -> usize {
        self.0.iter().max().map_or(0, |&m| m + 1)
    }
}

impl Default for PoseJointIndexSet {
    fn default() -> Self {
        Self(DEFAULT_POSE_INDICES)
    }
}

/// Fixed-size per-frame joint coordinates, shape `(NUM_JOINTS, 3)`.
#[derive(Debug, Clone, PartialEq)]
pub struct JointFrame(Array2<f32>);

impl JointFrame {
    /// All-zero frame.
    #[must_use]
    pub fn zeros() -> Self {
        Self(Array2::zeros((NUM_JOINTS, NUM_COORDS)))
    }

    /// View of the `(joints, coords)` array.
    #[must_use]
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.0.view()
    }

    /// Coordinates of one row.
    ///
    /// # Panics
    ///
    /// Panics if `joint >= NUM_JOINTS`.
    #[must_use]
    pub fn joint(&self, joint: usize) -> [f32; 3] {
        let row = self.0.row(joint);
        [row[0], row[1], row[2]]
    }

    /// Whether the row is exactly `(0, 0, 0)`.
    #[must_use]
    pub fn is_zero_row(&self, joint: usize) -> bool {
        self.0.row(joint).iter().all(|&v| v == 0.0)
    }

    fn set(&mut self, joint: usize, lm: Landmark) {
        let mut row = self.0.row_mut(joint);
        row[0] = lm.x;
        row[1] = lm.y;
        row[2] = lm.z;
    }

    /// Consume into the underlying array.
    #[must_use]
    pub fn into_inner(self) -> Array2<f32> {
        self.0
    }
}

/// Flatten one frame's detections into a [`JointFrame`].
///
/// Hands contribute at most [`HAND_LANDMARKS`] rows each; surplus landmarks are ignored.
///
/// # Errors
///
/// Returns a landmark error if a pose group is present but too short for `pose_indices`.
pub fn extract(detection: &RawDetectionFrame, pose_indices: &PoseJointIndexSet) -> Result<JointFrame> {
    let mut frame = JointFrame::zeros();

    if let Some(hand) = &detection.left_hand {
        for (i, lm) in hand.points.iter().take(HAND_LANDMARKS).enumerate() {
            frame.set(LEFT_HAND_OFFSET + i, *lm);
        }
    }

    if let Some(hand) = &detection.right_hand {
        for (i, lm) in hand.points.iter().take(HAND_LANDMARKS).enumerate() {
            frame.set(RIGHT_HAND_OFFSET + i, *lm);
        }
    }

    if let Some(pose) = &detection.pose {
        for (i, &pose_index) in pose_indices.indices().iter().enumerate() {
            let lm = pose.points.get(pose_index).ok_or_else(|| {
                InferenceError::LandmarkError(format!(
                    "Pose landmark {pose_index} requested but detector reported {}",
                    pose.len()
                ))
            })?;
            frame.set(POSE_OFFSET + i, *lm);
        }
    }

    Ok(frame)
}
