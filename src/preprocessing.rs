// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Clip preprocessing.
//!
//! Turns a decoded clip into the fixed `(3, T, 47)` joint tensor the network expects:
//! pick `T` frames spread evenly over the clip, run the landmark detector on each, flatten the
//! detections into joint rows and reorder the stacked result to channel-major layout.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use candle_core::Tensor;
use ndarray::{Array3, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::detector::SharedDetector;
use crate::error::{InferenceError, Result};
use crate::inference::InferenceConfig;
use crate::landmarks::{JointFrame, NUM_COORDS, extract};
use crate::source::Frame;

// ================================================================================================
// Temporal Sampling
// ================================================================================================

/// How fractional sample positions become frame indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexRounding {
    /// Round to the nearest index, halves away from zero.
    #[default]
    Nearest,
    /// Round to the nearest index, halves to even.
    HalfEven,
    /// Truncate toward zero.
    Floor,
}

impl IndexRounding {
    fn apply(self, v: f64) -> f64 {
        match self {
            Self::Nearest => v.round(),
            Self::HalfEven => bankers_round(v),
            Self::Floor => v.floor(),
        }
    }
}

/// Round half to even.
fn bankers_round(v: f64) -> f64 {
    let n = v.floor();
    let d = v - n;
    if (d - 0.5).abs() < 1e-9 {
        if n % 2.0 == 0.0 { n } else { n + 1.0 }
    } else {
        v.round()
    }
}

/// Choose `target_length` frame indices evenly spaced over `[0, total_frames - 1]`.
///
/// The result is non-decreasing and repeats indices when the clip is shorter than the target.
///
/// # Errors
///
/// Returns [`InferenceError::EmptyInput`] when `total_frames` is zero and a config error when
/// `target_length` is zero.
pub fn sample_indices(
    total_frames: usize,
    target_length: usize,
    rounding: IndexRounding,
) -> Result<Vec<usize>> {
    if total_frames == 0 {
        return Err(InferenceError::EmptyInput(
            "No frames decoded from the source".to_string(),
        ));
    }
    if target_length == 0 {
        return Err(InferenceError::ConfigError(
            "Sequence length must be at least 1".to_string(),
        ));
    }
    if target_length == 1 {
        return Ok(vec![0]);
    }

    let last = total_frames - 1;
    let span = (target_length - 1) as f64;
    Ok((0..target_length)
        .map(|i| {
            let pos = (i * last) as f64 / span;
            (rounding.apply(pos) as usize).min(last)
        })
        .collect())
}

// ================================================================================================
// Joint Sequence
// ================================================================================================

/// Channel-major joint tensor of one clip, shape `(3, T, J)`.
#[derive(Debug, Clone, PartialEq)]
pub struct JointSequence(Array3<f32>);

impl JointSequence {
    /// Stack per-frame joints in time order and move the coordinate axis first.
    ///
    /// # Errors
    ///
    /// Returns a shape error if `frames` is empty.
    pub fn from_frames(frames: &[JointFrame]) -> Result<Self> {
        let views: Vec<ArrayView2<'_, f32>> = frames.iter().map(JointFrame::view).collect();
        let time_major = ndarray::stack(Axis(0), &views)?;
        let channel_major = time_major.permuted_axes([2, 0, 1]);
        Ok(Self(channel_major.as_standard_layout().into_owned()))
    }

    /// Wrap an existing `(3, T, J)` array.
    ///
    /// # Errors
    ///
    /// Returns a shape error if the first axis is not the coordinate axis.
    pub fn from_array(array: Array3<f32>) -> Result<Self> {
        if array.dim().0 != NUM_COORDS {
            return Err(InferenceError::ShapeError(format!(
                "Expected {NUM_COORDS} channels, got shape {:?}",
                array.dim()
            )));
        }
        Ok(Self(array))
    }

    /// `(channels, time, joints)`.
    #[must_use]
    pub fn dim(&self) -> (usize, usize, usize) {
        self.0.dim()
    }

    /// Number of time steps.
    #[must_use]
    pub fn sequence_length(&self) -> usize {
        self.0.dim().1
    }

    /// Borrow the array.
    #[must_use]
    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.0.view()
    }

    /// Consume into the array.
    #[must_use]
    pub fn into_inner(self) -> Array3<f32> {
        self.0
    }

    /// Batch-of-one tensor of shape `(1, 3, T, J)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tensor cannot be allocated on `device`.
    pub fn to_tensor(&self, device: &candle_core::Device) -> Result<Tensor> {
        let (c, t, j) = self.0.dim();
        let data: Vec<f32> = self.0.iter().copied().collect();
        Ok(Tensor::from_vec(data, (1, c, t, j), device)?)
    }
}

// ================================================================================================
// Assembly
// ================================================================================================

/// Build the joint sequence of a decoded clip.
///
/// The detector is held exclusively for the whole clip and reset before the first frame.
///
/// # Errors
///
/// Fails on an empty clip, a missing detector, a detector failure or malformed landmarks.
pub fn assemble(
    frames: &[Frame],
    detector: Option<&SharedDetector>,
    config: &InferenceConfig,
) -> Result<JointSequence> {
    let indices = sample_indices(frames.len(), config.sequence_length, config.rounding)?;
    let detector = detector.ok_or_else(|| {
        InferenceError::DetectorUnavailable("Landmark detector not initialized".to_string())
    })?;
    let pose_indices = config.pose_joint_indices()?;

    let mut guard = detector.lock();
    guard.reset();
    let color_space = guard.color_space();

    let mut joints = Vec::with_capacity(indices.len());
    for index in indices {
        let frame = frames[index].to_color_space(color_space);
        let detection = guard.detect(&frame)?;
        joints.push(extract(&detection, &pose_indices)?);
    }
    drop(guard);

    JointSequence::from_frames(&joints)
}
