// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Prediction results and their external JSON form.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{InferenceError, Result};

/// Timing information for one prediction (in milliseconds).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Speed {
    /// Time spent decoding frames and assembling the joint sequence.
    pub preprocess: Option<f64>,
    /// Time spent in the network forward pass.
    pub inference: Option<f64>,
    /// Time spent decoding the logits.
    pub postprocess: Option<f64>,
}

impl Speed {
    /// Create a new Speed instance with all timings.
    ///
    /// # Arguments
    ///
    /// * `preprocess` - Time in milliseconds.
    /// * `inference` - Time in milliseconds.
    /// * `postprocess` - Time in milliseconds.
    ///
    /// # Returns
    ///
    /// * A new `Speed` instance.
    #[must_use]
    pub const fn new(preprocess: f64, inference: f64, postprocess: f64) -> Self {
        Self {
            preprocess: Some(preprocess),
            inference: Some(inference),
            postprocess: Some(postprocess),
        }
    }

    /// Get total inference time.
    ///
    /// # Returns
    ///
    /// * Sum of preprocess, inference, and postprocess times in milliseconds.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preprocess.unwrap_or(0.0)
            + self.inference.unwrap_or(0.0)
            + self.postprocess.unwrap_or(0.0)
    }
}

/// The `predicted_class` field of a result.
///
/// Semantic labels serialize as integers, everything else as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredictedClass {
    /// External semantic class ID.
    Semantic(u32),
    /// Decoded internal index has no entry in the label map.
    Unknown,
    /// Failure caused by the model being unavailable.
    ModelError,
    /// Any other failure.
    Error,
}

impl PredictedClass {
    /// Failure category for an error.
    #[must_use]
    pub const fn for_error(err: &InferenceError) -> Self {
        if err.is_model_error() {
            Self::ModelError
        } else {
            Self::Error
        }
    }

    /// The semantic ID, if this is one.
    #[must_use]
    pub const fn semantic_id(self) -> Option<u32> {
        match self {
            Self::Semantic(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for PredictedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semantic(id) => write!(f, "{id}"),
            Self::Unknown => write!(f, "unknown"),
            Self::ModelError => write!(f, "Model Error"),
            Self::Error => write!(f, "Error"),
        }
    }
}

impl Serialize for PredictedClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Semantic(id) => serializer.serialize_u32(*id),
            other => serializer.collect_str(other),
        }
    }
}

/// A successfully decoded class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Internal class index chosen by masked argmax.
    pub class_id: usize,
    /// External label for `class_id`.
    pub label: PredictedClass,
    /// Raw logit of the chosen class.
    pub logit: f32,
}

/// Uniform outcome of one `predict` call.
///
/// Serializes as `{success, predicted_class, class_id, error?}`; failures carry
/// `class_id = -1` and a diagnostic `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Whether a class was produced.
    pub success: bool,
    /// Semantic label on success, failure category otherwise.
    pub predicted_class: PredictedClass,
    /// Internal class index; `None` serializes as `-1`.
    #[serde(serialize_with = "serialize_class_id")]
    pub class_id: Option<usize>,
    /// Human-readable diagnostic, present only on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-stage timings.
    #[serde(skip)]
    pub speed: Speed,
}

impl PredictionResult {
    /// Successful result for a decoded prediction.
    #[must_use]
    pub const fn from_prediction(prediction: &Prediction, speed: Speed) -> Self {
        Self {
            success: true,
            predicted_class: prediction.label,
            class_id: Some(prediction.class_id),
            error: None,
            speed,
        }
    }

    /// Failure result for an error.
    ///
    /// Model unavailability reports its own message; every other failure is prefixed with
    /// the error kind.
    #[must_use]
    pub fn from_error(err: &InferenceError) -> Self {
        let predicted_class = PredictedClass::for_error(err);
        let error = match predicted_class {
            PredictedClass::ModelError => err.to_string(),
            _ => format!("Prediction failed during processing: {} - {err}", err.kind()),
        };
        Self {
            success: false,
            predicted_class,
            class_id: None,
            error: Some(error),
            speed: Speed::default(),
        }
    }

    /// Attach timing information.
    #[must_use]
    pub const fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    /// Serialize to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| InferenceError::IoError(format!("Failed to serialize result: {e}")))
    }
}

impl From<Result<Prediction>> for PredictionResult {
    fn from(result: Result<Prediction>) -> Self {
        match result {
            Ok(prediction) => Self::from_prediction(&prediction, Speed::default()),
            Err(err) => Self::from_error(&err),
        }
    }
}

#[allow(clippy::ref_option)]
fn serialize_class_id<S: Serializer>(
    class_id: &Option<usize>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match class_id {
        Some(id) => serializer.serialize_u64(*id as u64),
        None => serializer.serialize_i64(-1),
    }
}
