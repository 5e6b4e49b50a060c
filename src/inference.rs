// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Inference configuration.
//!
//! This module defines the [`InferenceConfig`] struct: the startup-time configuration surface of
//! the classifier (joint layout, sequence length, checkpoint path, detector thresholds, the
//! trusted class subset and its external labels, and hardware options). Defaults reproduce the
//! trained model's configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detector::DetectorThresholds;
use crate::device::Device;
use crate::error::{InferenceError, Result};
use crate::landmarks::{DEFAULT_POSE_INDICES, NUM_JOINTS, PoseJointIndexSet};
use crate::postprocessing::{AllowedClassSet, LabelMap, MaskedDecoder};
use crate::preprocessing::IndexRounding;

/// Default checkpoint location.
pub const DEFAULT_MODEL_PATH: &str = "models/best_model.pt";

/// Frames per clip fed to the network.
pub const DEFAULT_SEQUENCE_LENGTH: usize = 32;

/// Classifier output width.
pub const DEFAULT_NUM_CLASSES: usize = 67;

/// Internal classes the trained model is trusted on.
pub const DEFAULT_ALLOWED_CLASSES: [usize; 31] = [
    0, 2, 4, 6, 9, 10, 12, 13, 14, 18, 20, 21, 24, 25, 33, 37, 40, 41, 42, 45, 46, 47, 48, 49, 51,
    53, 55, 58, 62, 63, 64,
];

/// Internal index to external semantic ID for the trusted classes.
pub const DEFAULT_LABEL_MAP: [(usize, u32); 31] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (9, 10),
    (10, 11),
    (12, 14),
    (13, 15),
    (14, 16),
    (18, 21),
    (20, 23),
    (21, 24),
    (24, 27),
    (25, 29),
    (33, 39),
    (37, 43),
    (40, 48),
    (41, 49),
    (42, 50),
    (45, 54),
    (46, 55),
    (47, 56),
    (48, 57),
    (49, 58),
    (51, 60),
    (53, 62),
    (55, 64),
    (58, 67),
    (62, 71),
    (63, 72),
    (64, 74),
];

/// Configuration for sign classification.
///
/// This struct is used to customize the behavior of the inference engine.
/// It uses a builder pattern for convenient construction and can be loaded from TOML.
///
/// # Example
///
/// ```rust
/// use sign_inference::{Device, InferenceConfig};
///
/// let config = InferenceConfig::new()
///     .with_model_path("models/best_model.safetensors")
///     .with_sequence_length(32)
///     .with_device(Device::Cpu);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Rows per joint frame. Must match the landmark layout (42 hand rows plus the pose rows).
    pub num_joints: usize,
    /// Frames sampled from each clip.
    pub sequence_length: usize,
    /// Pose landmark indices kept, in output-row order.
    pub pose_indices: Vec<usize>,
    /// Checkpoint to load at startup.
    pub model_path: PathBuf,
    /// Number of classifier outputs.
    pub num_classes: usize,
    /// Internal classes the decoder may return.
    pub allowed_classes: AllowedClassSet,
    /// External labels of internal classes, as `[internal, external]` pairs.
    pub label_map: LabelMap,
    /// Device the network runs on.
    pub device: Device,
    /// Rounding of sampled frame positions.
    pub rounding: IndexRounding,
    /// Landmark detector confidence thresholds.
    pub detector: DetectorThresholds,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            num_joints: NUM_JOINTS,
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            pose_indices: DEFAULT_POSE_INDICES.to_vec(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            num_classes: DEFAULT_NUM_CLASSES,
            allowed_classes: AllowedClassSet::new(DEFAULT_ALLOWED_CLASSES),
            label_map: default_label_map(),
            device: Device::Cpu,
            rounding: IndexRounding::Nearest,
            detector: DetectorThresholds::default(),
        }
    }
}

fn default_label_map() -> LabelMap {
    // The default table has unique keys, so the fallback is unreachable.
    LabelMap::from_pairs(DEFAULT_LABEL_MAP).unwrap_or_default()
}

impl InferenceConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a TOML file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a config error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let contents = std::fs::read_to_string(path).map_err(|e| {
            InferenceError::ConfigError(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))
        })?;

        toml::from_str(&contents).map_err(|e| {
            InferenceError::ConfigError(format!(
                "Failed to parse TOML in '{}': {e}",
                path.display()
            ))
        })
    }

    /// Parse a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a config error on malformed TOML or invalid values.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Ok(toml::from_str(toml)?)
    }

    /// Serialize the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns a config error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| InferenceError::ConfigError(format!("Failed to serialize to TOML: {e}")))
    }

    /// Validate all configuration values.
    ///
    /// # Errors
    ///
    /// Returns a config error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.num_joints != NUM_JOINTS {
            return Err(InferenceError::ConfigError(format!(
                "num_joints must be {NUM_JOINTS}, got {}",
                self.num_joints
            )));
        }
        self.pose_joint_indices()?;
        if self.sequence_length == 0 {
            return Err(InferenceError::ConfigError(
                "sequence_length must be at least 1".to_string(),
            ));
        }
        if self.num_classes == 0 {
            return Err(InferenceError::ConfigError(
                "num_classes must be at least 1".to_string(),
            ));
        }
        self.detector.validate()?;
        self.allowed_classes.validate(self.num_classes)?;
        self.label_map.validate(self.num_classes)?;
        Ok(())
    }

    /// The pose indices as a fixed-size set.
    ///
    /// # Errors
    ///
    /// Returns a config error if the wrong number of indices is configured.
    pub fn pose_joint_indices(&self) -> Result<PoseJointIndexSet> {
        PoseJointIndexSet::new(&self.pose_indices)
    }

    /// Build the masked decoder for this configuration.
    #[must_use]
    pub fn decoder(&self) -> MaskedDecoder {
        MaskedDecoder::new(
            self.allowed_classes.clone(),
            self.label_map.clone(),
            self.num_classes,
        )
    }

    /// Set the checkpoint path.
    #[must_use]
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Set the number of sampled frames per clip.
    #[must_use]
    pub const fn with_sequence_length(mut self, length: usize) -> Self {
        self.sequence_length = length;
        self
    }

    /// Set the pose landmark indices.
    #[must_use]
    pub fn with_pose_indices(mut self, indices: Vec<usize>) -> Self {
        self.pose_indices = indices;
        self
    }

    /// Set the number of classifier outputs.
    #[must_use]
    pub const fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    /// Set the trusted class subset.
    #[must_use]
    pub fn with_allowed_classes(mut self, allowed: AllowedClassSet) -> Self {
        self.allowed_classes = allowed;
        self
    }

    /// Set the external label map.
    #[must_use]
    pub fn with_label_map(mut self, labels: LabelMap) -> Self {
        self.label_map = labels;
        self
    }

    /// Set the detector thresholds.
    #[must_use]
    pub const fn with_thresholds(mut self, detection: f32, tracking: f32) -> Self {
        self.detector = DetectorThresholds {
            min_detection_confidence: detection,
            min_tracking_confidence: tracking,
        };
        self
    }

    /// Set the device.
    #[must_use]
    pub const fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Set the frame index rounding policy.
    #[must_use]
    pub const fn with_rounding(mut self, rounding: IndexRounding) -> Self {
        self.rounding = rounding;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = InferenceConfig::default();
        assert_eq!(config.num_joints, 47);
        assert_eq!(config.sequence_length, 32);
        assert_eq!(config.pose_indices, vec![0, 11, 12, 13, 14]);
        assert_eq!(config.num_classes, 67);
        assert_eq!(config.allowed_classes.len(), 31);
        assert_eq!(config.label_map.len(), 31);
        assert_eq!(config.label_map.get(64), Some(74));
        assert!((config.detector.min_detection_confidence - 0.5).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_every_allowed_class_is_labelled() {
        let config = InferenceConfig::default();
        for i in config.allowed_classes.iter() {
            assert!(config.label_map.get(i).is_some(), "class {i} unlabelled");
        }
    }

    #[test]
    fn test_config_builder() {
        let config = InferenceConfig::new()
            .with_model_path("weights.safetensors")
            .with_sequence_length(16)
            .with_thresholds(0.7, 0.3)
            .with_device(Device::Cuda(1))
            .with_rounding(IndexRounding::Floor);

        assert_eq!(config.model_path, PathBuf::from("weights.safetensors"));
        assert_eq!(config.sequence_length, 16);
        assert!((config.detector.min_tracking_confidence - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.device, Device::Cuda(1));
        assert_eq!(config.rounding, IndexRounding::Floor);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            InferenceConfig::new().with_sequence_length(0),
            InferenceConfig::new().with_pose_indices(vec![0, 11]),
            InferenceConfig::new().with_thresholds(-0.1, 0.5),
            InferenceConfig::new().with_num_classes(10),
            InferenceConfig {
                num_joints: 48,
                ..InferenceConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(InferenceError::ConfigError(_))));
        }
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = InferenceConfig::new().with_device(Device::Metal(0));
        let toml = config.to_toml_string().unwrap();
        assert!(toml.contains("label_map"));
        let parsed = InferenceConfig::from_toml_str(&toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = InferenceConfig::from_toml_str(
            r#"
            model_path = "ckpt/model.safetensors"
            allowed_classes = [1, 2]
            label_map = [[1, 100]]

            [detector]
            min_detection_confidence = 0.8
            "#,
        )
        .unwrap();
        assert_eq!(config.model_path, PathBuf::from("ckpt/model.safetensors"));
        assert_eq!(config.allowed_classes.len(), 2);
        assert_eq!(config.label_map.get(1), Some(100));
        assert!((config.detector.min_detection_confidence - 0.8).abs() < f32::EPSILON);
        assert!((config.detector.min_tracking_confidence - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.sequence_length, 32);
    }

    #[test]
    fn test_duplicate_label_key_rejected() {
        let err = InferenceConfig::from_toml_str("label_map = [[1, 2], [1, 3]]").unwrap_err();
        assert!(matches!(err, InferenceError::ConfigError(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sequence_length = 8\ndevice = \"cpu\"").unwrap();
        let config = InferenceConfig::from_file(file.path()).unwrap();
        assert_eq!(config.sequence_length, 8);

        assert!(InferenceConfig::from_file("/nonexistent/config.toml").is_err());
    }
}
