// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Landmark detector capability.
//!
//! The detector itself is an external collaborator; this module defines the seam it plugs into.
//! Detectors may keep tracking state between calls, so a shared instance is only ever reached
//! through [`SharedDetector`], which hands out one exclusive guard per clip.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, Result};
use crate::landmarks::{LandmarkGroup, RawDetectionFrame};
use crate::source::Frame;

/// Channel order of a frame's pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// Red, green, blue.
    #[default]
    Rgb,
    /// Blue, green, red (OpenCV-style decoders).
    Bgr,
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgb => write!(f, "rgb"),
            Self::Bgr => write!(f, "bgr"),
        }
    }
}

/// Detector confidence thresholds, both in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorThresholds {
    /// Minimum score for a group found from scratch.
    pub min_detection_confidence: f32,
    /// Minimum score for a group that was present in the previous frame.
    pub min_tracking_confidence: f32,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

impl DetectorThresholds {
    /// Check both thresholds lie in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns a config error naming the offending threshold.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(InferenceError::ConfigError(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// A per-frame landmark detector.
pub trait LandmarkDetector: Send {
    /// Detect hand and pose landmarks in one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if detection itself fails; an empty scene is not an error.
    fn detect(&mut self, frame: &Frame) -> Result<RawDetectionFrame>;

    /// Channel order the detector expects its input in.
    fn color_space(&self) -> ColorSpace {
        ColorSpace::Rgb
    }

    /// Drop any tracking state carried over from previous frames.
    fn reset(&mut self) {}

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// A detector instance behind a mutual-exclusion gate.
pub struct SharedDetector {
    inner: Mutex<Box<dyn LandmarkDetector>>,
}

impl SharedDetector {
    /// Wrap a detector.
    pub fn new<D: LandmarkDetector + 'static>(detector: D) -> Self {
        Self::from_boxed(Box::new(detector))
    }

    /// Wrap an already boxed detector.
    #[must_use]
    pub fn from_boxed(detector: Box<dyn LandmarkDetector>) -> Self {
        Self {
            inner: Mutex::new(detector),
        }
    }

    /// Acquire exclusive access. Blocks while another clip is being processed.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn LandmarkDetector>> {
        self.inner.lock()
    }

    /// Name of the wrapped detector.
    pub fn name(&self) -> String {
        self.inner.lock().name().to_string()
    }
}

impl fmt::Debug for SharedDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .inner
            .try_lock()
            .map_or_else(|| "<busy>".to_string(), |guard| guard.name().to_string());
        f.debug_struct("SharedDetector")
            .field("name", &name)
            .finish()
    }
}

/// One recorded frame in a landmark dump.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct ReplayRecord {
    frame: usize,
    #[serde(flatten)]
    detection: RawDetectionFrame,
}

/// Replays landmark results recorded offline, keyed by decoded frame index.
///
/// Groups carrying a score are filtered like a live tracker would: a group seen in the previous
/// replayed frame must clear `min_tracking_confidence`, a new one `min_detection_confidence`.
#[derive(Debug, Clone)]
pub struct ReplayDetector {
    records: HashMap<usize, RawDetectionFrame>,
    thresholds: DetectorThresholds,
    color_space: ColorSpace,
    /// Whether left hand, right hand and pose were kept in the previous frame.
    tracked: [bool; 3],
}

impl ReplayDetector {
    /// Build from in-memory records.
    #[must_use]
    pub fn new(
        records: impl IntoIterator<Item = (usize, RawDetectionFrame)>,
        thresholds: DetectorThresholds,
    ) -> Self {
        Self {
            records: records.into_iter().collect(),
            thresholds,
            color_space: ColorSpace::Rgb,
            tracked: [false; 3],
        }
    }

    /// Load a JSON dump: a list of `{frame, left_hand?, right_hand?, pose?}` records.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or repeats a frame index.
    pub fn from_file<P: AsRef<Path>>(path: P, thresholds: DetectorThresholds) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            InferenceError::DetectorUnavailable(format!(
                "Failed to read landmark file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&contents, thresholds)
    }

    /// Parse a JSON dump from a string.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or duplicated frame indices.
    pub fn from_json_str(json: &str, thresholds: DetectorThresholds) -> Result<Self> {
        let records: Vec<ReplayRecord> = serde_json::from_str(json)?;
        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            if map.insert(record.frame, record.detection).is_some() {
                return Err(InferenceError::LandmarkError(format!(
                    "Frame {} recorded more than once",
                    record.frame
                )));
            }
        }
        Ok(Self {
            records: map,
            thresholds,
            color_space: ColorSpace::Rgb,
            tracked: [false; 3],
        })
    }

    /// Declare the channel order the recording was made from.
    #[must_use]
    pub const fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    /// Number of recorded frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dump holds no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn filter(&mut self, slot: usize, group: Option<&LandmarkGroup>) -> Option<LandmarkGroup> {
        let threshold = if self.tracked[slot] {
            self.thresholds.min_tracking_confidence
        } else {
            self.thresholds.min_detection_confidence
        };
        let kept = group
            .filter(|g| g.score.is_none_or(|s| s >= threshold))
            .cloned();
        if group.is_some() && kept.is_none() {
            tracing::warn!(slot, threshold, "dropping low-confidence landmark group");
        }
        self.tracked[slot] = kept.is_some();
        kept
    }
}

impl LandmarkDetector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Result<RawDetectionFrame> {
        let record = self.records.get(&frame.index).cloned().unwrap_or_default();
        Ok(RawDetectionFrame {
            left_hand: self.filter(0, record.left_hand.as_ref()),
            right_hand: self.filter(1, record.right_hand.as_ref()),
            pose: self.filter(2, record.pose.as_ref()),
        })
    }

    fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    fn reset(&mut self) {
        self.tracked = [false; 3];
    }

    fn name(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Landmark;
    use image::RgbImage;

    fn frame(index: usize) -> Frame {
        Frame::new(index, RgbImage::new(2, 2))
    }

    fn scored(score: f32) -> LandmarkGroup {
        LandmarkGroup::new(vec![Landmark::new(0.5, 0.5, 0.0); 21]).with_score(score)
    }

    #[test]
    fn test_thresholds_validate() {
        assert!(DetectorThresholds::default().validate().is_ok());
        let bad = DetectorThresholds {
            min_detection_confidence: 1.5,
            ..DetectorThresholds::default()
        };
        assert!(matches!(bad.validate(), Err(InferenceError::ConfigError(_))));
    }

    #[test]
    fn test_replay_missing_frame_is_empty() {
        let mut detector = ReplayDetector::new(std::iter::empty(), DetectorThresholds::default());
        assert!(detector.detect(&frame(7)).unwrap().is_empty());
    }

    #[test]
    fn test_replay_detection_threshold() {
        let records = [(0, RawDetectionFrame {
            left_hand: Some(scored(0.3)),
            right_hand: Some(scored(0.8)),
            pose: None,
        })];
        let mut detector = ReplayDetector::new(records, DetectorThresholds::default());
        let out = detector.detect(&frame(0)).unwrap();
        assert!(out.left_hand.is_none());
        assert!(out.right_hand.is_some());
    }

    #[test]
    fn test_replay_tracking_threshold_and_reset() {
        let thresholds = DetectorThresholds {
            min_detection_confidence: 0.8,
            min_tracking_confidence: 0.4,
        };
        let records = [
            (0, RawDetectionFrame {
                left_hand: Some(scored(0.9)),
                ..RawDetectionFrame::default()
            }),
            (1, RawDetectionFrame {
                left_hand: Some(scored(0.5)),
                ..RawDetectionFrame::default()
            }),
        ];
        let mut detector = ReplayDetector::new(records, thresholds);
        assert!(detector.detect(&frame(0)).unwrap().left_hand.is_some());
        // Tracked from frame 0, so the lower tracking threshold applies.
        assert!(detector.detect(&frame(1)).unwrap().left_hand.is_some());

        detector.reset();
        assert!(detector.detect(&frame(1)).unwrap().left_hand.is_none());
    }

    #[test]
    fn test_replay_from_json() {
        let json = r#"[
            {"frame": 0, "left_hand": {"points": [[0.1, 0.2, 0.0]]}},
            {"frame": 3, "pose": {"points": [[0.5, 0.5, 0.0]], "score": 0.99}}
        ]"#;
        let detector = ReplayDetector::from_json_str(json, DetectorThresholds::default()).unwrap();
        assert_eq!(detector.len(), 2);

        let dup = r#"[{"frame": 1}, {"frame": 1}]"#;
        assert!(ReplayDetector::from_json_str(dup, DetectorThresholds::default()).is_err());
    }

    #[test]
    fn test_replay_missing_file() {
        let thresholds = DetectorThresholds::default();
        let err = ReplayDetector::from_file("/nonexistent/landmarks.json", thresholds).unwrap_err();
        assert!(matches!(err, InferenceError::DetectorUnavailable(_)));
    }

    #[test]
    fn test_shared_detector_name() {
        let detector = ReplayDetector::new(std::iter::empty(), DetectorThresholds::default());
        let shared = SharedDetector::new(detector);
        assert_eq!(shared.name(), "replay");
        assert!(shared.lock().detect(&frame(0)).unwrap().is_empty());
    }

    #[test]
    fn test_debug_does_not_wait_for_lock() {
        let shared = SharedDetector::new(ReplayDetector::new(
            std::iter::empty(),
            DetectorThresholds::default(),
        ));
        assert!(format!("{shared:?}").contains("replay"));

        let _guard = shared.lock();
        assert!(format!("{shared:?}").contains("<busy>"));
    }
}
