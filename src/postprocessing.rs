// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Masked label decoding.
//!
//! The classifier scores every internal class, but only a subset of them is trusted.
//! [`MaskedDecoder`] restricts the argmax to that subset and maps the winning internal index to
//! its external semantic ID.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, Result};
use crate::results::{PredictedClass, Prediction};

/// Internal class indices the decoder may return.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowedClassSet(BTreeSet<usize>);

impl AllowedClassSet {
    /// Build a set from indices. Duplicates collapse.
    pub fn new(indices: impl IntoIterator<Item = usize>) -> Self {
        Self(indices.into_iter().collect())
    }

    /// Check every index is below `num_classes`.
    ///
    /// # Errors
    ///
    /// Returns a config error naming the first out-of-range index.
    pub fn validate(&self, num_classes: usize) -> Result<()> {
        if let Some(&bad) = self.0.iter().find(|&&i| i >= num_classes) {
            return Err(InferenceError::ConfigError(format!(
                "Allowed class {bad} out of range for {num_classes} classes"
            )));
        }
        Ok(())
    }

    /// Whether `index` is allowed.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    /// Allowed indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Number of allowed classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no class is allowed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<usize> for AllowedClassSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Immutable internal index to external semantic ID mapping.
///
/// Serialized as a list of `[internal, external]` pairs; a repeated internal index is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<(usize, u32)>", into = "Vec<(usize, u32)>")]
pub struct LabelMap(BTreeMap<usize, u32>);

impl LabelMap {
    /// Build from `(internal, external)` pairs.
    ///
    /// # Errors
    ///
    /// Returns a config error if an internal index appears twice.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (usize, u32)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (internal, external) in pairs {
            if map.insert(internal, external).is_some() {
                return Err(InferenceError::ConfigError(format!(
                    "Label map key {internal} appears more than once"
                )));
            }
        }
        Ok(Self(map))
    }

    /// External label for an internal index, [`PredictedClass::Unknown`] when unmapped.
    #[must_use]
    pub fn lookup(&self, internal: usize) -> PredictedClass {
        self.0
            .get(&internal)
            .map_or(PredictedClass::Unknown, |&id| PredictedClass::Semantic(id))
    }

    /// Raw lookup.
    #[must_use]
    pub fn get(&self, internal: usize) -> Option<u32> {
        self.0.get(&internal).copied()
    }

    /// Check every key is below `num_classes`.
    ///
    /// # Errors
    ///
    /// Returns a config error naming the first out-of-range key.
    pub fn validate(&self, num_classes: usize) -> Result<()> {
        if let Some(&bad) = self.0.keys().find(|&&k| k >= num_classes) {
            return Err(InferenceError::ConfigError(format!(
                "Label map key {bad} out of range for {num_classes} classes"
            )));
        }
        Ok(())
    }

    /// Number of mapped indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<(usize, u32)>> for LabelMap {
    type Error = InferenceError;

    fn try_from(pairs: Vec<(usize, u32)>) -> Result<Self> {
        Self::from_pairs(pairs)
    }
}

impl From<LabelMap> for Vec<(usize, u32)> {
    fn from(map: LabelMap) -> Self {
        map.0.into_iter().collect()
    }
}

/// Restricts the argmax to allowed classes and remaps the result.
#[derive(Debug, Clone)]
pub struct MaskedDecoder {
    allowed: AllowedClassSet,
    labels: LabelMap,
    num_classes: usize,
}

impl MaskedDecoder {
    /// Create a decoder for logit vectors of length `num_classes`.
    #[must_use]
    pub const fn new(allowed: AllowedClassSet, labels: LabelMap, num_classes: usize) -> Self {
        Self {
            allowed,
            labels,
            num_classes,
        }
    }

    /// The allowed set.
    #[must_use]
    pub const fn allowed(&self) -> &AllowedClassSet {
        &self.allowed
    }

    /// The label map.
    #[must_use]
    pub const fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Copy of `logits` with every disallowed entry set to negative infinity.
    ///
    /// # Errors
    ///
    /// Returns a shape error if the length differs from `num_classes`.
    pub fn mask(&self, logits: ArrayView1<'_, f32>) -> Result<Array1<f32>> {
        if logits.len() != self.num_classes {
            return Err(InferenceError::ShapeError(format!(
                "Expected {} logits, got {}",
                self.num_classes,
                logits.len()
            )));
        }
        let mut masked = Array1::from_elem(self.num_classes, f32::NEG_INFINITY);
        for i in self.allowed.iter() {
            masked[i] = logits[i];
        }
        Ok(masked)
    }

    /// Decode one logit vector.
    ///
    /// Ties resolve to the lowest index. The result always lies in the allowed set, even when
    /// every allowed logit is negative infinity.
    ///
    /// # Errors
    ///
    /// Fails on a length mismatch, an empty allowed set, or a NaN among the allowed logits.
    pub fn decode(&self, logits: ArrayView1<'_, f32>) -> Result<Prediction> {
        let masked = self.mask(logits)?;

        let mut best: Option<(usize, f32)> = None;
        for i in self.allowed.iter() {
            let value = masked[i];
            if value.is_nan() {
                return Err(InferenceError::NumericError(format!("Logit {i} is NaN")));
            }
            if best.is_none_or(|(_, b)| value > b) {
                best = Some((i, value));
            }
        }

        let (class_id, logit) = best.ok_or_else(|| {
            InferenceError::DecodeError("Allowed class set is empty".to_string())
        })?;

        let label = self.labels.lookup(class_id);
        if label == PredictedClass::Unknown {
            tracing::warn!(class_id, "decoded class has no external label");
        }

        Ok(Prediction {
            class_id,
            label,
            logit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn decoder(allowed: &[usize], pairs: &[(usize, u32)], n: usize) -> MaskedDecoder {
        MaskedDecoder::new(
            allowed.iter().copied().collect(),
            LabelMap::from_pairs(pairs.iter().copied()).unwrap(),
            n,
        )
    }

    #[test]
    fn test_mask_only_keeps_allowed() {
        let dec = decoder(&[1, 3], &[], 4);
        let masked = dec.mask(array![1.0, 2.0, 3.0, 4.0].view()).unwrap();
        assert_eq!(masked[0], f32::NEG_INFINITY);
        assert_eq!(masked[1], 2.0);
        assert_eq!(masked[2], f32::NEG_INFINITY);
        assert_eq!(masked[3], 4.0);
    }

    #[test]
    fn test_disallowed_maximum_is_ignored() {
        let dec = decoder(&[0, 2], &[(0, 1), (2, 3)], 4);
        let p = dec.decode(array![0.1, 100.0, 0.5, 1e30].view()).unwrap();
        assert_eq!(p.class_id, 2);
        assert_eq!(p.label, PredictedClass::Semantic(3));
    }

    #[test]
    fn test_tie_breaks_to_lowest_index() {
        let dec = decoder(&[1, 2, 3], &[], 4);
        let logits = array![9.0, 5.0, 5.0, 5.0];
        for _ in 0..10 {
            assert_eq!(dec.decode(logits.view()).unwrap().class_id, 1);
        }
    }

    #[test]
    fn test_adversarial_values_stay_in_set() {
        let allowed = [4, 7, 9];
        let dec = decoder(&allowed, &[], 10);
        let cases = [
            Array1::from_elem(10, 0.0_f32),
            Array1::from_elem(10, -1e30_f32),
            Array1::from_elem(10, f32::NEG_INFINITY),
            Array1::from_elem(10, f32::INFINITY),
            Array1::from_iter((0..10).map(|i| if i % 2 == 0 { f32::MAX } else { f32::MIN })),
        ];
        for logits in &cases {
            let p = dec.decode(logits.view()).unwrap();
            assert!(allowed.contains(&p.class_id), "{} not allowed", p.class_id);
        }
        let all_neg_inf = dec.decode(cases[2].view()).unwrap();
        assert_eq!(all_neg_inf.class_id, 4);
    }

    #[test]
    fn test_empty_allowed_set_fails() {
        let dec = decoder(&[], &[], 3);
        let err = dec.decode(array![1.0, 2.0, 3.0].view()).unwrap_err();
        assert!(matches!(err, InferenceError::DecodeError(_)));
    }

    #[test]
    fn test_nan_in_allowed_logit_fails() {
        let dec = decoder(&[0, 1], &[], 3);
        let err = dec.decode(array![1.0, f32::NAN, 0.0].view()).unwrap_err();
        assert!(matches!(err, InferenceError::NumericError(_)));

        // NaN outside the allowed set is masked away.
        let p = dec.decode(array![1.0, 0.0, f32::NAN].view()).unwrap();
        assert_eq!(p.class_id, 0);
    }

    #[test]
    fn test_wrong_length_fails() {
        let dec = decoder(&[0], &[], 67);
        let err = dec.decode(array![1.0, 2.0].view()).unwrap_err();
        assert!(matches!(err, InferenceError::ShapeError(_)));
    }

    #[test]
    fn test_unmapped_index_decodes_as_unknown_success() {
        let dec = decoder(&[0, 5], &[(0, 1)], 6);
        let p = dec.decode(array![0.0, 0.0, 0.0, 0.0, 0.0, 1.0].view()).unwrap();
        assert_eq!(p.class_id, 5);
        assert_eq!(p.label, PredictedClass::Unknown);
    }

    #[test]
    fn test_label_map_duplicates_rejected() {
        assert!(LabelMap::from_pairs([(1, 2), (1, 3)]).is_err());
        let json = "[[1, 2], [1, 3]]";
        assert!(serde_json::from_str::<LabelMap>(json).is_err());
        let map: LabelMap = serde_json::from_str("[[1, 2], [4, 9]]").unwrap();
        assert_eq!(map.get(4), Some(9));
        assert_eq!(map.lookup(2), PredictedClass::Unknown);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(AllowedClassSet::new([0, 66]).validate(67).is_ok());
        assert!(AllowedClassSet::new([67]).validate(67).is_err());
        assert!(LabelMap::from_pairs([(70, 1)]).unwrap().validate(67).is_err());
    }
}
