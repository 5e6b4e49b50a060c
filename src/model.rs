// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Sign classifier context and the `predict` entry point.
//!
//! [`SignClassifier`] is built once at startup and shared by every call. If the checkpoint
//! cannot be loaded the classifier still constructs, in degraded mode: each `predict` then
//! returns a `"Model Error"` result instead of failing.

use std::time::Instant;

use ndarray::Array1;

use crate::detector::SharedDetector;
use crate::error::{InferenceError, Result};
use crate::inference::InferenceConfig;
use crate::network::{NetworkConfig, SignNet};
use crate::postprocessing::MaskedDecoder;
use crate::preprocessing::{JointSequence, assemble};
use crate::results::{Prediction, PredictionResult, Speed};
use crate::source::{Frame, FrameDecoder, Source, SourceDecoder};

/// Sign classification pipeline.
///
/// # Example
///
/// ```no_run
/// use sign_inference::{
///     DetectorThresholds, InferenceConfig, ReplayDetector, SharedDetector, SignClassifier,
/// };
///
/// let detector = ReplayDetector::from_file("clip_landmarks.json", DetectorThresholds::default())?;
/// let classifier = SignClassifier::new(InferenceConfig::default())?
///     .with_detector(SharedDetector::new(detector));
/// let result = classifier.predict("clip.mp4");
/// println!("{}", result.to_json()?);
/// # Ok::<(), sign_inference::InferenceError>(())
/// ```
pub struct SignClassifier {
    config: InferenceConfig,
    network: Option<SignNet>,
    /// Why `network` is empty.
    load_error: Option<String>,
    detector: Option<SharedDetector>,
    frame_decoder: Box<dyn FrameDecoder>,
    decoder: MaskedDecoder,
    device: candle_core::Device,
}

impl SignClassifier {
    /// Build the classifier and load the configured checkpoint.
    ///
    /// A device that cannot be opened or a checkpoint that fails to load leaves the classifier
    /// in degraded mode rather than returning an error. No detector is attached; see
    /// [`Self::with_detector`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: InferenceConfig) -> Result<Self> {
        config.validate()?;
        let decoder = config.decoder();

        let (device, loaded) = match config.device.to_candle() {
            Ok(device) => {
                let net_config = NetworkConfig::from_inference(&config);
                let loaded = SignNet::load(&config.model_path, net_config, &device).inspect(|_| {
                    tracing::info!(
                        path = %config.model_path.display(),
                        parameters = net_config.parameter_count(),
                        device = %config.device,
                        "loaded sign classifier"
                    );
                });
                (device, loaded)
            }
            Err(e) => (candle_core::Device::Cpu, Err(e)),
        };

        let (network, load_error) = match loaded {
            Ok(network) => (Some(network), None),
            Err(e) => {
                tracing::error!(error = %e, "model failed to load, predictions will fail");
                (None, Some(e.to_string()))
            }
        };

        Ok(Self {
            config,
            network,
            load_error,
            detector: None,
            frame_decoder: Box::new(SourceDecoder),
            decoder,
            device,
        })
    }

    /// Build a classifier around an already constructed network.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the device cannot be opened.
    pub fn with_network(config: InferenceConfig, network: SignNet) -> Result<Self> {
        config.validate()?;
        let device = config.device.to_candle()?;
        Ok(Self {
            decoder: config.decoder(),
            config,
            network: Some(network),
            load_error: None,
            detector: None,
            frame_decoder: Box::new(SourceDecoder),
            device,
        })
    }

    /// Attach the landmark detector.
    #[must_use]
    pub fn with_detector(mut self, detector: SharedDetector) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Replace the frame decoder.
    #[must_use]
    pub fn with_frame_decoder(mut self, decoder: Box<dyn FrameDecoder>) -> Self {
        self.frame_decoder = decoder;
        self
    }

    /// Whether both the network and the detector are available.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.network.is_some() && self.detector.is_some()
    }

    /// Whether the network loaded.
    #[must_use]
    pub const fn has_network(&self) -> bool {
        self.network.is_some()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Classify a clip. Never fails: errors become a failure result.
    pub fn predict<S: Into<Source>>(&self, source: S) -> PredictionResult {
        let source = source.into();
        match self.try_predict(&source) {
            Ok((prediction, speed)) => PredictionResult::from_prediction(&prediction, speed),
            Err(e) => {
                tracing::warn!(source = %source.describe(), error = %e, "prediction failed");
                PredictionResult::from_error(&e)
            }
        }
    }

    /// Classify already decoded frames. Never fails: errors become a failure result.
    pub fn predict_frames(&self, frames: &[Frame]) -> PredictionResult {
        match self.try_predict_frames(frames) {
            Ok((prediction, speed)) => PredictionResult::from_prediction(&prediction, speed),
            Err(e) => PredictionResult::from_error(&e),
        }
    }

    /// Classify a clip, surfacing the first error.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::ModelUnavailable`] in degraded mode, otherwise the first
    /// decoding, detection, inference or label decoding error.
    pub fn try_predict(&self, source: &Source) -> Result<(Prediction, Speed)> {
        self.network()?;
        let start = Instant::now();
        let frames = self.frame_decoder.decode(source)?;
        let decode_time = start.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(frames = frames.len(), ms = decode_time, "decoded source");

        let (prediction, mut speed) = self.try_predict_frames(&frames)?;
        speed.preprocess = Some(speed.preprocess.unwrap_or(0.0) + decode_time);
        Ok((prediction, speed))
    }

    /// Classify decoded frames, surfacing the first error.
    ///
    /// # Errors
    ///
    /// See [`Self::try_predict`].
    pub fn try_predict_frames(&self, frames: &[Frame]) -> Result<(Prediction, Speed)> {
        self.network()?;

        let start_preprocess = Instant::now();
        let sequence = assemble(frames, self.detector.as_ref(), &self.config)?;
        let preprocess_time = start_preprocess.elapsed().as_secs_f64() * 1000.0;

        let start_inference = Instant::now();
        let logits = self.logits(&sequence)?;
        let inference_time = start_inference.elapsed().as_secs_f64() * 1000.0;

        let start_postprocess = Instant::now();
        let prediction = self.decoder.decode(logits.view())?;
        let postprocess_time = start_postprocess.elapsed().as_secs_f64() * 1000.0;

        tracing::debug!(
            preprocess_ms = preprocess_time,
            inference_ms = inference_time,
            postprocess_ms = postprocess_time,
            class_id = prediction.class_id,
            "classified clip"
        );

        Ok((
            prediction,
            Speed::new(preprocess_time, inference_time, postprocess_time),
        ))
    }

    /// Raw logits for one joint sequence.
    ///
    /// # Errors
    ///
    /// Fails in degraded mode or if the forward pass fails.
    pub fn logits(&self, sequence: &JointSequence) -> Result<Array1<f32>> {
        let network = self.network()?;
        let input = sequence.to_tensor(&self.device)?;
        let logits = network.forward(&input)?.squeeze(0)?.to_vec1::<f32>()?;
        Ok(Array1::from_vec(logits))
    }

    /// Forward pass and masked decoding of one joint sequence.
    ///
    /// # Errors
    ///
    /// Fails in degraded mode, on a forward pass failure or a decoding failure.
    pub fn classify(&self, sequence: &JointSequence) -> Result<Prediction> {
        let logits = self.logits(sequence)?;
        self.decoder.decode(logits.view())
    }

    fn network(&self) -> Result<&SignNet> {
        self.network.as_ref().ok_or_else(|| {
            InferenceError::ModelUnavailable(
                self.load_error
                    .clone()
                    .unwrap_or_else(|| "Model failed to load.".to_string()),
            )
        })
    }
}

impl std::fmt::Debug for SignClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignClassifier")
            .field("model_path", &self.config.model_path)
            .field("network_loaded", &self.network.is_some())
            .field("detector", &self.detector)
            .field("device", &self.config.device)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{DetectorThresholds, ReplayDetector};
    use crate::results::PredictedClass;
    use candle_core::DType;
    use candle_nn::{VarBuilder, VarMap};
    use image::RgbImage;

    fn random_network() -> SignNet {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &candle_core::Device::Cpu);
        SignNet::from_var_builder(NetworkConfig::default(), &vb).unwrap()
    }

    fn empty_detector() -> SharedDetector {
        SharedDetector::new(ReplayDetector::new(
            std::iter::empty(),
            DetectorThresholds::default(),
        ))
    }

    fn frames(n: usize) -> Vec<Frame> {
        (0..n).map(|i| Frame::new(i, RgbImage::new(4, 4))).collect()
    }

    #[test]
    fn test_missing_checkpoint_is_degraded() {
        let config = InferenceConfig::new().with_model_path("/nonexistent/best_model.pt");
        let classifier = SignClassifier::new(config).unwrap();
        assert!(!classifier.has_network());
        assert!(!classifier.is_ready());

        let result = classifier.predict_frames(&frames(32));
        assert!(!result.success);
        assert_eq!(result.predicted_class, PredictedClass::ModelError);
        assert_eq!(result.class_id, None);
        assert!(result.error.unwrap().contains("Checkpoint not found"));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_unavailable_device_is_degraded() {
        let config = InferenceConfig::new().with_device(crate::device::Device::Cuda(0));
        let classifier = SignClassifier::new(config)
            .unwrap()
            .with_detector(empty_detector());
        assert!(!classifier.has_network());
        assert!(!classifier.is_ready());

        let result = classifier.predict_frames(&frames(8));
        assert!(!result.success);
        assert_eq!(result.predicted_class, PredictedClass::ModelError);
        assert_eq!(result.class_id, None);
        assert!(result.error.unwrap().contains("cuda:0"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = InferenceConfig::new().with_sequence_length(0);
        assert!(SignClassifier::new(config).is_err());
    }

    #[test]
    fn test_missing_detector_is_error() {
        let classifier =
            SignClassifier::with_network(InferenceConfig::default(), random_network()).unwrap();
        let result = classifier.predict_frames(&frames(10));
        assert!(!result.success);
        assert_eq!(result.predicted_class, PredictedClass::Error);
        assert!(result.error.unwrap().contains("DetectorUnavailable"));
    }

    #[test]
    fn test_blank_clip_classifies_into_allowed_set() {
        let config = InferenceConfig::default();
        let classifier = SignClassifier::with_network(config.clone(), random_network())
            .unwrap()
            .with_detector(empty_detector());
        assert!(classifier.is_ready());

        let result = classifier.predict_frames(&frames(40));
        assert!(result.success, "{:?}", result.error);
        let class_id = result.class_id.unwrap();
        assert!(config.allowed_classes.contains(class_id));
        assert_eq!(result.predicted_class, config.label_map.lookup(class_id));
    }

    #[test]
    fn test_empty_clip_is_error() {
        let classifier = SignClassifier::with_network(InferenceConfig::default(), random_network())
            .unwrap()
            .with_detector(empty_detector());
        let result = classifier.predict_frames(&[]);
        assert!(!result.success);
        assert_eq!(result.predicted_class, PredictedClass::Error);
        assert!(result.error.unwrap().contains("EmptyInput"));
    }

    #[test]
    fn test_logits_width() {
        let classifier =
            SignClassifier::with_network(InferenceConfig::default(), random_network()).unwrap();
        let sequence = JointSequence::from_frames(&vec![crate::landmarks::JointFrame::zeros(); 32])
            .unwrap();
        assert_eq!(classifier.logits(&sequence).unwrap().len(), 67);
    }
}
