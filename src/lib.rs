// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Sign Language Inference Library
//!
//! Classifies a short video of a hand or body sign into one of a fixed set of semantic
//! sign-language classes, written in Rust on top of [candle](https://github.com/huggingface/candle).
//!
//! ## Pipeline
//!
//! 1. **Decode** the clip into frames ([`FrameDecoder`], video via the `video` feature, or an
//!    image-sequence directory).
//! 2. **Sample** 32 frames evenly spaced over the clip ([`sample_indices`]).
//! 3. **Detect** hand and pose landmarks on each sampled frame through a [`LandmarkDetector`]
//!    held exclusively for the clip ([`SharedDetector`]).
//! 4. **Extract** a fixed 47-joint frame per detection ([`extract`]), missing groups as zeros,
//!    and stack into a `(3, 32, 47)` [`JointSequence`].
//! 5. **Classify** with [`SignNet`]: joint convolutions, a temporal convolution, a bidirectional
//!    LSTM, attention pooling and an MLP head.
//! 6. **Decode** the logits with [`MaskedDecoder`], which only ever returns a trusted class and
//!    maps it to its external semantic ID.
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use sign_inference::{
//!     DetectorThresholds, InferenceConfig, ReplayDetector, SharedDetector, SignClassifier,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = InferenceConfig::from_file("sign.toml")?;
//!     let detector = ReplayDetector::from_file("landmarks.json", config.detector)?;
//!
//!     // Build once at startup; a missing checkpoint leaves the classifier in degraded mode.
//!     let classifier = SignClassifier::new(config)?.with_detector(SharedDetector::new(detector));
//!
//!     let result = classifier.predict("clips/hello/");
//!     println!("{}", result.to_json()?);
//!     Ok(())
//! }
//! ```
//!
//! Every call returns a [`PredictionResult`], serialized as
//! `{success, predicted_class, class_id, error?}`:
//!
//! ```json
//! {"success":true,"predicted_class":14,"class_id":12}
//! {"success":false,"predicted_class":"Model Error","class_id":-1,"error":"..."}
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Classify a clip
//! sign-inference predict --source clip.mp4 --landmarks clip.json --model models/best_model.pt
//!
//! # JSON output
//! sign-inference predict -s frames/ -l frames.json --json
//!
//! # Print the effective configuration
//! sign-inference config --config sign.toml
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`model`] | [`SignClassifier`] context and the `predict` entry point |
//! | [`network`] | [`SignNet`] candle implementation of the classifier |
//! | [`landmarks`] | Landmark types and joint extraction |
//! | [`detector`] | [`LandmarkDetector`] capability and [`SharedDetector`] gate |
//! | [`source`] | Input sources and frame decoding |
//! | [`preprocessing`] | Temporal sampling and sequence assembly |
//! | [`postprocessing`] | [`AllowedClassSet`], [`LabelMap`], [`MaskedDecoder`] |
//! | [`results`] | [`PredictionResult`] and its JSON form |
//! | [`inference`] | [`InferenceConfig`] |
//! | [`device`] | [`Device`] selection |
//! | [`error`] | Error types ([`InferenceError`], [`Result`]) |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `video` | Video file decoding through `video-rs` (FFmpeg) |
//! | `cuda` | NVIDIA CUDA acceleration |
//! | `metal` | Apple Metal acceleration |
//!
//! ## License
//!
//! This project is licensed under [AGPL-3.0](https://ultralytics.com/license).

// Modules
pub mod detector;
pub mod device;
pub mod error;
pub mod inference;
pub mod landmarks;
pub mod model;
pub mod network;
pub mod postprocessing;
pub mod preprocessing;
pub mod results;
pub mod source;

// Re-export main types for convenience
pub use detector::{ColorSpace, DetectorThresholds, LandmarkDetector, ReplayDetector, SharedDetector};
pub use device::Device;
pub use error::{InferenceError, Result};
pub use inference::InferenceConfig;
pub use landmarks::{
    JointFrame, Landmark, LandmarkGroup, NUM_JOINTS, PoseJointIndexSet, RawDetectionFrame, extract,
};
pub use model::SignClassifier;
pub use network::{NetworkConfig, SignNet};
pub use postprocessing::{AllowedClassSet, LabelMap, MaskedDecoder};
pub use preprocessing::{IndexRounding, JointSequence, assemble, sample_indices};
pub use results::{PredictedClass, Prediction, PredictionResult, Speed};
pub use source::{Frame, FrameDecoder, Source, SourceDecoder};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
