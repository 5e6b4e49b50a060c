// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the sign inference pipeline.
//!
//! Every stage returns [`Result`]; only [`crate::SignClassifier::predict`] folds an error
//! into the uniform [`crate::PredictionResult`].

use std::fmt;

/// Result type alias for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;

/// Main error type for the inference pipeline.
#[derive(Debug)]
pub enum InferenceError {
    /// Error loading the model checkpoint.
    ModelLoadError(String),
    /// Model was not loaded at startup; the classifier is in degraded mode.
    ModelUnavailable(String),
    /// Landmark detector was not initialized.
    DetectorUnavailable(String),
    /// Source decoded to zero frames.
    EmptyInput(String),
    /// Video decoding error.
    VideoError(String),
    /// Error loading or converting frames.
    ImageError(String),
    /// Malformed detector output.
    LandmarkError(String),
    /// Tensor or array shape mismatch.
    ShapeError(String),
    /// Error during the network forward pass.
    InferenceError(String),
    /// Non-finite values where a number was required.
    NumericError(String),
    /// Label decoding could not produce a class.
    DecodeError(String),
    /// Invalid configuration provided.
    ConfigError(String),
    /// IO error (file not found, permission denied, etc.).
    IoError(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
    /// Feature not enabled.
    FeatureNotEnabled(String),
}

impl InferenceError {
    /// External category string reported in a failed [`crate::PredictionResult`].
    ///
    /// Startup failures of the model surface as `"Model Error"`; everything else is `"Error"`.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        if self.is_model_error() {
            "Model Error"
        } else {
            "Error"
        }
    }

    /// Whether this is a startup failure of the model.
    #[must_use]
    pub const fn is_model_error(&self) -> bool {
        matches!(self, Self::ModelLoadError(_) | Self::ModelUnavailable(_))
    }

    /// Variant name, used as the failure kind in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ModelLoadError(_) => "ModelLoadError",
            Self::ModelUnavailable(_) => "ModelUnavailable",
            Self::DetectorUnavailable(_) => "DetectorUnavailable",
            Self::EmptyInput(_) => "EmptyInput",
            Self::VideoError(_) => "VideoError",
            Self::ImageError(_) => "ImageError",
            Self::LandmarkError(_) => "LandmarkError",
            Self::ShapeError(_) => "ShapeError",
            Self::InferenceError(_) => "InferenceError",
            Self::NumericError(_) => "NumericError",
            Self::DecodeError(_) => "DecodeError",
            Self::ConfigError(_) => "ConfigError",
            Self::IoError(_) | Self::Io(_) => "IoError",
            Self::FeatureNotEnabled(_) => "FeatureNotEnabled",
        }
    }
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelLoadError(msg) => write!(f, "Model load error: {msg}"),
            Self::ModelUnavailable(msg) => write!(f, "Model unavailable: {msg}"),
            Self::DetectorUnavailable(msg) => write!(f, "Detector unavailable: {msg}"),
            Self::EmptyInput(msg) => write!(f, "Empty input: {msg}"),
            Self::VideoError(msg) => write!(f, "Video error: {msg}"),
            Self::ImageError(msg) => write!(f, "Image error: {msg}"),
            Self::LandmarkError(msg) => write!(f, "Landmark error: {msg}"),
            Self::ShapeError(msg) => write!(f, "Shape error: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::NumericError(msg) => write!(f, "Numeric error: {msg}"),
            Self::DecodeError(msg) => write!(f, "Decode error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::FeatureNotEnabled(msg) => write!(f, "Feature not enabled: {msg}"),
        }
    }
}

impl std::error::Error for InferenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for InferenceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for InferenceError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}

impl From<candle_core::Error> for InferenceError {
    fn from(err: candle_core::Error) -> Self {
        Self::InferenceError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for InferenceError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::ShapeError(err.to_string())
    }
}

impl From<serde_json::Error> for InferenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::LandmarkError(err.to_string())
    }
}

impl From<toml::de::Error> for InferenceError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}
