// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Hardware device support and abstraction.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{InferenceError, Result};

/// Hardware device the network runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    /// CPU (Central Processing Unit).
    #[default]
    Cpu,
    /// CUDA (Compute Unified Device Architecture) for NVIDIA GPUs.
    /// The argument specifies the device index (e.g., 0 for the first GPU).
    Cuda(usize),
    /// Apple Metal.
    /// The argument specifies the device index.
    Metal(usize),
}

impl Device {
    /// Open the candle device.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend was not compiled in or the device index is invalid.
    pub fn to_candle(self) -> Result<candle_core::Device> {
        let device = match self {
            Self::Cpu => candle_core::Device::Cpu,
            Self::Cuda(i) => candle_core::Device::new_cuda(i).map_err(|e| {
                InferenceError::ConfigError(format!("Failed to open {self}: {e}"))
            })?,
            Self::Metal(i) => candle_core::Device::new_metal(i).map_err(|e| {
                InferenceError::ConfigError(format!("Failed to open {self}: {e}"))
            })?,
        };
        Ok(device)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(i) => write!(f, "cuda:{i}"),
            Self::Metal(i) => write!(f, "metal:{i}"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.to_lowercase();
        if s == "cpu" {
            return Ok(Self::Cpu);
        }
        if s == "mps" {
            return Ok(Self::Metal(0));
        }
        if let Some(rest) = s.strip_prefix("cuda") {
            return parse_device_index(rest)
                .map(Self::Cuda)
                .ok_or_else(|| format!("Invalid device index: {s}"));
        }
        if let Some(rest) = s.strip_prefix("metal") {
            return parse_device_index(rest)
                .map(Self::Metal)
                .ok_or_else(|| format!("Invalid device index: {s}"));
        }
        Err(format!("Unknown device: {s}"))
    }
}

impl Serialize for Device {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Device {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse the suffix after the backend name: empty selects device 0, otherwise `:N`.
fn parse_device_index(s: &str) -> Option<usize> {
    if s.is_empty() {
        return Some(0);
    }
    s.strip_prefix(':')
        .and_then(|index_str| index_str.parse::<usize>().ok())
}
