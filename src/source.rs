// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Input source handling.
//!
//! A clip arrives either as a video file (decoded through `video-rs`, `video` feature) or as an
//! image sequence on disk: a directory of frames, a glob pattern or a single still image.
//! Decoding is a collaborator behind [`FrameDecoder`], so tests and embedders can supply frames
//! from elsewhere.

use std::path::{Path, PathBuf};

use image::RgbImage;
use rayon::prelude::*;

use crate::detector::ColorSpace;
use crate::error::{InferenceError, Result};

/// Where a clip's frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Path to a video file.
    Video(PathBuf),
    /// Directory of frame images, ordered by file name.
    Directory(PathBuf),
    /// Glob pattern for frame images.
    Glob(String),
    /// A single still image, treated as a one-frame clip.
    Image(PathBuf),
    /// Explicit list of frame images, in order.
    ImageList(Vec<PathBuf>),
}

impl Source {
    /// Check if this source is a video file.
    #[must_use]
    pub const fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }

    /// Get the path if this source has one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Video(p) | Self::Directory(p) | Self::Image(p) => Some(p),
            _ => None,
        }
    }

    /// Human-readable description for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Video(p) | Self::Directory(p) | Self::Image(p) => p.display().to_string(),
            Self::Glob(pattern) => pattern.clone(),
            Self::ImageList(paths) => format!("{} images", paths.len()),
        }
    }
}

/// Convert from a string path to Source.
impl From<&str> for Source {
    fn from(s: &str) -> Self {
        if s.contains('*') {
            return Self::Glob(s.to_string());
        }

        let path = PathBuf::from(s);

        if path.is_dir() {
            return Self::Directory(path);
        }

        if is_image_file(&path) {
            return Self::Image(path);
        }

        // Anything else is handed to the video decoder, which reports what it cannot open.
        Self::Video(path)
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::from(path.to_string_lossy().as_ref())
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Self::from(path.to_string_lossy().as_ref())
    }
}

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position of the frame in the decoded clip.
    pub index: usize,
    /// Pixel data; channel order given by `color_space`.
    pub image: RgbImage,
    /// Channel order of `image`.
    pub color_space: ColorSpace,
}

impl Frame {
    /// Create an RGB frame.
    #[must_use]
    pub const fn new(index: usize, image: RgbImage) -> Self {
        Self {
            index,
            image,
            color_space: ColorSpace::Rgb,
        }
    }

    /// Mark the pixel data as stored in a different channel order.
    #[must_use]
    pub const fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    /// Return the frame in `target` channel order, swapping red and blue when needed.
    #[must_use]
    pub fn to_color_space(&self, target: ColorSpace) -> Self {
        if self.color_space == target {
            return self.clone();
        }
        let mut image = self.image.clone();
        for pixel in image.pixels_mut() {
            pixel.0.swap(0, 2);
        }
        Self {
            index: self.index,
            image,
            color_space: target,
        }
    }
}

/// Decodes a [`Source`] into its full, ordered frame list.
pub trait FrameDecoder: Send + Sync {
    /// Decode every frame.
    ///
    /// An unreadable source is an error; a readable source with no frames yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be opened or a frame fails to decode.
    fn decode(&self, source: &Source) -> Result<Vec<Frame>>;
}

/// The default decoder: `video-rs` for video files, `image` for image sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceDecoder;

impl FrameDecoder for SourceDecoder {
    fn decode(&self, source: &Source) -> Result<Vec<Frame>> {
        match source {
            Source::Video(path) => decode_video(path),
            Source::Directory(path) => load_frames(&collect_images_from_dir(path)?),
            Source::Glob(pattern) => load_frames(&collect_images_from_glob(pattern)?),
            Source::Image(path) => load_frames(std::slice::from_ref(path)),
            Source::ImageList(paths) => load_frames(paths),
        }
    }
}

/// Load image files in parallel, keeping their order.
fn load_frames(paths: &[PathBuf]) -> Result<Vec<Frame>> {
    paths
        .par_iter()
        .enumerate()
        .map(|(index, path)| {
            let img = image::open(path).map_err(|e| {
                InferenceError::ImageError(format!("Failed to load {}: {e}", path.display()))
            })?;
            Ok(Frame::new(index, img.to_rgb8()))
        })
        .collect()
}

/// Collect image paths from a directory.
fn collect_images_from_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| InferenceError::IoError(format!("Failed to read {}: {e}", dir.display())))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_image_file(path))
        .collect();

    paths.sort();
    Ok(paths)
}

/// Collect image paths from a glob pattern.
///
/// Only patterns of the form `dir/*.ext` or `dir/*` are supported.
fn collect_images_from_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let Some(star_pos) = pattern.find('*') else {
        return Ok(vec![PathBuf::from(pattern)]);
    };

    let dir_part = &pattern[..star_pos];
    let dir = if dir_part.is_empty() {
        Path::new(".")
    } else {
        Path::new(dir_part.trim_end_matches('/').trim_end_matches('\\'))
    };

    let ext_filter: Option<String> = pattern[star_pos..]
        .strip_prefix("*.")
        .map(str::to_lowercase);

    if !dir.is_dir() {
        return Err(InferenceError::ImageError(format!(
            "Directory not found: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| InferenceError::IoError(format!("Failed to read {}: {e}", dir.display())))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            ext_filter.as_ref().map_or_else(
                || is_image_file(path),
                |ext| {
                    path.extension()
                        .is_some_and(|e| e.to_string_lossy().to_lowercase() == *ext)
                },
            )
        })
        .collect();

    paths.sort();
    Ok(paths)
}

/// Check if a path is an image file based on extension.
fn is_image_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "bmp")
    })
}

#[cfg(feature = "video")]
static VIDEO_INIT: std::sync::Once = std::sync::Once::new();

/// Decode every frame of a video file.
#[cfg(feature = "video")]
fn decode_video(path: &Path) -> Result<Vec<Frame>> {
    VIDEO_INIT.call_once(|| {
        if let Err(e) = video_rs::init() {
            tracing::error!("Failed to initialize video-rs: {e}");
        }
    });

    if !path.exists() {
        return Err(InferenceError::VideoError(format!(
            "Video file not found: {}",
            path.display()
        )));
    }

    let mut decoder = video_rs::decode::Decoder::new(path).map_err(|e| {
        InferenceError::VideoError(format!("Failed to open {}: {e}", path.display()))
    })?;

    let mut frames = Vec::new();
    loop {
        match decoder.decode() {
            Ok((_ts, frame)) => {
                let image = video_frame_to_image(&frame)?;
                frames.push(Frame::new(frames.len(), image));
            }
            Err(video_rs::Error::DecodeExhausted) => break,
            Err(e) => {
                return Err(InferenceError::VideoError(format!(
                    "Failed to decode frame {} of {}: {e}",
                    frames.len(),
                    path.display()
                )));
            }
        }
    }

    tracing::debug!(path = %path.display(), frames = frames.len(), "decoded video");
    Ok(frames)
}

#[cfg(not(feature = "video"))]
fn decode_video(path: &Path) -> Result<Vec<Frame>> {
    Err(InferenceError::FeatureNotEnabled(format!(
        "Decoding {} requires the 'video' feature",
        path.display()
    )))
}

/// Convert a `video_rs` RGB frame to an `RgbImage`.
#[cfg(feature = "video")]
fn video_frame_to_image(arr: &video_rs::Frame) -> Result<RgbImage> {
    let shape = arr.shape();
    let height = u32::try_from(shape[0])
        .map_err(|_| InferenceError::ImageError("Frame height exceeds u32::MAX".to_string()))?;
    let width = u32::try_from(shape[1])
        .map_err(|_| InferenceError::ImageError("Frame width exceeds u32::MAX".to_string()))?;

    let mut rgb_data = Vec::with_capacity(shape[0] * shape[1] * 3);
    for y in 0..shape[0] {
        for x in 0..shape[1] {
            rgb_data.push(arr[[y, x, 0]]);
            rgb_data.push(arr[[y, x, 1]]);
            rgb_data.push(arr[[y, x, 2]]);
        }
    }

    RgbImage::from_raw(width, height, rgb_data).ok_or_else(|| {
        InferenceError::ImageError("Failed to create image from video frame".to_string())
    })
}
