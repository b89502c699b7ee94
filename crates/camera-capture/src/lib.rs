//! Camera Capture Library for the Drowsiness Monitor
//!
//! Provides the frame side of the per-frame pipeline:
//! - `VideoFrame` RGB frames with resize / grayscale preprocessing
//! - `FrameSource`, a blocking pull of one frame at a time
//! - Synthetic and image-directory sources for replay and tests

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{FrameSource, ImageDirSource, SyntheticSource};

use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    /// End of stream or device disconnect; no more frames will arrive
    #[error("Video source exhausted")]
    Exhausted,
}

/// Camera configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConfig {
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::cabin()
    }
}

impl CameraConfig {
    /// Cabin-facing driver camera (640x480)
    pub fn cabin() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}
