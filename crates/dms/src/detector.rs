//! Face landmark provider boundary

use std::collections::VecDeque;

use image::GrayImage;

use crate::landmarks::LandmarkSet;
use crate::DmsError;

/// Face detector plus 68-point landmark predictor
///
/// Called once per frame with the preprocessed grayscale image. Detections
/// carry no identity across frames.
pub trait LandmarkProvider {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<LandmarkSet>, DmsError>;
}

impl<P: LandmarkProvider + ?Sized> LandmarkProvider for Box<P> {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<LandmarkSet>, DmsError> {
        (**self).detect(gray)
    }
}

/// Replays pre-computed detections, one entry per call
///
/// Returns no faces once the script runs out.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    frames: VecDeque<Vec<LandmarkSet>>,
}

impl ScriptedProvider {
    pub fn new(frames: impl IntoIterator<Item = Vec<LandmarkSet>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl LandmarkProvider for ScriptedProvider {
    fn detect(&mut self, _gray: &GrayImage) -> Result<Vec<LandmarkSet>, DmsError> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }
}
