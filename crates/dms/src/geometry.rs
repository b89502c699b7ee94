//! Eye and mouth aspect ratios

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::landmarks::{LandmarkLayout, LandmarkSet, Point, Region};
use crate::DmsError;

/// Points in one eye region
pub const EYE_POINTS: usize = 6;

/// Highest mouth index used by the ratio is 10
pub const MIN_MOUTH_POINTS: usize = 11;

/// Failure computing a single ratio
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// The horizontal reference points coincide (zero or non-finite width)
    #[error("horizontal distance is {0}")]
    Degenerate(f64),

    #[error("expected {expected} points, got {actual}")]
    WrongSize { expected: usize, actual: usize },
}

/// Eye Aspect Ratio: (|p1-p5| + |p2-p4|) / (2 * |p0-p3|)
pub fn eye_aspect_ratio(eye: &[Point]) -> Result<f64, GeometryError> {
    if eye.len() != EYE_POINTS {
        return Err(GeometryError::WrongSize {
            expected: EYE_POINTS,
            actual: eye.len(),
        });
    }

    let a = eye[1].distance(&eye[5]);
    let b = eye[2].distance(&eye[4]);
    let c = eye[0].distance(&eye[3]);
    checked_ratio(a + b, 2.0 * c)
}

/// Mouth Aspect Ratio: mean(|p2-p10|, |p4-p8|) / |p0-p6|
pub fn mouth_aspect_ratio(mouth: &[Point]) -> Result<f64, GeometryError> {
    if mouth.len() < MIN_MOUTH_POINTS {
        return Err(GeometryError::WrongSize {
            expected: MIN_MOUTH_POINTS,
            actual: mouth.len(),
        });
    }

    let x = mouth[0].distance(&mouth[6]);
    let y1 = mouth[2].distance(&mouth[10]);
    let y2 = mouth[4].distance(&mouth[8]);
    checked_ratio((y1 + y2) / 2.0, x)
}

fn checked_ratio(numerator: f64, denominator: f64) -> Result<f64, GeometryError> {
    if !denominator.is_finite() || denominator <= f64::EPSILON {
        return Err(GeometryError::Degenerate(denominator));
    }
    let ratio = numerator / denominator;
    if !ratio.is_finite() {
        return Err(GeometryError::Degenerate(denominator));
    }
    Ok(ratio)
}

/// Per-face ratios for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMetrics {
    pub left_ear: f64,
    pub right_ear: f64,
    /// Mean of both eyes
    pub ear: f64,
    pub mar: f64,
}

impl FaceMetrics {
    /// Slice the regions through `layout` and compute all ratios
    pub fn compute(face: &LandmarkSet, layout: &LandmarkLayout) -> Result<Self, DmsError> {
        let left_ear = region_ratio(face, layout, Region::LeftEye, eye_aspect_ratio)?;
        let right_ear = region_ratio(face, layout, Region::RightEye, eye_aspect_ratio)?;
        let mar = region_ratio(face, layout, Region::Mouth, mouth_aspect_ratio)?;

        Ok(Self {
            left_ear,
            right_ear,
            ear: (left_ear + right_ear) / 2.0,
            mar,
        })
    }
}

fn region_ratio(
    face: &LandmarkSet,
    layout: &LandmarkLayout,
    region: Region,
    ratio: fn(&[Point]) -> Result<f64, GeometryError>,
) -> Result<f64, DmsError> {
    let points = layout.region(face, region)?;
    ratio(points).map_err(|source| match source {
        GeometryError::WrongSize { expected, actual } => DmsError::RegionSize {
            region,
            expected,
            actual,
        },
        degenerate => DmsError::DegenerateGeometry {
            region,
            source: degenerate,
        },
    })
}
