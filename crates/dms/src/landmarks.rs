//! 68-point facial landmarks and the region layout table

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Number of points in the 68-point landmark scheme
pub const LANDMARK_COUNT: usize = 68;

/// 2-D point in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (f64, f64) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Axis-aligned face bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// One detected face: exactly 68 points in the standard ordering
///
/// 0-16 jaw, 17-26 brows, 27-35 nose, 36-47 eyes, 48-67 mouth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Result<Self, DmsError> {
        if points.len() != LANDMARK_COUNT {
            return Err(DmsError::LandmarkCount(points.len()));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Points covered by `range`, or `None` if it runs past the set
    pub fn slice(&self, range: RegionRange) -> Option<&[Point]> {
        self.points.get(range.as_range())
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
        let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        BoundingBox {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    /// Mean of all points
    pub fn centroid(&self) -> Point {
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / n, sy / n)
    }
}

impl TryFrom<Vec<Point>> for LandmarkSet {
    type Error = DmsError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<LandmarkSet> for Vec<Point> {
    fn from(set: LandmarkSet) -> Self {
        set.points
    }
}

/// Facial region sliced out of a landmark set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    LeftEye,
    RightEye,
    Mouth,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::LeftEye => write!(f, "left eye"),
            Region::RightEye => write!(f, "right eye"),
            Region::Mouth => write!(f, "mouth"),
        }
    }
}

/// Half-open index range into the landmark set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRange {
    pub start: usize,
    pub end: usize,
}

impl RegionRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }

    fn overlaps(&self, other: &RegionRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Offsets of the eye and mouth regions in the 68-point scheme
///
/// "Left" is the subject's left eye.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkLayout {
    pub left_eye: RegionRange,
    pub right_eye: RegionRange,
    pub mouth: RegionRange,
}

impl Default for LandmarkLayout {
    fn default() -> Self {
        Self {
            left_eye: RegionRange::new(42, 48),
            right_eye: RegionRange::new(36, 42),
            mouth: RegionRange::new(48, 68),
        }
    }
}

impl LandmarkLayout {
    pub fn range(&self, region: Region) -> RegionRange {
        match region {
            Region::LeftEye => self.left_eye,
            Region::RightEye => self.right_eye,
            Region::Mouth => self.mouth,
        }
    }

    /// Check range sizes, bounds, and eye disjointness
    pub fn validate(&self) -> Result<(), DmsError> {
        for region in [Region::LeftEye, Region::RightEye, Region::Mouth] {
            let range = self.range(region);
            if range.end > LANDMARK_COUNT || range.start >= range.end {
                return Err(DmsError::Config(format!(
                    "{} range {}..{} is outside 0..{}",
                    region, range.start, range.end, LANDMARK_COUNT
                )));
            }
        }

        for eye in [Region::LeftEye, Region::RightEye] {
            let len = self.range(eye).len();
            if len != crate::geometry::EYE_POINTS {
                return Err(DmsError::Config(format!(
                    "{} range must cover {} points, got {}",
                    eye,
                    crate::geometry::EYE_POINTS,
                    len
                )));
            }
        }

        if self.mouth.len() < crate::geometry::MIN_MOUTH_POINTS {
            return Err(DmsError::Config(format!(
                "mouth range must cover at least {} points, got {}",
                crate::geometry::MIN_MOUTH_POINTS,
                self.mouth.len()
            )));
        }

        if self.left_eye.overlaps(&self.right_eye) {
            return Err(DmsError::Config("eye ranges overlap".into()));
        }

        Ok(())
    }

    /// Slice one region out of a face
    pub fn region<'a>(&self, face: &'a LandmarkSet, region: Region) -> Result<&'a [Point], DmsError> {
        let range = self.range(region);
        face.slice(range).ok_or(DmsError::RegionSize {
            region,
            expected: range.len(),
            actual: face.points().len().saturating_sub(range.start),
        })
    }
}
