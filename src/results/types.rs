//! Region types
//!
//! Geometry primitives, detected regions and the geometry-derived identity
//! used to re-locate a region after the list changed underneath a client.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Geometry
// ============================================================================

/// A point in image pixel space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box in original image pixels
///
/// `(x1, y1)` is the top-left corner and `(x2, y2)` the bottom-right one.
/// Swapped corners are normalised on construction and on deserialization,
/// so `x1 <= x2` and `y1 <= y2` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawBox")]
pub struct BoundingBox {
    x1: i64,
    y1: i64,
    x2: i64,
    y2: i64,
}

#[derive(Deserialize)]
struct RawBox {
    x1: i64,
    y1: i64,
    x2: i64,
    y2: i64,
}

impl From<RawBox> for BoundingBox {
    fn from(raw: RawBox) -> Self {
        BoundingBox::new(raw.x1, raw.y1, raw.x2, raw.y2)
    }
}

impl BoundingBox {
    /// Create a box, swapping corners when they are given out of order
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Build the enclosing box of a polygon (e.g. a four-point OCR quad)
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);
        for (x, y) in iter {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Self::new(
            min_x.round() as i64,
            min_y.round() as i64,
            max_x.round() as i64,
            max_y.round() as i64,
        ))
    }

    pub fn x1(&self) -> i64 {
        self.x1
    }

    pub fn y1(&self) -> i64 {
        self.y1
    }

    pub fn x2(&self) -> i64 {
        self.x2
    }

    pub fn y2(&self) -> i64 {
        self.y2
    }

    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }

    /// Area in pixels (0 for degenerate boxes)
    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Inclusive containment test
    pub fn contains(&self, point: Point) -> bool {
        self.x1 <= point.x && point.x <= self.x2 && self.y1 <= point.y && point.y <= self.y2
    }

    /// Overlapping part of two boxes, if it has a positive area
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(BoundingBox { x1, y1, x2, y2 })
    }

    /// Whether the boxes share a positive-area region (touching edges do not count)
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.intersection(other).is_some()
    }

    /// Intersection-over-union in `[0, 1]`
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let Some(inter) = self.intersection(other) else {
            return 0.0;
        };
        let inter_area = inter.area();
        let union = self.area() + other.area() - inter_area;
        if union <= 0 {
            return 0.0;
        }
        inter_area as f64 / union as f64
    }

    /// Clip to `[0, width) x [0, height)`
    pub fn clip(&self, width: u32, height: u32) -> BoundingBox {
        let max_x = (width as i64 - 1).max(0);
        let max_y = (height as i64 - 1).max(0);
        BoundingBox::new(
            self.x1.clamp(0, max_x),
            self.y1.clamp(0, max_y),
            self.x2.clamp(0, max_x),
            self.y2.clamp(0, max_y),
        )
    }

    pub fn to_array(&self) -> [i64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

// ============================================================================
// Regions
// ============================================================================

/// Soft-delete flag of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionStatus {
    #[default]
    Active,
    Removed,
}

impl RegionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// One OCR finding for an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedRegion {
    pub bbox: BoundingBox,

    /// Recognized or user-edited label
    #[serde(default, alias = "name", deserialize_with = "null_as_empty")]
    pub text: String,

    /// Confidence in `[0, 1]`, if the engine reported one
    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub status: RegionStatus,
}

impl DetectedRegion {
    pub fn new(bbox: BoundingBox, text: impl Into<String>, confidence: Option<f64>) -> Self {
        Self {
            bbox,
            text: text.into(),
            confidence,
            status: RegionStatus::Active,
        }
    }

    pub fn identity(&self) -> RegionIdentity {
        RegionIdentity::of(self)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Confidence used for ranking; unknown counts as zero
    pub fn rank_confidence(&self) -> f64 {
        self.confidence.unwrap_or(0.0)
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Identity
// ============================================================================

/// Geometry-derived key of a region
///
/// Depends on the four box coordinates only, never on text, confidence,
/// status or list position. Two regions with identical geometry share an
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionIdentity {
    x1: i64,
    y1: i64,
    x2: i64,
    y2: i64,
}

impl RegionIdentity {
    pub fn of(region: &DetectedRegion) -> Self {
        Self::from(&region.bbox)
    }

    /// Position of the first region in `regions` carrying this identity
    pub fn locate(&self, regions: &[DetectedRegion]) -> Option<usize> {
        regions.iter().position(|r| RegionIdentity::of(r) == *self)
    }
}

impl From<&BoundingBox> for RegionIdentity {
    fn from(bbox: &BoundingBox) -> Self {
        Self {
            x1: bbox.x1,
            y1: bbox.y1,
            x2: bbox.x2,
            y2: bbox.y2,
        }
    }
}

impl fmt::Display for RegionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.x1, self.y1, self.x2, self.y2)
    }
}
