//! Polygon annotations in normalized coordinate space.
//!
//! Segmentation formats (YOLO-seg, COCO segmentation arrays) carry polygon
//! outlines alongside or instead of boxes. The IR stores polygons as an
//! ordered vertex list in [0,1]-normalized space so they survive image
//! resizing without rewrites; pixel-space consumers convert on the way out.

use serde::{Deserialize, Serialize};

use super::bbox::BBoxXYXY;
use super::coord::Coord;
use super::{Normalized, Pixel};

/// An ordered polygon outline with vertices in normalized [0,1] space.
///
/// Like [`BBoxXYXY`], construction is permissive: polygons with fewer than
/// three vertices or out-of-range coordinates can be represented so that
/// validation reports them instead of parsers panicking.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Polygon {
    pub points: Vec<Coord<Normalized>>,
}

impl Polygon {
    /// Creates a polygon from a vertex list.
    pub fn new(points: Vec<Coord<Normalized>>) -> Self {
        Self { points }
    }

    /// Creates a polygon from a flat `[x1, y1, x2, y2, ...]` coordinate list.
    ///
    /// Returns `None` when the list has odd length; vertex-count and range
    /// checks are left to validation.
    pub fn from_flat(coords: &[f64]) -> Option<Self> {
        if coords.len() % 2 != 0 {
            return None;
        }

        let points = coords
            .chunks_exact(2)
            .map(|pair| Coord::new(pair[0], pair[1]))
            .collect();

        Some(Self { points })
    }

    /// Returns the flat `[x1, y1, x2, y2, ...]` coordinate list.
    pub fn to_flat(&self) -> Vec<f64> {
        self.points
            .iter()
            .flat_map(|point| [point.x, point.y])
            .collect()
    }

    /// Number of vertices.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the polygon has at least three vertices.
    #[inline]
    pub fn has_enough_points(&self) -> bool {
        self.points.len() >= 3
    }

    /// Returns true if every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.points.iter().all(Coord::is_finite)
    }

    /// Returns true if every coordinate lies within [0,1] with `tolerance`.
    pub fn in_unit_range(&self, tolerance: f64) -> bool {
        self.points.iter().all(|point| {
            point.x >= -tolerance
                && point.x <= 1.0 + tolerance
                && point.y >= -tolerance
                && point.y <= 1.0 + tolerance
        })
    }

    /// Axis-aligned hull of the polygon in normalized space.
    ///
    /// Returns `None` for an empty polygon. This is the bbox<->polygon
    /// rectification used when a target format only understands boxes.
    pub fn bounding_box(&self) -> Option<BBoxXYXY<Normalized>> {
        let first = self.points.first()?;
        let mut xmin = first.x;
        let mut ymin = first.y;
        let mut xmax = first.x;
        let mut ymax = first.y;

        for point in &self.points[1..] {
            xmin = xmin.min(point.x);
            ymin = ymin.min(point.y);
            xmax = xmax.max(point.x);
            ymax = ymax.max(point.y);
        }

        Some(BBoxXYXY::from_xyxy(xmin, ymin, xmax, ymax))
    }

    /// Converts the vertex list to pixel space.
    pub fn to_pixel_points(&self, image_width: f64, image_height: f64) -> Vec<Coord<Pixel>> {
        self.points
            .iter()
            .map(|point| Coord::new(point.x * image_width, point.y * image_height))
            .collect()
    }

    /// Builds a polygon from pixel-space vertices.
    pub fn from_pixel_points(
        points: &[Coord<Pixel>],
        image_width: f64,
        image_height: f64,
    ) -> Self {
        Self {
            points: points
                .iter()
                .map(|point| Coord::new(point.x / image_width, point.y / image_height))
                .collect(),
        }
    }

    /// Converts the vertex list to a flat pixel-coordinate list
    /// `[x1, y1, x2, y2, ...]`.
    pub fn to_pixel_flat(&self, image_width: f64, image_height: f64) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.points.len() * 2);
        for point in &self.points {
            flat.push(point.x * image_width);
            flat.push(point.y * image_height);
        }
        flat
    }

    /// Builds a polygon from a flat pixel-coordinate list. Returns `None`
    /// for odd-length or too-short lists.
    pub fn from_pixel_flat(coords: &[f64], image_width: f64, image_height: f64) -> Option<Self> {
        if coords.len() % 2 != 0 || coords.len() < 6 {
            return None;
        }

        let points = coords
            .chunks_exact(2)
            .map(|pair| Coord::new(pair[0] / image_width, pair[1] / image_height))
            .collect();

        Some(Self { points })
    }

    /// Clamps every coordinate into [0,1].
    pub fn clamped(&self) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|point| Coord::new(point.x.clamp(0.0, 1.0), point.y.clamp(0.0, 1.0)))
                .collect(),
        }
    }
}

// Serialized as the flat coordinate list so IR JSON matches the wire shape
// used by YOLO-seg and the simple JSON format.
impl Serialize for Polygon {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_flat().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Polygon {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let flat = Vec::<f64>::deserialize(deserializer)?;
        Polygon::from_flat(&flat).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "polygon coordinate list has odd length {}",
                flat.len()
            ))
        })
    }
}
