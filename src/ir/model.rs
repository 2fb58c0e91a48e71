//! Core dataset model for the labelport intermediate representation.
//!
//! This module defines the canonical format-agnostic representation of
//! detection/segmentation datasets. All format-specific readers convert to
//! this IR, and all writers convert from it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::bbox::BBoxXYXY;
use super::ids::{AnnotationId, CategoryId, ImageId};
use super::polygon::Polygon;
use super::space::Pixel;

/// A complete annotation dataset in the labelport IR format.
///
/// This is the central data structure that all format conversions work
/// through. Formats parse into this representation, and this representation
/// renders out to target formats.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Metadata about the dataset (name, version, etc.)
    #[serde(default)]
    pub info: DatasetInfo,

    /// All images in the dataset.
    pub images: Vec<Image>,

    /// All category definitions.
    pub categories: Vec<Category>,

    /// All annotations (boxes, optionally with polygon outlines).
    pub annotations: Vec<Annotation>,
}

/// Metadata about the dataset.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Optional name of the dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Optional version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Optional year the dataset was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,

    /// Optional date the dataset was created (ISO 8601 or similar).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
}

impl DatasetInfo {
    /// Returns true if no metadata field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.version.is_none()
            && self.description.is_none()
            && self.year.is_none()
            && self.date_created.is_none()
    }
}

/// An image in the dataset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Image {
    /// Unique identifier for this image.
    pub id: ImageId,

    /// Filename or path of the image, relative to the dataset root.
    pub file_name: String,

    /// Width of the image in pixels.
    pub width: u32,

    /// Height of the image in pixels.
    pub height: u32,

    /// Additional attributes (e.g. VOC "depth").
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Image {
    /// Creates a new image with the given properties.
    pub fn new(
        id: impl Into<ImageId>,
        file_name: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            width,
            height,
            attributes: BTreeMap::new(),
        }
    }
}

/// A category (class label) in the dataset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier for this category.
    pub id: CategoryId,

    /// Name of the category (e.g., "person", "car", "dog").
    pub name: String,

    /// Optional supercategory for hierarchical taxonomies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
}

impl Category {
    /// Creates a new category with the given properties.
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            supercategory: None,
        }
    }

    /// Creates a new category with a supercategory.
    pub fn with_supercategory(
        id: impl Into<CategoryId>,
        name: impl Into<String>,
        supercategory: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            supercategory: Some(supercategory.into()),
        }
    }
}

/// An annotation in the dataset.
///
/// Every annotation carries a pixel-space box. Segmentation annotations
/// additionally carry the polygon outline the box was rectified from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Annotation {
    /// Unique identifier for this annotation.
    pub id: AnnotationId,

    /// ID of the image this annotation belongs to.
    pub image_id: ImageId,

    /// ID of the category (class) for this annotation.
    pub category_id: CategoryId,

    /// Bounding box in pixel coordinates (XYXY format).
    pub bbox: BBoxXYXY<Pixel>,

    /// Optional polygon outline in normalized [0,1] coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Polygon>,

    /// Optional confidence score (e.g., from model predictions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Additional attributes (e.g., "occluded", "truncated", "iscrowd").
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Annotation {
    /// Creates a new box annotation with the minimum required fields.
    pub fn new(
        id: impl Into<AnnotationId>,
        image_id: impl Into<ImageId>,
        category_id: impl Into<CategoryId>,
        bbox: BBoxXYXY<Pixel>,
    ) -> Self {
        Self {
            id: id.into(),
            image_id: image_id.into(),
            category_id: category_id.into(),
            bbox,
            segmentation: None,
            confidence: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Creates a segmentation annotation.
    ///
    /// The bounding box is rectified from the polygon's axis-aligned hull
    /// scaled into pixel space; a degenerate (empty) polygon yields the
    /// default zero box and is left for validation to flag.
    pub fn from_polygon(
        id: impl Into<AnnotationId>,
        image_id: impl Into<ImageId>,
        category_id: impl Into<CategoryId>,
        polygon: Polygon,
        image_width: f64,
        image_height: f64,
    ) -> Self {
        let bbox = polygon
            .bounding_box()
            .map(|hull| hull.to_pixel(image_width, image_height))
            .unwrap_or_default();

        Self {
            id: id.into(),
            image_id: image_id.into(),
            category_id: category_id.into(),
            bbox,
            segmentation: Some(polygon),
            confidence: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds a confidence score to the annotation.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Adds an attribute to the annotation.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_creation() {
        let dataset = Dataset {
            info: DatasetInfo {
                name: Some("Test Dataset".into()),
                ..Default::default()
            },
            images: vec![Image::new(1u64, "image001.jpg", 640, 480)],
            categories: vec![Category::new(1u64, "person")],
            annotations: vec![Annotation::new(
                1u64,
                1u64,
                1u64,
                BBoxXYXY::from_xyxy(10.0, 20.0, 100.0, 200.0),
            )],
        };

        assert_eq!(dataset.images.len(), 1);
        assert_eq!(dataset.categories.len(), 1);
        assert_eq!(dataset.annotations.len(), 1);
    }

    #[test]
    fn annotation_builder_pattern() {
        let annotation =
            Annotation::new(1u64, 1u64, 1u64, BBoxXYXY::from_xyxy(0.0, 0.0, 50.0, 50.0))
                .with_confidence(0.95)
                .with_attribute("occluded", "false")
                .with_attribute("truncated", "true");

        assert_eq!(annotation.confidence, Some(0.95));
        assert_eq!(annotation.attributes.len(), 2);
        assert!(annotation.segmentation.is_none());
    }

    #[test]
    fn from_polygon_rectifies_bbox() {
        let polygon = Polygon::from_flat(&[0.1, 0.2, 0.5, 0.2, 0.3, 0.8]).expect("even length");
        let annotation = Annotation::from_polygon(1u64, 1u64, 1u64, polygon, 100.0, 50.0);

        let bbox = annotation.bbox;
        assert!((bbox.xmin() - 10.0).abs() < 1e-9);
        assert!((bbox.ymin() - 10.0).abs() < 1e-9);
        assert!((bbox.xmax() - 50.0).abs() < 1e-9);
        assert!((bbox.ymax() - 40.0).abs() < 1e-9);
        assert!(annotation.segmentation.is_some());
    }
}
