//! Ultralytics-style YOLO segmentation reader and writer.
//!
//! Same directory layout as the detection format. Label lines with five
//! fields are plain boxes; longer lines are `class x1 y1 ... xn yn` polygon
//! vertex lists in normalized coordinates. Polygon annotations carry their
//! outline in the IR and get a pixel-space bounding box rectified from the
//! vertex hull.

use std::path::Path;

use super::io_yolo::{read_dataset, write_dataset, LabelMode};
use super::model::Dataset;
use crate::error::LabelportError;

/// Read a YOLO segmentation dataset directory into IR.
pub fn read_yolo_seg_dir(path: &Path) -> Result<Dataset, LabelportError> {
    read_dataset(path, LabelMode::BoxesAndPolygons)
}

/// Write an IR dataset as a YOLO segmentation directory.
///
/// Annotations with a polygon outline are written as vertex lists; plain box
/// annotations fall back to `class cx cy w h` lines.
pub fn write_yolo_seg_dir(path: &Path, dataset: &Dataset) -> Result<(), LabelportError> {
    write_dataset(path, dataset, LabelMode::BoxesAndPolygons)
}
