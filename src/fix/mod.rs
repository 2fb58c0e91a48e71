//! Dataset repair pass.
//!
//! Where validation only reports problems, the fixer mutates geometry into a
//! state validation would accept: box corners are clamped to the image
//! bounds, polygon vertices are clamped to [0,1], and annotations whose
//! geometry cannot be salvaged are dropped. Every repair is counted so the
//! caller can report what changed.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::LabelportError;
use crate::ir::{Dataset, ImageId};

/// Options for the repair pass.
#[derive(Clone, Debug, Default)]
pub struct FixOptions {
    /// If set, drop boxes whose normalized area (box area divided by image
    /// area) falls below this threshold.
    pub min_area: Option<f64>,
}

/// Validate fix options before running.
pub fn validate_fix_options(opts: &FixOptions) -> Result<(), LabelportError> {
    if let Some(min_area) = opts.min_area {
        if !min_area.is_finite() || !(0.0..=1.0).contains(&min_area) {
            return Err(LabelportError::InvalidFixParams {
                message: "--min-area must be a finite value in [0.0, 1.0]".to_string(),
            });
        }
    }
    Ok(())
}

/// Counts of repairs applied by [`fix_dataset`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct FixReport {
    /// Boxes whose corners were pulled back inside the image bounds.
    pub boxes_clamped: usize,
    /// Annotations dropped because the box had NaN or infinite coordinates.
    pub boxes_dropped_not_finite: usize,
    /// Annotations dropped because the box had min >= max on either axis.
    pub boxes_dropped_inverted: usize,
    /// Annotations dropped by the `--min-area` threshold.
    pub boxes_dropped_below_min_area: usize,
    /// Polygons whose vertices were pulled back into [0, 1].
    pub polygons_clamped: usize,
    /// Polygon outlines removed (fewer than 3 vertices or non-finite);
    /// the box annotation itself is kept.
    pub polygons_dropped: usize,
}

impl FixReport {
    /// Total number of repairs applied.
    pub fn total_fixes(&self) -> usize {
        self.boxes_clamped
            + self.boxes_dropped_not_finite
            + self.boxes_dropped_inverted
            + self.boxes_dropped_below_min_area
            + self.polygons_clamped
            + self.polygons_dropped
    }

    /// Returns true if nothing needed repair.
    pub fn is_clean(&self) -> bool {
        self.total_fixes() == 0
    }
}

impl fmt::Display for FixReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return writeln!(f, "Fix pass: nothing to repair");
        }

        writeln!(f, "Fix pass applied {} repair(s):", self.total_fixes())?;
        if self.boxes_clamped > 0 {
            writeln!(f, "  {} box(es) clamped to image bounds", self.boxes_clamped)?;
        }
        if self.boxes_dropped_not_finite > 0 {
            writeln!(
                f,
                "  {} box(es) dropped with non-finite coordinates",
                self.boxes_dropped_not_finite
            )?;
        }
        if self.boxes_dropped_inverted > 0 {
            writeln!(
                f,
                "  {} box(es) dropped with inverted corners",
                self.boxes_dropped_inverted
            )?;
        }
        if self.boxes_dropped_below_min_area > 0 {
            writeln!(
                f,
                "  {} box(es) dropped below the minimum area",
                self.boxes_dropped_below_min_area
            )?;
        }
        if self.polygons_clamped > 0 {
            writeln!(
                f,
                "  {} polygon(s) clamped to the [0, 1] range",
                self.polygons_clamped
            )?;
        }
        if self.polygons_dropped > 0 {
            writeln!(
                f,
                "  {} polygon outline(s) removed (degenerate or non-finite)",
                self.polygons_dropped
            )?;
        }
        Ok(())
    }
}

/// Repairs a dataset's geometry.
///
/// Returns the repaired dataset and a count of every change made. Annotations
/// whose image reference cannot be resolved keep their coordinates untouched;
/// validation reports the dangling reference separately.
pub fn fix_dataset(
    dataset: &Dataset,
    opts: &FixOptions,
) -> Result<(Dataset, FixReport), LabelportError> {
    validate_fix_options(opts)?;

    let image_dims: HashMap<ImageId, (f64, f64)> = dataset
        .images
        .iter()
        .map(|i| (i.id, (i.width as f64, i.height as f64)))
        .collect();

    let mut report = FixReport::default();
    let mut fixed = dataset.clone();

    fixed.annotations.retain_mut(|annotation| {
        if !annotation.bbox.is_finite() {
            report.boxes_dropped_not_finite += 1;
            return false;
        }
        if !annotation.bbox.is_ordered() {
            report.boxes_dropped_inverted += 1;
            return false;
        }

        let dims = image_dims.get(&annotation.image_id).copied();

        if let Some((width, height)) = dims {
            let clamped = annotation.bbox.clamped(0.0, 0.0, width, height);
            if clamped != annotation.bbox {
                annotation.bbox = clamped;
                report.boxes_clamped += 1;
            }

            if let Some(min_area) = opts.min_area {
                let image_area = width * height;
                if image_area > 0.0 && annotation.bbox.area() / image_area < min_area {
                    report.boxes_dropped_below_min_area += 1;
                    return false;
                }
            }
        }

        if let Some(polygon) = &annotation.segmentation {
            if !polygon.is_finite() || !polygon.has_enough_points() {
                annotation.segmentation = None;
                report.polygons_dropped += 1;
            } else if !polygon.in_unit_range(0.0) {
                annotation.segmentation = Some(polygon.clamped());
                report.polygons_clamped += 1;
            }
        }

        true
    });

    Ok((fixed, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Annotation, BBoxXYXY, Category, Image, Pixel, Polygon};

    fn dataset_with_bbox(bbox: BBoxXYXY<Pixel>) -> Dataset {
        Dataset {
            images: vec![Image::new(1u64, "a.jpg", 100, 100)],
            categories: vec![Category::new(1u64, "person")],
            annotations: vec![Annotation::new(1u64, 1u64, 1u64, bbox)],
            ..Default::default()
        }
    }

    #[test]
    fn clamps_out_of_bounds_box() {
        let dataset = dataset_with_bbox(BBoxXYXY::from_xyxy(-5.0, 10.0, 120.0, 90.0));
        let (fixed, report) = fix_dataset(&dataset, &FixOptions::default()).unwrap();

        assert_eq!(report.boxes_clamped, 1);
        let bbox = fixed.annotations[0].bbox;
        assert_eq!(bbox.xmin(), 0.0);
        assert_eq!(bbox.xmax(), 100.0);
        assert_eq!(bbox.ymax(), 90.0);
    }

    #[test]
    fn drops_non_finite_box() {
        let dataset = dataset_with_bbox(BBoxXYXY::from_xyxy(f64::NAN, 10.0, 50.0, 90.0));
        let (fixed, report) = fix_dataset(&dataset, &FixOptions::default()).unwrap();

        assert_eq!(report.boxes_dropped_not_finite, 1);
        assert!(fixed.annotations.is_empty());
    }

    #[test]
    fn drops_inverted_box() {
        let dataset = dataset_with_bbox(BBoxXYXY::from_xyxy(50.0, 10.0, 20.0, 90.0));
        let (fixed, report) = fix_dataset(&dataset, &FixOptions::default()).unwrap();

        assert_eq!(report.boxes_dropped_inverted, 1);
        assert!(fixed.annotations.is_empty());
    }

    #[test]
    fn min_area_drops_tiny_box() {
        // 2x2 box in a 100x100 image: normalized area 0.0004
        let dataset = dataset_with_bbox(BBoxXYXY::from_xyxy(10.0, 10.0, 12.0, 12.0));
        let opts = FixOptions {
            min_area: Some(0.001),
        };
        let (fixed, report) = fix_dataset(&dataset, &opts).unwrap();

        assert_eq!(report.boxes_dropped_below_min_area, 1);
        assert!(fixed.annotations.is_empty());
    }

    #[test]
    fn clamps_out_of_range_polygon() {
        let mut dataset = dataset_with_bbox(BBoxXYXY::from_xyxy(10.0, 10.0, 50.0, 50.0));
        dataset.annotations[0].segmentation =
            Some(Polygon::from_flat(&[0.1, 0.2, 1.4, 0.2, 0.3, -0.1]).unwrap());

        let (fixed, report) = fix_dataset(&dataset, &FixOptions::default()).unwrap();
        assert_eq!(report.polygons_clamped, 1);

        let polygon = fixed.annotations[0].segmentation.as_ref().unwrap();
        assert!(polygon.in_unit_range(0.0));
    }

    #[test]
    fn removes_degenerate_polygon_keeps_box() {
        let mut dataset = dataset_with_bbox(BBoxXYXY::from_xyxy(10.0, 10.0, 50.0, 50.0));
        dataset.annotations[0].segmentation = Some(Polygon::from_flat(&[0.1, 0.2, 0.5, 0.2]).unwrap());

        let (fixed, report) = fix_dataset(&dataset, &FixOptions::default()).unwrap();
        assert_eq!(report.polygons_dropped, 1);
        assert_eq!(fixed.annotations.len(), 1);
        assert!(fixed.annotations[0].segmentation.is_none());
    }

    #[test]
    fn rejects_bad_min_area() {
        let opts = FixOptions {
            min_area: Some(-0.5),
        };
        assert!(validate_fix_options(&opts).is_err());
    }

    #[test]
    fn clean_dataset_reports_nothing() {
        let dataset = dataset_with_bbox(BBoxXYXY::from_xyxy(10.0, 10.0, 50.0, 50.0));
        let (_, report) = fix_dataset(&dataset, &FixOptions::default()).unwrap();
        assert!(report.is_clean());
    }
}
