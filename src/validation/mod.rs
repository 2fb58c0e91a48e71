//! Dataset validation for labelport.
//!
//! This module provides comprehensive validation of datasets, checking for:
//! - Structural integrity (unique IDs, valid references)
//! - Data quality (non-empty names, valid dimensions)
//! - Geometric validity (proper bounding boxes, polygons within range)

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::{HashMap, HashSet};

use crate::ir::{AnnotationId, CategoryId, Dataset, ImageId};

/// Tolerance in pixels when checking that a box stays inside its image.
const BOUNDS_TOLERANCE: f64 = 0.5;

/// Tolerance when checking that polygon coordinates stay in [0, 1].
const POLYGON_RANGE_TOLERANCE: f64 = 1e-6;

/// Options for validation behavior.
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// If true, treat warnings as errors.
    pub strict: bool,
}

/// Validates a dataset and returns a report of all issues found.
///
/// This function performs comprehensive validation including:
/// - Checking for duplicate IDs (images, annotations, categories)
/// - Verifying all references are valid (image_id, category_id in annotations)
/// - Validating image dimensions are positive
/// - Validating category and file names are non-empty
/// - Checking bounding box validity (finite, ordered, within bounds)
/// - Checking polygon validity (finite, enough vertices, normalized range)
pub fn validate_dataset(dataset: &Dataset, _opts: &ValidateOptions) -> ValidationReport {
    let mut report = ValidationReport::new();

    // Build lookup sets for reference validation
    let image_ids: HashSet<ImageId> = dataset.images.iter().map(|i| i.id).collect();
    let category_ids: HashSet<CategoryId> = dataset.categories.iter().map(|c| c.id).collect();

    validate_images(dataset, &mut report);
    validate_categories(dataset, &mut report);
    validate_annotations(dataset, &image_ids, &category_ids, &mut report);

    report
}

/// Validates all images in the dataset.
fn validate_images(dataset: &Dataset, report: &mut ValidationReport) {
    let mut seen_ids: HashMap<ImageId, usize> = HashMap::new();

    for (idx, image) in dataset.images.iter().enumerate() {
        let id = image.id.as_u64();

        if let Some(first_idx) = seen_ids.get(&image.id) {
            report.add(ValidationIssue::error(
                IssueCode::DuplicateImageId,
                format!(
                    "Duplicate image ID {} (first seen at index {})",
                    id, first_idx
                ),
                IssueContext::Image { id },
            ));
        } else {
            seen_ids.insert(image.id, idx);
        }

        if image.width == 0 || image.height == 0 {
            report.add(ValidationIssue::error(
                IssueCode::InvalidImageDimensions,
                format!(
                    "Invalid dimensions {}x{} (must be positive)",
                    image.width, image.height
                ),
                IssueContext::Image { id },
            ));
        }

        if image.file_name.is_empty() {
            report.add(ValidationIssue::warning(
                IssueCode::EmptyFileName,
                "Empty filename",
                IssueContext::Image { id },
            ));
        }
    }
}

/// Validates all categories in the dataset.
fn validate_categories(dataset: &Dataset, report: &mut ValidationReport) {
    let mut seen_ids: HashMap<CategoryId, usize> = HashMap::new();
    let mut seen_names: HashMap<&str, CategoryId> = HashMap::new();

    for (idx, category) in dataset.categories.iter().enumerate() {
        let id = category.id.as_u64();

        if let Some(first_idx) = seen_ids.get(&category.id) {
            report.add(ValidationIssue::error(
                IssueCode::DuplicateCategoryId,
                format!(
                    "Duplicate category ID {} (first seen at index {})",
                    id, first_idx
                ),
                IssueContext::Category { id },
            ));
        } else {
            seen_ids.insert(category.id, idx);
        }

        if category.name.is_empty() {
            report.add(ValidationIssue::warning(
                IssueCode::EmptyCategoryName,
                "Empty category name",
                IssueContext::Category { id },
            ));
        } else if let Some(first_id) = seen_names.get(category.name.as_str()) {
            // Duplicate names are a warning only, they may be intentional
            report.add(ValidationIssue::warning(
                IssueCode::DuplicateCategoryName,
                format!(
                    "Duplicate category name '{}' (also used by category {})",
                    category.name, first_id
                ),
                IssueContext::Category { id },
            ));
        } else {
            seen_names.insert(&category.name, category.id);
        }
    }
}

/// Validates all annotations in the dataset.
fn validate_annotations(
    dataset: &Dataset,
    image_ids: &HashSet<ImageId>,
    category_ids: &HashSet<CategoryId>,
    report: &mut ValidationReport,
) {
    let mut seen_ids: HashMap<AnnotationId, usize> = HashMap::new();

    // Image dimension lookup for bounds checking
    let image_dims: HashMap<ImageId, (u32, u32)> = dataset
        .images
        .iter()
        .map(|i| (i.id, (i.width, i.height)))
        .collect();

    for (idx, annotation) in dataset.annotations.iter().enumerate() {
        let id = annotation.id.as_u64();

        if let Some(first_idx) = seen_ids.get(&annotation.id) {
            report.add(ValidationIssue::error(
                IssueCode::DuplicateAnnotationId,
                format!(
                    "Duplicate annotation ID {} (first seen at index {})",
                    id, first_idx
                ),
                IssueContext::Annotation { id },
            ));
        } else {
            seen_ids.insert(annotation.id, idx);
        }

        if !image_ids.contains(&annotation.image_id) {
            report.add(ValidationIssue::error(
                IssueCode::MissingImageRef,
                format!("References non-existent image {}", annotation.image_id),
                IssueContext::Annotation { id },
            ));
        }

        if !category_ids.contains(&annotation.category_id) {
            report.add(ValidationIssue::error(
                IssueCode::MissingCategoryRef,
                format!(
                    "References non-existent category {}",
                    annotation.category_id
                ),
                IssueContext::Annotation { id },
            ));
        }

        validate_bbox(annotation, &image_dims, report);

        if let Some(polygon) = &annotation.segmentation {
            validate_polygon(id, polygon, report);
        }
    }
}

/// Validates a single annotation's bounding box.
fn validate_bbox(
    annotation: &crate::ir::Annotation,
    image_dims: &HashMap<ImageId, (u32, u32)>,
    report: &mut ValidationReport,
) {
    let id = annotation.id.as_u64();
    let bbox = &annotation.bbox;

    if !bbox.is_finite() {
        report.add(ValidationIssue::error(
            IssueCode::BBoxNotFinite,
            format!(
                "Non-finite coordinates ({}, {}, {}, {})",
                bbox.xmin(),
                bbox.ymin(),
                bbox.xmax(),
                bbox.ymax()
            ),
            IssueContext::Annotation { id },
        ));
        // Further bbox checks are meaningless on NaN/Infinity
        return;
    }

    if !bbox.is_ordered() {
        report.add(ValidationIssue::error(
            IssueCode::InvalidBBoxOrdering,
            format!(
                "Invalid ordering: min ({}, {}) should be <= max ({}, {})",
                bbox.xmin(),
                bbox.ymin(),
                bbox.xmax(),
                bbox.ymax()
            ),
            IssueContext::Annotation { id },
        ));
    }

    let area = bbox.area();
    if area <= 0.0 {
        report.add(ValidationIssue::warning(
            IssueCode::InvalidBBoxArea,
            format!("Zero or negative area: {:.2}", area),
            IssueContext::Annotation { id },
        ));
    }

    if let Some((width, height)) = image_dims.get(&annotation.image_id) {
        let (w, h) = (*width as f64, *height as f64);

        if bbox.xmin() < -BOUNDS_TOLERANCE
            || bbox.ymin() < -BOUNDS_TOLERANCE
            || bbox.xmax() > w + BOUNDS_TOLERANCE
            || bbox.ymax() > h + BOUNDS_TOLERANCE
        {
            report.add(ValidationIssue::error(
                IssueCode::BBoxOutOfBounds,
                format!(
                    "Bounding box ({:.1}, {:.1}, {:.1}, {:.1}) extends outside image bounds (0, 0, {}, {})",
                    bbox.xmin(), bbox.ymin(), bbox.xmax(), bbox.ymax(), width, height
                ),
                IssueContext::Annotation { id },
            ));
        }
    }
}

/// Validates a single annotation's polygon outline.
fn validate_polygon(id: u64, polygon: &crate::ir::Polygon, report: &mut ValidationReport) {
    if !polygon.is_finite() {
        report.add(ValidationIssue::error(
            IssueCode::PolygonNotFinite,
            "Polygon has non-finite coordinates",
            IssueContext::Annotation { id },
        ));
        return;
    }

    if !polygon.has_enough_points() {
        report.add(ValidationIssue::error(
            IssueCode::PolygonTooFewPoints,
            format!(
                "Polygon has {} vertices (at least 3 required)",
                polygon.point_count()
            ),
            IssueContext::Annotation { id },
        ));
    }

    if !polygon.in_unit_range(POLYGON_RANGE_TOLERANCE) {
        report.add(ValidationIssue::warning(
            IssueCode::PolygonOutOfRange,
            "Polygon coordinates fall outside the normalized [0, 1] range",
            IssueContext::Annotation { id },
        ));
    }
}
