//! Dataset statistics.
//!
//! This module analyzes datasets and produces structured statistics reports.

mod report;

pub use report::{
    BBoxStats, LabelCount, LabelsSection, PolygonStats, RangeStats, StatsReport, SummarySection,
};

use std::collections::{HashMap, HashSet};

use crate::ir::{CategoryId, Dataset, ImageId};

/// Options for dataset statistics.
#[derive(Clone, Debug)]
pub struct StatsOptions {
    /// Number of top labels to show in the histogram.
    pub top_labels: usize,
    /// Tolerance in pixels for out-of-bounds checks.
    pub oob_tolerance_px: f64,
    /// Width of histogram bars (in characters).
    pub bar_width: usize,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            top_labels: 10,
            oob_tolerance_px: 0.5,
            bar_width: 20,
        }
    }
}

/// Compute a full statistics report for a dataset.
pub fn stats_dataset(dataset: &Dataset, opts: &StatsOptions) -> StatsReport {
    let image_dims: HashMap<ImageId, (u32, u32)> = dataset
        .images
        .iter()
        .map(|img| (img.id, (img.width, img.height)))
        .collect();

    let category_names: HashMap<CategoryId, String> = dataset
        .categories
        .iter()
        .map(|cat| (cat.id, cat.name.clone()))
        .collect();

    StatsReport {
        summary: compute_summary(dataset),
        labels: compute_labels(dataset, &category_names, opts.top_labels),
        bboxes: compute_bbox_stats(dataset, &image_dims, opts.oob_tolerance_px),
        polygons: compute_polygon_stats(dataset),
        bar_width: opts.bar_width,
    }
}

/// Incremental min/mean/max accumulator.
#[derive(Default)]
struct RangeAcc {
    count: usize,
    min: f64,
    max: f64,
    sum: f64,
}

impl RangeAcc {
    fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    fn finish(&self) -> Option<RangeStats> {
        if self.count == 0 {
            return None;
        }
        Some(RangeStats {
            min: self.min,
            mean: self.sum / self.count as f64,
            max: self.max,
        })
    }
}

/// Compute summary section counts.
fn compute_summary(dataset: &Dataset) -> SummarySection {
    let annotated_image_ids: HashSet<ImageId> =
        dataset.annotations.iter().map(|ann| ann.image_id).collect();

    SummarySection {
        images: dataset.images.len(),
        categories: dataset.categories.len(),
        annotations: dataset.annotations.len(),
        annotated_images: annotated_image_ids.len(),
    }
}

/// Compute label distribution histogram.
fn compute_labels(
    dataset: &Dataset,
    category_names: &HashMap<CategoryId, String>,
    top_n: usize,
) -> LabelsSection {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for ann in &dataset.annotations {
        let label = category_names
            .get(&ann.category_id)
            .cloned()
            .unwrap_or_else(|| format!("<missing cat {}>", ann.category_id));

        *counts.entry(label).or_insert(0) += 1;
    }

    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let total_distinct = sorted.len();
    let total_annotations = dataset.annotations.len();

    let other_count: usize = sorted.iter().skip(top_n).map(|(_, count)| count).sum();
    sorted.truncate(top_n);

    let entries = sorted
        .into_iter()
        .map(|(label, count)| LabelCount { label, count })
        .collect();

    LabelsSection {
        top_n,
        total_distinct,
        total_annotations,
        entries,
        other_count,
    }
}

/// Compute bounding box statistics.
fn compute_bbox_stats(
    dataset: &Dataset,
    image_dims: &HashMap<ImageId, (u32, u32)>,
    tolerance: f64,
) -> BBoxStats {
    let mut stats = BBoxStats {
        total: dataset.annotations.len(),
        ..Default::default()
    };

    let mut width = RangeAcc::default();
    let mut height = RangeAcc::default();
    let mut area = RangeAcc::default();

    for ann in &dataset.annotations {
        let bbox = &ann.bbox;
        if !bbox.is_finite() || !bbox.is_ordered() {
            continue;
        }

        stats.valid += 1;
        width.push(bbox.width());
        height.push(bbox.height());
        area.push(bbox.area());

        if let Some(&(img_w, img_h)) = image_dims.get(&ann.image_id) {
            let is_oob = bbox.xmin() < -tolerance
                || bbox.ymin() < -tolerance
                || bbox.xmax() > img_w as f64 + tolerance
                || bbox.ymax() > img_h as f64 + tolerance;

            if is_oob {
                stats.out_of_bounds += 1;
            }
        }
    }

    stats.width = width.finish();
    stats.height = height.finish();
    stats.area = area.finish();
    stats
}

/// Compute polygon outline statistics.
fn compute_polygon_stats(dataset: &Dataset) -> PolygonStats {
    let mut vertices = RangeAcc::default();
    let mut total = 0usize;

    for ann in &dataset.annotations {
        if let Some(polygon) = &ann.segmentation {
            total += 1;
            vertices.push(polygon.point_count() as f64);
        }
    }

    PolygonStats {
        total,
        vertices: vertices.finish(),
    }
}
