//! Comparison report types and terminal formatting.

use serde::Serialize;
use std::fmt;

/// The result of comparing two datasets.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CompareReport {
    /// Image overlap by file name.
    pub images: OverlapCounts,
    /// Category overlap by label name.
    pub categories: OverlapCounts,
    /// Annotation totals per side.
    pub annotations: SideCounts,
    /// Images without any annotation, per side.
    pub unannotated_images: SideCounts,
    /// Per-label annotation counts across both sides.
    pub labels: Vec<LabelDelta>,
    /// Image file names present only on the left (truncated to `max_listed`).
    pub files_only_in_left: Vec<String>,
    /// Image file names present only on the right (truncated to `max_listed`).
    pub files_only_in_right: Vec<String>,
    /// Listing cap applied to the file name lists.
    pub max_listed: usize,
}

/// Shared / left-only / right-only counts.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct OverlapCounts {
    pub shared: usize,
    pub only_in_left: usize,
    pub only_in_right: usize,
}

/// A count measured on each side.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct SideCounts {
    pub left: usize,
    pub right: usize,
}

impl SideCounts {
    /// Right minus left, the direction a retraining pass would grow by.
    pub fn delta(&self) -> i64 {
        self.right as i64 - self.left as i64
    }
}

/// Annotation counts for one label across both datasets.
#[derive(Clone, Debug, Serialize)]
pub struct LabelDelta {
    /// The category/label name.
    pub label: String,
    /// Annotation count on the left.
    pub left: usize,
    /// Annotation count on the right.
    pub right: usize,
}

impl LabelDelta {
    pub fn delta(&self) -> i64 {
        self.right as i64 - self.left as i64
    }
}

impl CompareReport {
    /// True when both sides hold the same images, labels and counts.
    pub fn is_identical(&self) -> bool {
        self.images.only_in_left == 0
            && self.images.only_in_right == 0
            && self.categories.only_in_left == 0
            && self.categories.only_in_right == 0
            && self.annotations.delta() == 0
            && self.labels.iter().all(|row| row.delta() == 0)
    }
}

impl fmt::Display for CompareReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset comparison (left vs right):")?;
        writeln!(
            f,
            "  Images:      {} shared, {} only left, {} only right",
            self.images.shared, self.images.only_in_left, self.images.only_in_right
        )?;
        writeln!(
            f,
            "  Categories:  {} shared, {} only left, {} only right",
            self.categories.shared, self.categories.only_in_left, self.categories.only_in_right
        )?;
        writeln!(
            f,
            "  Annotations: {} left, {} right ({:+})",
            self.annotations.left,
            self.annotations.right,
            self.annotations.delta()
        )?;
        if self.unannotated_images.left > 0 || self.unannotated_images.right > 0 {
            writeln!(
                f,
                "  Unannotated: {} left, {} right",
                self.unannotated_images.left, self.unannotated_images.right
            )?;
        }

        if !self.labels.is_empty() {
            writeln!(f)?;
            writeln!(f, "Per-label annotation counts:")?;
            for row in &self.labels {
                writeln!(
                    f,
                    "  {:<20} {} -> {} ({:+})",
                    row.label,
                    row.left,
                    row.right,
                    row.delta()
                )?;
            }
        }

        write_file_list(f, "Images only in left", &self.files_only_in_left, self.max_listed)?;
        write_file_list(f, "Images only in right", &self.files_only_in_right, self.max_listed)?;

        Ok(())
    }
}

fn write_file_list(
    f: &mut fmt::Formatter<'_>,
    heading: &str,
    names: &[String],
    max_listed: usize,
) -> fmt::Result {
    if names.is_empty() {
        return Ok(());
    }
    writeln!(f)?;
    if names.len() >= max_listed {
        writeln!(f, "{} (first {}):", heading, max_listed)?;
    } else {
        writeln!(f, "{}:", heading)?;
    }
    for name in names {
        writeln!(f, "  - {}", name)?;
    }
    Ok(())
}
