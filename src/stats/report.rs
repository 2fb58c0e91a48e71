//! Stats report types and terminal formatting.
//!
//! Reports render as plain text (Display) or serialize as JSON.

use serde::Serialize;
use std::fmt;

/// The result of computing dataset statistics.
#[derive(Clone, Debug, Serialize)]
pub struct StatsReport {
    /// Summary counts for the dataset.
    pub summary: SummarySection,
    /// Label distribution histogram.
    pub labels: LabelsSection,
    /// Bounding box statistics.
    pub bboxes: BBoxStats,
    /// Polygon outline statistics.
    pub polygons: PolygonStats,
    /// Display-only option for histogram rendering width.
    #[serde(skip)]
    pub(crate) bar_width: usize,
}

/// Summary counts for the dataset.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SummarySection {
    /// Total number of images.
    pub images: usize,
    /// Total number of categories.
    pub categories: usize,
    /// Total number of annotations.
    pub annotations: usize,
    /// Number of images that have at least one annotation.
    pub annotated_images: usize,
}

/// Label distribution section.
#[derive(Clone, Debug, Default, Serialize)]
pub struct LabelsSection {
    /// How many top labels to show.
    pub top_n: usize,
    /// Total distinct labels seen on annotations.
    pub total_distinct: usize,
    /// Total annotations counted.
    pub total_annotations: usize,
    /// Top label entries (sorted by count descending).
    pub entries: Vec<LabelCount>,
    /// Sum of counts for labels not in the top N.
    pub other_count: usize,
}

/// A single label with its annotation count.
#[derive(Clone, Debug, Serialize)]
pub struct LabelCount {
    /// The category/label name.
    pub label: String,
    /// Number of annotations with this label.
    pub count: usize,
}

/// Min/mean/max over a set of measurements.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct RangeStats {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

/// Bounding box statistics in pixel units.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BBoxStats {
    /// Total annotations analyzed.
    pub total: usize,
    /// Annotations with finite, properly ordered boxes.
    pub valid: usize,
    /// Annotations extending outside their image bounds.
    pub out_of_bounds: usize,
    /// Width spread over valid boxes, if any exist.
    pub width: Option<RangeStats>,
    /// Height spread over valid boxes.
    pub height: Option<RangeStats>,
    /// Area spread over valid boxes.
    pub area: Option<RangeStats>,
}

/// Polygon outline statistics.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PolygonStats {
    /// Annotations carrying a polygon outline.
    pub total: usize,
    /// Vertex-count spread over polygons, if any exist.
    pub vertices: Option<RangeStats>,
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset statistics")?;
        writeln!(f)?;

        self.fmt_summary(f)?;
        writeln!(f)?;
        self.fmt_labels(f)?;
        writeln!(f)?;
        self.fmt_bboxes(f)?;
        writeln!(f)?;
        self.fmt_polygons(f)?;

        Ok(())
    }
}

impl StatsReport {
    fn fmt_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        writeln!(f, "Summary")?;
        writeln!(f, "  images:       {:>8}", s.images)?;
        writeln!(f, "  categories:   {:>8}", s.categories)?;
        writeln!(f, "  annotations:  {:>8}", s.annotations)?;
        writeln!(
            f,
            "  annotated:    {:>8} of {} ({})",
            s.annotated_images,
            s.images,
            fmt_percent(s.annotated_images, s.images)
        )?;
        Ok(())
    }

    fn fmt_labels(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l = &self.labels;

        if l.total_distinct > l.top_n {
            writeln!(f, "Labels (top {} of {})", l.top_n, l.total_distinct)?;
        } else {
            writeln!(f, "Labels ({})", l.total_distinct)?;
        }

        if l.entries.is_empty() {
            writeln!(f, "  no annotations")?;
            return Ok(());
        }

        let max_count = l.entries.iter().map(|e| e.count).max().unwrap_or(1);

        for entry in &l.entries {
            writeln!(
                f,
                "  {:<20} {:>7} {:>6}  {}",
                truncate_label(&entry.label, 20),
                entry.count,
                fmt_percent(entry.count, l.total_annotations),
                render_bar(entry.count, max_count, self.bar_width)
            )?;
        }

        if l.other_count > 0 {
            writeln!(
                f,
                "  {:<20} {:>7} {:>6}  {}",
                "(other)",
                l.other_count,
                fmt_percent(l.other_count, l.total_annotations),
                render_bar(l.other_count, max_count, self.bar_width)
            )?;
        }

        Ok(())
    }

    fn fmt_bboxes(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.bboxes;
        writeln!(f, "Bounding boxes")?;
        writeln!(
            f,
            "  total {}, valid {}, out of bounds {}",
            b.total, b.valid, b.out_of_bounds
        )?;

        match (&b.width, &b.height, &b.area) {
            (Some(width), Some(height), Some(area)) => {
                writeln!(f, "  width  (px):  {}", fmt_range(width))?;
                writeln!(f, "  height (px):  {}", fmt_range(height))?;
                writeln!(f, "  area  (px2):  {}", fmt_range(area))?;
            }
            _ => writeln!(f, "  no valid boxes to measure")?,
        }

        Ok(())
    }

    fn fmt_polygons(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.polygons;
        writeln!(f, "Polygons")?;
        writeln!(f, "  total {}", p.total)?;
        if let Some(vertices) = &p.vertices {
            writeln!(f, "  vertices:     {}", fmt_range(vertices))?;
        }
        Ok(())
    }
}

fn fmt_range(r: &RangeStats) -> String {
    format!("min {:>8.1}  mean {:>8.1}  max {:>8.1}", r.min, r.mean, r.max)
}

/// Format a percentage, handling zero denominators.
fn fmt_percent(numerator: usize, denominator: usize) -> String {
    if denominator == 0 {
        "n/a".to_string()
    } else {
        format!("{:.1}%", (numerator as f64 / denominator as f64) * 100.0)
    }
}

/// Render a horizontal bar using Unicode block characters.
fn render_bar(count: usize, max_count: usize, width: usize) -> String {
    if max_count == 0 || width == 0 {
        return String::new();
    }

    let filled = ((count * width) / max_count).min(width);
    "█".repeat(filled) + &"░".repeat(width - filled)
}

/// Truncate a label to fit in the display column.
fn truncate_label(label: &str, max_len: usize) -> String {
    if label.len() <= max_len {
        label.to_string()
    } else {
        format!("{}…", &label[..max_len - 1])
    }
}
