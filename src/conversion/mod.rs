//! Format dispatch and conversion reporting.
//!
//! Every conversion goes source format -> IR -> target format. This module
//! owns the [`Format`] enum, the read/write dispatch, and the lossiness
//! analysis that backs `--allow-lossy` gating.

pub mod report;

pub use report::{
    ConversionCounts, ConversionIssue, ConversionIssueCode, ConversionReport, ConversionSeverity,
};

use std::collections::HashSet;
use std::path::Path;

use crate::error::LabelportError;
use crate::ir::{io_coco_json, io_json, io_tfrecord, io_voc_xml, io_yolo, io_yolo_seg, Dataset};

/// Annotation format identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Yolo,
    YoloSeg,
    Voc,
    Json,
    Coco,
    IrJson,
    Tfrecord,
}

/// Classification of how lossy a format is relative to the IR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrLossiness {
    /// Format can represent everything in the IR (round-trip safe).
    Lossless,
    /// Format may lose some information depending on dataset content.
    Conditional,
    /// Format always loses some IR information.
    Lossy,
}

impl Format {
    /// Human-readable name for the format.
    pub fn name(&self) -> &'static str {
        match self {
            Format::Yolo => "yolo",
            Format::YoloSeg => "yolo-seg",
            Format::Voc => "voc",
            Format::Json => "json",
            Format::Coco => "coco",
            Format::IrJson => "ir-json",
            Format::Tfrecord => "tfrecord",
        }
    }

    /// All format names accepted on the command line.
    pub const NAMES: &'static str = "yolo, yolo-seg, voc, json, coco, ir-json, tfrecord";

    /// How lossy this format is relative to the IR.
    pub fn lossiness_relative_to_ir(&self) -> IrLossiness {
        match self {
            Format::IrJson => IrLossiness::Lossless,
            Format::Coco => IrLossiness::Conditional,
            Format::YoloSeg | Format::Json => IrLossiness::Conditional,
            Format::Yolo | Format::Voc | Format::Tfrecord => IrLossiness::Lossy,
        }
    }
}

impl std::str::FromStr for Format {
    type Err = LabelportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yolo" => Ok(Format::Yolo),
            "yolo-seg" | "yoloseg" => Ok(Format::YoloSeg),
            "voc" | "pascal-voc" => Ok(Format::Voc),
            "json" | "simple-json" => Ok(Format::Json),
            "coco" | "coco-json" => Ok(Format::Coco),
            "ir-json" => Ok(Format::IrJson),
            "tfrecord" => Ok(Format::Tfrecord),
            other => Err(LabelportError::UnsupportedFormat(format!(
                "'{}' (supported: {})",
                other,
                Format::NAMES
            ))),
        }
    }
}

/// Read a dataset in the given format into IR.
pub fn read_dataset(format: Format, path: &Path) -> Result<Dataset, LabelportError> {
    match format {
        Format::Yolo => io_yolo::read_yolo_dir(path),
        Format::YoloSeg => io_yolo_seg::read_yolo_seg_dir(path),
        Format::Voc => io_voc_xml::read_voc_dir(path),
        Format::Json => io_json::read_simple_json_dir(path),
        Format::Coco => io_coco_json::read_coco_json(path),
        Format::IrJson => io_json::read_ir_json(path),
        Format::Tfrecord => Err(LabelportError::UnsupportedFormat(
            "tfrecord is write-only; it cannot be used as a conversion source".to_string(),
        )),
    }
}

/// Write an IR dataset in the given format.
pub fn write_dataset(
    format: Format,
    path: &Path,
    dataset: &Dataset,
) -> Result<(), LabelportError> {
    match format {
        Format::Yolo => io_yolo::write_yolo_dir(path, dataset),
        Format::YoloSeg => io_yolo_seg::write_yolo_seg_dir(path, dataset),
        Format::Voc => io_voc_xml::write_voc_dir(path, dataset),
        Format::Json => io_json::write_simple_json_dir(path, dataset),
        Format::Coco => io_coco_json::write_coco_json(path, dataset),
        Format::IrJson => io_json::write_ir_json(path, dataset),
        Format::Tfrecord => io_tfrecord::write_tfrecord_dir(path, dataset, None).map(|_| ()),
    }
}

/// Build a conversion report analyzing what will happen during conversion.
pub fn build_conversion_report(dataset: &Dataset, from: Format, to: Format) -> ConversionReport {
    let mut report = ConversionReport::new(from.name(), to.name());

    report.input = ConversionCounts {
        images: dataset.images.len(),
        categories: dataset.categories.len(),
        annotations: dataset.annotations.len(),
    };
    report.output = report.input.clone();

    let polygon_count = dataset
        .annotations
        .iter()
        .filter(|ann| ann.segmentation.is_some())
        .count();
    let confidence_count = dataset
        .annotations
        .iter()
        .filter(|ann| ann.confidence.is_some())
        .count();
    let supercategory_count = dataset
        .categories
        .iter()
        .filter(|cat| cat.supercategory.is_some())
        .count();

    match to {
        Format::Yolo | Format::Voc => {
            if polygon_count > 0 {
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::DropPolygons,
                    format!(
                        "{} polygon outline(s) will be reduced to bounding boxes",
                        polygon_count
                    ),
                ));
            }
        }
        Format::YoloSeg | Format::Json | Format::Coco | Format::IrJson | Format::Tfrecord => {}
    }

    match to {
        Format::Yolo | Format::YoloSeg | Format::Voc | Format::Json | Format::Tfrecord => {
            if confidence_count > 0 {
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::DropConfidence,
                    format!(
                        "{} annotation(s) have confidence scores that will be dropped",
                        confidence_count
                    ),
                ));
            }

            if !dataset.info.is_empty() {
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::DropDatasetInfo,
                    "dataset info/metadata will be dropped".to_string(),
                ));
            }

            if supercategory_count > 0 {
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::DropSupercategory,
                    format!(
                        "{} category(s) have a supercategory that will be dropped",
                        supercategory_count
                    ),
                ));
            }
        }
        Format::Coco | Format::IrJson => {}
    }

    match to {
        Format::Yolo | Format::YoloSeg | Format::Json | Format::Tfrecord => {
            let attr_count = dataset
                .annotations
                .iter()
                .filter(|ann| !ann.attributes.is_empty())
                .count();
            if attr_count > 0 {
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::DropAttributes,
                    format!(
                        "{} annotation(s) have attributes that will be dropped",
                        attr_count
                    ),
                ));
            }
        }
        Format::Voc => {
            let non_voc_attr_count = dataset
                .annotations
                .iter()
                .filter(|ann| {
                    ann.attributes.keys().any(|key| {
                        !matches!(key.as_str(), "pose" | "truncated" | "difficult" | "occluded")
                    })
                })
                .count();
            if non_voc_attr_count > 0 {
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::DropAttributes,
                    format!(
                        "{} annotation(s) have attributes outside the VOC object fields",
                        non_voc_attr_count
                    ),
                ));
            }
        }
        Format::Coco | Format::IrJson => {}
    }

    match to {
        Format::Yolo | Format::YoloSeg => {
            let annotated: HashSet<_> = dataset.annotations.iter().map(|a| a.image_id).collect();
            let empty = dataset
                .images
                .iter()
                .filter(|img| !annotated.contains(&img.id))
                .count();
            if empty > 0 {
                report.add(ConversionIssue::info(
                    ConversionIssueCode::ImagesWithoutAnnotations,
                    format!("{} image(s) without annotations get empty label files", empty),
                ));
            }

            report.add(ConversionIssue::info(
                ConversionIssueCode::YoloWriterFloatPrecision,
                "normalized coordinates are written at 6 decimal places".to_string(),
            ));
        }
        Format::Voc => {
            report.add(ConversionIssue::info(
                ConversionIssueCode::VocWriterIntegerBoxes,
                "bndbox values are rounded to whole pixels".to_string(),
            ));
        }
        Format::Tfrecord => {
            report.add(ConversionIssue::info(
                ConversionIssueCode::TfrecordWriteOnly,
                "tfrecord output cannot be read back by this tool".to_string(),
            ));
        }
        Format::Json | Format::Coco | Format::IrJson => {}
    }

    match from {
        Format::Yolo | Format::YoloSeg | Format::Voc | Format::Json => {
            report.add(ConversionIssue::info(
                ConversionIssueCode::ReaderIdAssignment,
                "IDs are assigned deterministically by lexicographic file order".to_string(),
            ));
        }
        Format::Coco | Format::IrJson | Format::Tfrecord => {}
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Annotation, BBoxXYXY, Category, DatasetInfo, Image, Pixel, Polygon};

    fn seg_dataset() -> Dataset {
        let polygon = Polygon::from_flat(&[0.1, 0.1, 0.5, 0.1, 0.3, 0.6]).expect("polygon");
        Dataset {
            info: DatasetInfo {
                name: Some("Test Dataset".to_string()),
                ..Default::default()
            },
            images: vec![
                Image::new(1u64, "img1.jpg", 100, 100),
                Image::new(2u64, "img2.jpg", 100, 100),
            ],
            categories: vec![Category::with_supercategory(1u64, "cat", "animal")],
            annotations: vec![
                Annotation::from_polygon(1u64, 1u64, 1u64, polygon, 100.0, 100.0),
                Annotation::new(
                    2u64,
                    1u64,
                    1u64,
                    BBoxXYXY::<Pixel>::from_xyxy(10.0, 10.0, 50.0, 50.0),
                )
                .with_confidence(0.95),
            ],
        }
    }

    #[test]
    fn to_yolo_detects_polygon_and_confidence_loss() {
        let dataset = seg_dataset();
        let report = build_conversion_report(&dataset, Format::YoloSeg, Format::Yolo);

        assert!(report.is_lossy());
        assert!(report
            .issues
            .iter()
            .any(|i| i.code == ConversionIssueCode::DropPolygons));
        assert!(report
            .issues
            .iter()
            .any(|i| i.code == ConversionIssueCode::DropConfidence));
    }

    #[test]
    fn to_yolo_seg_keeps_polygons() {
        let dataset = seg_dataset();
        let report = build_conversion_report(&dataset, Format::Coco, Format::YoloSeg);

        assert!(!report
            .issues
            .iter()
            .any(|i| i.code == ConversionIssueCode::DropPolygons));
    }

    #[test]
    fn to_ir_json_is_not_lossy() {
        let dataset = seg_dataset();
        let report = build_conversion_report(&dataset, Format::Coco, Format::IrJson);

        assert!(!report.is_lossy());
        assert_eq!(report.warning_count(), 0);
    }

    #[test]
    fn to_coco_preserves_seg_dataset() {
        let dataset = seg_dataset();
        let report = build_conversion_report(&dataset, Format::YoloSeg, Format::Coco);

        assert!(!report.is_lossy());
    }

    #[test]
    fn directory_source_adds_id_policy_note() {
        let dataset = Dataset::default();
        let report = build_conversion_report(&dataset, Format::Voc, Format::Coco);

        assert!(report
            .issues
            .iter()
            .any(|i| i.code == ConversionIssueCode::ReaderIdAssignment));
    }

    #[test]
    fn tfrecord_read_is_rejected() {
        let err = read_dataset(Format::Tfrecord, Path::new("/nonexistent")).unwrap_err();
        assert!(matches!(err, LabelportError::UnsupportedFormat(_)));
    }
}
