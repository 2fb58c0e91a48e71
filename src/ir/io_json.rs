//! JSON readers and writers.
//!
//! Two JSON surfaces live here. The IR JSON helpers serialize the [`Dataset`]
//! struct directly and are handy for debugging conversions and for the
//! `validate` command. The simple JSON format is a per-image annotation shape:
//!
//! ```json
//! {
//!   "file_name": "img.jpg",
//!   "width": 1920,
//!   "height": 1080,
//!   "annotations": [
//!     {"label": "cat", "bbox": [xmin, ymin, xmax, ymax]},
//!     {"label": "cat", "polygon": [x1, y1, x2, y2, x3, y3]}
//!   ]
//! }
//! ```
//!
//! The reader accepts either a batch `annotations.json` with an `images`
//! array of such entries, or one `.json` file per image. The writer emits
//! per-image files. Boxes are pixel XYXY; polygons are normalized.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::model::{Annotation, Category, Dataset, DatasetInfo, Image};
use super::polygon::Polygon;
use super::{AnnotationId, BBoxXYXY, CategoryId, ImageId, Pixel};
use crate::error::LabelportError;

/// Reads a dataset from a JSON file in the labelport IR format.
pub fn read_ir_json(path: &Path) -> Result<Dataset, LabelportError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| LabelportError::IrJsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes a dataset to a JSON file in the labelport IR format.
pub fn write_ir_json(path: &Path, dataset: &Dataset) -> Result<(), LabelportError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, dataset).map_err(|source| LabelportError::IrJsonWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a dataset from an IR JSON string. Useful for tests.
pub fn from_json_str(json: &str) -> Result<Dataset, serde_json::Error> {
    serde_json::from_str(json)
}

/// Writes a dataset to an IR JSON string. Useful for tests.
pub fn to_json_string(dataset: &Dataset) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(dataset)
}

#[derive(Debug, Serialize, Deserialize)]
struct SimpleBatch {
    images: Vec<SimpleEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SimpleEntry {
    file_name: String,
    width: u32,
    height: u32,
    annotations: Vec<SimpleAnnotation>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SimpleAnnotation {
    label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    bbox: Option<[f64; 4]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    polygon: Option<Vec<f64>>,
}

/// Reads a simple JSON dataset directory into IR.
///
/// Prefers a batch `annotations.json`; otherwise every `.json` file under
/// the directory tree is treated as one per-image entry.
pub fn read_simple_json_dir(path: &Path) -> Result<Dataset, LabelportError> {
    let batch_path = path.join("annotations.json");

    let mut entries = Vec::new();
    if batch_path.is_file() {
        let file = File::open(&batch_path)?;
        let batch: SimpleBatch = serde_json::from_reader(BufReader::new(file)).map_err(
            |source| LabelportError::SimpleJsonParse {
                path: batch_path.clone(),
                source,
            },
        )?;
        entries = batch.images;
    } else {
        let mut json_files: Vec<_> = WalkDir::new(path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.into_path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|ext| ext.to_str())
                        .map(|ext| ext.eq_ignore_ascii_case("json"))
                        .unwrap_or(false)
            })
            .collect();
        json_files.sort();

        for json_path in json_files {
            let file = File::open(&json_path)?;
            let entry: SimpleEntry = serde_json::from_reader(BufReader::new(file)).map_err(
                |source| LabelportError::SimpleJsonParse {
                    path: json_path.clone(),
                    source,
                },
            )?;
            entries.push(entry);
        }
    }

    entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    let mut label_names = BTreeSet::new();
    for entry in &entries {
        for ann in &entry.annotations {
            label_names.insert(ann.label.clone());
        }
    }

    let categories: Vec<Category> = label_names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| Category::new((idx + 1) as u64, name))
        .collect();

    let category_id_by_name: std::collections::BTreeMap<&str, CategoryId> = categories
        .iter()
        .map(|cat| (cat.name.as_str(), cat.id))
        .collect();

    let mut images = Vec::with_capacity(entries.len());
    let mut annotations = Vec::new();
    let mut next_annotation_id: u64 = 1;

    for (index, entry) in entries.into_iter().enumerate() {
        let image_id = ImageId::new((index + 1) as u64);
        images.push(Image::new(
            image_id,
            entry.file_name.clone(),
            entry.width,
            entry.height,
        ));

        for ann in entry.annotations {
            let category_id = category_id_by_name[ann.label.as_str()];
            let annotation_id = AnnotationId::new(next_annotation_id);

            let annotation = match (ann.bbox, ann.polygon) {
                (_, Some(coords)) => {
                    let polygon = Polygon::from_flat(&coords).ok_or_else(|| {
                        LabelportError::SimpleJsonInvalid {
                            path: path.to_path_buf(),
                            message: format!(
                                "polygon for '{}' must have even coordinate count >= 6",
                                entry.file_name
                            ),
                        }
                    })?;
                    Annotation::from_polygon(
                        annotation_id,
                        image_id,
                        category_id,
                        polygon,
                        entry.width as f64,
                        entry.height as f64,
                    )
                }
                (Some([xmin, ymin, xmax, ymax]), None) => Annotation::new(
                    annotation_id,
                    image_id,
                    category_id,
                    BBoxXYXY::<Pixel>::from_xyxy(xmin, ymin, xmax, ymax),
                ),
                (None, None) => continue,
            };

            annotations.push(annotation);
            next_annotation_id += 1;
        }
    }

    Ok(Dataset {
        info: DatasetInfo::default(),
        images,
        categories,
        annotations,
    })
}

/// Writes an IR dataset as per-image simple JSON files.
pub fn write_simple_json_dir(path: &Path, dataset: &Dataset) -> Result<(), LabelportError> {
    fs::create_dir_all(path)?;

    let category_name_by_id: std::collections::BTreeMap<CategoryId, &str> = dataset
        .categories
        .iter()
        .map(|cat| (cat.id, cat.name.as_str()))
        .collect();

    let mut images_sorted: Vec<&Image> = dataset.images.iter().collect();
    images_sorted.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    for image in images_sorted {
        let mut anns: Vec<&Annotation> = dataset
            .annotations
            .iter()
            .filter(|ann| ann.image_id == image.id)
            .collect();
        anns.sort_by_key(|ann| ann.id);

        let mut simple_annotations = Vec::with_capacity(anns.len());
        for ann in anns {
            let label = category_name_by_id
                .get(&ann.category_id)
                .copied()
                .ok_or_else(|| LabelportError::SimpleJsonInvalid {
                    path: path.to_path_buf(),
                    message: format!(
                        "annotation {} references missing category {}",
                        ann.id.as_u64(),
                        ann.category_id.as_u64()
                    ),
                })?;

            simple_annotations.push(match &ann.segmentation {
                Some(polygon) => SimpleAnnotation {
                    label: label.to_string(),
                    bbox: None,
                    polygon: Some(polygon.to_flat()),
                },
                None => SimpleAnnotation {
                    label: label.to_string(),
                    bbox: Some([
                        ann.bbox.xmin(),
                        ann.bbox.ymin(),
                        ann.bbox.xmax(),
                        ann.bbox.ymax(),
                    ]),
                    polygon: None,
                },
            });
        }

        let entry = SimpleEntry {
            file_name: image.file_name.clone(),
            width: image.width,
            height: image.height,
            annotations: simple_annotations,
        };

        // Keep the relative path so train/a.jpg and val/a.jpg do not
        // collide on one a.json.
        let out_path = path.join(Path::new(&image.file_name).with_extension("json"));
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&out_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &entry).map_err(|source| {
            LabelportError::SimpleJsonWrite {
                path: out_path.clone(),
                source,
            }
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Annotation, BBoxXYXY, Category, Dataset, DatasetInfo, Image, Pixel};

    fn sample_dataset() -> Dataset {
        Dataset {
            info: DatasetInfo {
                name: Some("Test Dataset".into()),
                version: Some("1.0".into()),
                ..Default::default()
            },
            images: vec![
                Image::new(1u64, "image001.jpg", 640, 480),
                Image::new(2u64, "image002.jpg", 1920, 1080),
            ],
            categories: vec![
                Category::new(1u64, "person"),
                Category::with_supercategory(2u64, "dog", "animal"),
            ],
            annotations: vec![
                Annotation::new(
                    1u64,
                    1u64,
                    1u64,
                    BBoxXYXY::<Pixel>::from_xyxy(10.0, 20.0, 100.0, 200.0),
                ),
                Annotation::new(
                    2u64,
                    1u64,
                    2u64,
                    BBoxXYXY::<Pixel>::from_xyxy(50.0, 60.0, 150.0, 160.0),
                )
                .with_confidence(0.95),
            ],
        }
    }

    #[test]
    fn ir_json_roundtrip() {
        let original = sample_dataset();

        let json = to_json_string(&original).expect("serialization failed");
        let restored: Dataset = from_json_str(&json).expect("deserialization failed");

        assert_eq!(original.images.len(), restored.images.len());
        assert_eq!(original.categories.len(), restored.categories.len());
        assert_eq!(original.annotations.len(), restored.annotations.len());

        assert_eq!(restored.info.name, Some("Test Dataset".into()));
        assert_eq!(restored.images[0].file_name, "image001.jpg");
        assert_eq!(restored.categories[1].supercategory, Some("animal".into()));
        assert_eq!(restored.annotations[1].confidence, Some(0.95));
    }

    #[test]
    fn read_simple_json_batch_file() {
        let temp = tempfile::tempdir().expect("create temp dir");
        fs::write(
            temp.path().join("annotations.json"),
            r#"{
                "images": [
                    {
                        "file_name": "img1.jpg",
                        "width": 100,
                        "height": 50,
                        "annotations": [
                            {"label": "cat", "bbox": [10, 5, 40, 30]},
                            {"label": "dog", "polygon": [0.1, 0.2, 0.5, 0.2, 0.3, 0.8]}
                        ]
                    }
                ]
            }"#,
        )
        .expect("write batch file");

        let dataset = read_simple_json_dir(temp.path()).expect("read dataset");

        assert_eq!(dataset.images.len(), 1);
        assert_eq!(dataset.categories.len(), 2);
        assert_eq!(dataset.annotations.len(), 2);

        // Labels are sorted, so cat gets id 1.
        assert_eq!(dataset.categories[0].name, "cat");
        assert_eq!(dataset.categories[1].name, "dog");

        assert!(dataset.annotations[0].segmentation.is_none());
        assert_eq!(dataset.annotations[0].bbox.xmin(), 10.0);

        let polygon = dataset.annotations[1]
            .segmentation
            .as_ref()
            .expect("polygon annotation");
        assert_eq!(polygon.point_count(), 3);
    }

    #[test]
    fn read_simple_json_per_image_files() {
        let temp = tempfile::tempdir().expect("create temp dir");
        fs::write(
            temp.path().join("img1.json"),
            r#"{"file_name": "img1.jpg", "width": 100, "height": 100,
                "annotations": [{"label": "cat", "bbox": [0, 0, 10, 10]}]}"#,
        )
        .expect("write per-image file");
        fs::write(
            temp.path().join("img2.json"),
            r#"{"file_name": "img2.jpg", "width": 200, "height": 200, "annotations": []}"#,
        )
        .expect("write per-image file");

        let dataset = read_simple_json_dir(temp.path()).expect("read dataset");

        assert_eq!(dataset.images.len(), 2);
        assert_eq!(dataset.annotations.len(), 1);
        assert_eq!(dataset.images[0].file_name, "img1.jpg");
        assert_eq!(dataset.images[1].file_name, "img2.jpg");
    }

    #[test]
    fn write_simple_json_emits_per_image_files() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let dataset = sample_dataset();

        write_simple_json_dir(temp.path(), &dataset).expect("write dataset");

        let entry: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(temp.path().join("image001.json")).expect("read entry"),
        )
        .expect("parse entry");

        assert_eq!(entry["file_name"], "image001.jpg");
        assert_eq!(entry["width"], 640);
        assert_eq!(entry["annotations"][0]["label"], "person");
        assert_eq!(entry["annotations"][0]["bbox"][2], 100.0);

        assert!(temp.path().join("image002.json").is_file());
    }

    #[test]
    fn write_simple_json_keeps_same_stem_in_different_dirs_apart() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let dataset = Dataset {
            images: vec![
                Image::new(1u64, "train/a.jpg", 100, 100),
                Image::new(2u64, "val/a.jpg", 200, 200),
            ],
            categories: vec![Category::new(1u64, "cat")],
            annotations: vec![Annotation::new(
                1u64,
                1u64,
                1u64,
                BBoxXYXY::<Pixel>::from_xyxy(0.0, 0.0, 10.0, 10.0),
            )],
            ..Default::default()
        };

        write_simple_json_dir(temp.path(), &dataset).expect("write dataset");

        assert!(temp.path().join("train/a.json").is_file());
        assert!(temp.path().join("val/a.json").is_file());

        let restored = read_simple_json_dir(temp.path()).expect("read dataset");
        assert_eq!(restored.images.len(), 2);
        assert_eq!(restored.images[0].file_name, "train/a.jpg");
        assert_eq!(restored.images[1].file_name, "val/a.jpg");
        assert_eq!(restored.annotations.len(), 1);
    }
}
