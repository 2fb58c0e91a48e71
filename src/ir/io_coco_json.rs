//! COCO JSON reader and writer.
//!
//! COCO bounding boxes are `[x, y, width, height]` with `(x, y)` the top-left
//! corner in absolute pixels; the IR keeps XYXY. Segmentation entries carry
//! polygon rings as flat pixel-coordinate lists; the first ring maps onto the
//! IR polygon (normalized), RLE masks are ignored.
//!
//! The writer sorts every list by ID so output is deterministic and diffs
//! stay meaningful.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::model::{Annotation, Category, Dataset, DatasetInfo, Image};
use super::polygon::Polygon;
use super::{AnnotationId, BBoxXYXY, CategoryId, ImageId, Pixel};
use crate::error::LabelportError;

#[derive(Debug, Serialize, Deserialize)]
struct CocoDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<CocoInfo>,

    images: Vec<CocoImage>,

    annotations: Vec<CocoAnnotation>,

    categories: Vec<CocoCategory>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CocoInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    year: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_created: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CocoImage {
    id: u64,
    width: u32,
    height: u32,
    file_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CocoCategory {
    id: u64,
    name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    supercategory: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CocoAnnotation {
    id: u64,
    image_id: u64,
    category_id: u64,

    /// COCO bbox format: [x, y, width, height] with (x,y) as top-left corner
    bbox: [f64; 4],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    area: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    iscrowd: Option<u8>,

    /// Polygon rings as flat pixel-coordinate lists. RLE objects land in the
    /// fallback arm and are ignored.
    #[serde(default)]
    segmentation: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
}

/// Reads a dataset from a COCO JSON file.
pub fn read_coco_json(path: &Path) -> Result<Dataset, LabelportError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let coco: CocoDataset =
        serde_json::from_reader(reader).map_err(|source| LabelportError::CocoJsonParse {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(coco_to_ir(coco))
}

/// Writes a dataset to a COCO JSON file.
pub fn write_coco_json(path: &Path, dataset: &Dataset) -> Result<(), LabelportError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);

    let coco = ir_to_coco(dataset);

    serde_json::to_writer_pretty(writer, &coco).map_err(|source| LabelportError::CocoJsonWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a dataset from a COCO JSON string. Useful for tests.
pub fn from_coco_str(json: &str) -> Result<Dataset, serde_json::Error> {
    let coco: CocoDataset = serde_json::from_str(json)?;
    Ok(coco_to_ir(coco))
}

/// Writes a dataset to a COCO JSON string. Useful for tests.
pub fn to_coco_string(dataset: &Dataset) -> Result<String, serde_json::Error> {
    let coco = ir_to_coco(dataset);
    serde_json::to_string_pretty(&coco)
}

fn coco_to_ir(coco: CocoDataset) -> Dataset {
    let info = if let Some(coco_info) = coco.info {
        DatasetInfo {
            name: None,
            version: coco_info.version,
            description: coco_info.description,
            year: coco_info.year,
            date_created: coco_info.date_created,
        }
    } else {
        DatasetInfo::default()
    };

    let dims_by_image: BTreeMap<u64, (f64, f64)> = coco
        .images
        .iter()
        .map(|img| (img.id, (img.width as f64, img.height as f64)))
        .collect();

    let images = coco
        .images
        .into_iter()
        .map(|img| Image::new(img.id, img.file_name, img.width, img.height))
        .collect();

    let categories = coco
        .categories
        .into_iter()
        .map(|cat| Category {
            id: CategoryId::new(cat.id),
            name: cat.name,
            supercategory: cat.supercategory,
        })
        .collect();

    let annotations = coco
        .annotations
        .into_iter()
        .map(|ann| {
            let [x, y, w, h] = ann.bbox;
            let bbox = BBoxXYXY::<Pixel>::from_xywh(x, y, w, h);

            let mut annotation = Annotation::new(
                AnnotationId::new(ann.id),
                ImageId::new(ann.image_id),
                CategoryId::new(ann.category_id),
                bbox,
            );

            if let Some(dims) = dims_by_image.get(&ann.image_id) {
                annotation.segmentation = first_polygon_ring(&ann.segmentation)
                    .and_then(|ring| Polygon::from_pixel_flat(&ring, dims.0, dims.1));
            }

            if let Some(score) = ann.score {
                annotation.confidence = Some(score);
            }

            if let Some(iscrowd) = ann.iscrowd {
                annotation
                    .attributes
                    .insert("iscrowd".to_string(), iscrowd.to_string());
            }

            // Stored for round-trip preservation.
            if let Some(area) = ann.area {
                annotation
                    .attributes
                    .insert("area".to_string(), format!("{:.6}", area));
            }

            annotation
        })
        .collect();

    Dataset {
        info,
        images,
        categories,
        annotations,
    }
}

fn first_polygon_ring(segmentation: &serde_json::Value) -> Option<Vec<f64>> {
    let rings = segmentation.as_array()?;
    let first = rings.first()?.as_array()?;

    let mut coords = Vec::with_capacity(first.len());
    for value in first {
        coords.push(value.as_f64()?);
    }

    if coords.len() % 2 == 0 && coords.len() >= 6 {
        Some(coords)
    } else {
        None
    }
}

fn ir_to_coco(dataset: &Dataset) -> CocoDataset {
    let info = if dataset.info.is_empty() {
        None
    } else {
        Some(CocoInfo {
            year: dataset.info.year,
            version: dataset.info.version.clone(),
            description: dataset.info.description.clone(),
            date_created: dataset.info.date_created.clone(),
        })
    };

    let dims_by_image: BTreeMap<ImageId, (f64, f64)> = dataset
        .images
        .iter()
        .map(|img| (img.id, (img.width as f64, img.height as f64)))
        .collect();

    let mut images: Vec<CocoImage> = dataset
        .images
        .iter()
        .map(|img| CocoImage {
            id: img.id.as_u64(),
            width: img.width,
            height: img.height,
            file_name: img.file_name.clone(),
        })
        .collect();
    images.sort_by_key(|i| i.id);

    let mut categories: Vec<CocoCategory> = dataset
        .categories
        .iter()
        .map(|cat| CocoCategory {
            id: cat.id.as_u64(),
            name: cat.name.clone(),
            supercategory: cat.supercategory.clone(),
        })
        .collect();
    categories.sort_by_key(|c| c.id);

    let mut annotations: Vec<CocoAnnotation> = dataset
        .annotations
        .iter()
        .map(|ann| {
            let (x, y, w, h) = ann.bbox.to_xywh();

            let area = ann
                .attributes
                .get("area")
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or_else(|| ann.bbox.area());

            let iscrowd = ann
                .attributes
                .get("iscrowd")
                .and_then(|s| s.parse::<u8>().ok())
                .unwrap_or(0);

            let segmentation = match (&ann.segmentation, dims_by_image.get(&ann.image_id)) {
                (Some(polygon), Some(dims)) => {
                    let ring: Vec<serde_json::Value> = polygon
                        .to_pixel_flat(dims.0, dims.1)
                        .into_iter()
                        .map(|v| serde_json::json!(v))
                        .collect();
                    serde_json::Value::Array(vec![serde_json::Value::Array(ring)])
                }
                _ => serde_json::Value::Array(vec![]),
            };

            CocoAnnotation {
                id: ann.id.as_u64(),
                image_id: ann.image_id.as_u64(),
                category_id: ann.category_id.as_u64(),
                bbox: [x, y, w, h],
                area: Some(area),
                iscrowd: Some(iscrowd),
                segmentation,
                score: ann.confidence,
            }
        })
        .collect();
    annotations.sort_by_key(|a| a.id);

    CocoDataset {
        info,
        images,
        annotations,
        categories,
    }
}
