//! Ultralytics-style YOLO detection reader and writer.
//!
//! Handles directory-based datasets with `images/` and `labels/` trees,
//! optionally split into `train/`, `val/` and `test/` subdirectories. Subset
//! membership is preserved through the relative file name (`train/img.jpg`).
//! The segmentation variant in [`super::io_yolo_seg`] shares the layout and
//! line-parsing machinery defined here.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use super::model::{Annotation, Category, Dataset, DatasetInfo, Image};
use super::polygon::Polygon;
use super::{AnnotationId, BBoxXYXY, CategoryId, ImageId, Normalized};
use crate::error::LabelportError;

pub(super) const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "png", "jpeg", "bmp", "webp"];
pub(super) const LABEL_EXTENSION: &str = "txt";

/// Controls which label-line shapes a reader or writer accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum LabelMode {
    /// Detection only: every line must be `class cx cy w h`.
    BoxesOnly,
    /// Segmentation: 5-field lines are boxes, longer lines are polygons.
    BoxesAndPolygons,
}

/// Read a YOLO detection dataset directory into IR.
///
/// `path` may be the dataset root containing `images/` + `labels/`, or the
/// `labels/` directory itself. Lines with more than five fields are rejected
/// with a pointer at the yolo-seg format.
pub fn read_yolo_dir(path: &Path) -> Result<Dataset, LabelportError> {
    read_dataset(path, LabelMode::BoxesOnly)
}

/// Write an IR dataset as a YOLO detection directory.
///
/// Creates `images/` + `labels/` trees mirroring each image's relative file
/// name and writes `data.yaml`. Image binaries are not copied. Polygon
/// outlines are reduced to their bounding boxes.
pub fn write_yolo_dir(path: &Path, dataset: &Dataset) -> Result<(), LabelportError> {
    write_dataset(path, dataset, LabelMode::BoxesOnly)
}

pub(super) fn read_dataset(path: &Path, mode: LabelMode) -> Result<Dataset, LabelportError> {
    let layout = discover_layout(path)?;
    let class_map = load_class_map(&layout, mode)?;

    let mut image_files = collect_files_with_extensions(&layout.images_dir, &IMAGE_EXTENSIONS)?;
    image_files.sort_by_cached_key(|image_path| rel_string(&layout.images_dir, image_path));

    let mut images = Vec::with_capacity(image_files.len());
    let mut image_lookup: BTreeMap<String, ImageMeta> = BTreeMap::new();

    for (index, image_path) in image_files.iter().enumerate() {
        let rel = rel_string(&layout.images_dir, image_path);
        let (width, height) = read_image_dimensions(image_path)?;
        let image_id = ImageId::new((index + 1) as u64);

        images.push(Image::new(image_id, rel.clone(), width, height));
        image_lookup.insert(
            rel,
            ImageMeta {
                id: image_id,
                width,
                height,
            },
        );
    }

    let categories: Vec<Category> = class_map
        .names
        .iter()
        .enumerate()
        .map(|(i, name)| Category::new((i + 1) as u64, name.clone()))
        .collect();

    let mut label_files = collect_files_with_extensions(&layout.labels_dir, &[LABEL_EXTENSION])?;
    label_files.sort_by_cached_key(|label_path| rel_string(&layout.labels_dir, label_path));

    let mut annotations = Vec::new();
    let mut next_annotation_id: u64 = 1;

    for label_path in label_files {
        let label_rel = label_path.strip_prefix(&layout.labels_dir).map_err(|_| {
            LabelportError::YoloLayoutInvalid {
                path: label_path.clone(),
                message: format!(
                    "label path '{}' is outside labels dir '{}'",
                    label_path.display(),
                    layout.labels_dir.display()
                ),
            }
        })?;

        let image_path = find_image_for_label(&layout.images_dir, label_rel).ok_or_else(|| {
            LabelportError::YoloImageNotFound {
                label_path: label_path.clone(),
                expected_stem: rel_string(&layout.labels_dir, &label_path.with_extension("")),
            }
        })?;

        let image_rel = rel_string(&layout.images_dir, &image_path);
        let image_meta =
            image_lookup
                .get(&image_rel)
                .ok_or_else(|| LabelportError::YoloImageNotFound {
                    label_path: label_path.clone(),
                    expected_stem: rel_string(&layout.labels_dir, &label_path.with_extension("")),
                })?;

        let content = fs::read_to_string(&label_path)?;
        for (line_idx, line) in content.lines().enumerate() {
            let line_num = line_idx + 1;
            let Some(row) = parse_label_line(line, &label_path, line_num, mode)? else {
                continue;
            };

            if row.class_id >= class_map.names.len() {
                return Err(LabelportError::YoloLabelParse {
                    path: label_path.clone(),
                    line: line_num,
                    message: format!(
                        "class_id {} is out of range for class map with {} class(es)",
                        row.class_id,
                        class_map.names.len()
                    ),
                });
            }

            let annotation_id = AnnotationId::new(next_annotation_id);
            let category_id = CategoryId::new(row.class_id as u64 + 1);

            let annotation = match row.geometry {
                RowGeometry::Box { cx, cy, w, h } => {
                    let bbox_norm = BBoxXYXY::<Normalized>::from_cxcywh(cx, cy, w, h);
                    let bbox_px =
                        bbox_norm.to_pixel(image_meta.width as f64, image_meta.height as f64);
                    Annotation::new(annotation_id, image_meta.id, category_id, bbox_px)
                }
                RowGeometry::Polygon(coords) => {
                    let polygon = Polygon::from_flat(&coords).ok_or_else(|| {
                        LabelportError::YoloLabelParse {
                            path: label_path.clone(),
                            line: line_num,
                            message: "polygon coordinate list has odd length".to_string(),
                        }
                    })?;
                    Annotation::from_polygon(
                        annotation_id,
                        image_meta.id,
                        category_id,
                        polygon,
                        image_meta.width as f64,
                        image_meta.height as f64,
                    )
                }
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

pub(super) fn write_dataset(
    path: &Path,
    dataset: &Dataset,
    mode: LabelMode,
) -> Result<(), LabelportError> {
    fs::create_dir_all(path)?;

    let images_dir = path.join("images");
    let labels_dir = path.join("labels");
    fs::create_dir_all(&images_dir)?;
    fs::create_dir_all(&labels_dir)?;

    let image_lookup: BTreeMap<ImageId, &Image> =
        dataset.images.iter().map(|img| (img.id, img)).collect();

    let mut categories_sorted: Vec<&Category> = dataset.categories.iter().collect();
    categories_sorted.sort_by_key(|cat| cat.id);

    let category_to_class: BTreeMap<CategoryId, usize> = categories_sorted
        .iter()
        .enumerate()
        .map(|(idx, cat)| (cat.id, idx))
        .collect();

    let mut annotations_by_image: BTreeMap<ImageId, Vec<&Annotation>> = BTreeMap::new();
    for ann in &dataset.annotations {
        if !image_lookup.contains_key(&ann.image_id) {
            return Err(LabelportError::YoloWriteError {
                path: path.to_path_buf(),
                message: format!(
                    "annotation {} references missing image {}",
                    ann.id.as_u64(),
                    ann.image_id.as_u64()
                ),
            });
        }

        if !category_to_class.contains_key(&ann.category_id) {
            return Err(LabelportError::YoloWriteError {
                path: path.to_path_buf(),
                message: format!(
                    "annotation {} references missing category {}",
                    ann.id.as_u64(),
                    ann.category_id.as_u64()
                ),
            });
        }

        annotations_by_image
            .entry(ann.image_id)
            .or_default()
            .push(ann);
    }

    let mut images_sorted: Vec<&Image> = dataset.images.iter().collect();
    images_sorted.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    for image in images_sorted {
        let label_rel_path = Path::new(&image.file_name).with_extension(LABEL_EXTENSION);
        let label_path = labels_dir.join(&label_rel_path);

        if let Some(parent) = label_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut label_file = fs::File::create(&label_path)?;

        let mut anns = annotations_by_image.remove(&image.id).unwrap_or_default();
        anns.sort_by_key(|ann| ann.id);

        for ann in anns {
            let class_id = category_to_class[&ann.category_id];

            let polygon_line = match (mode, &ann.segmentation) {
                (LabelMode::BoxesAndPolygons, Some(polygon)) => Some(polygon),
                _ => None,
            };

            match polygon_line {
                Some(polygon) => {
                    write!(label_file, "{}", class_id)?;
                    for value in polygon.to_flat() {
                        write!(label_file, " {:.6}", value)?;
                    }
                    writeln!(label_file)?;
                }
                None => {
                    let bbox_norm = ann
                        .bbox
                        .to_normalized(image.width as f64, image.height as f64);
                    let (cx, cy, w, h) = bbox_norm.to_cxcywh();
                    writeln!(
                        label_file,
                        "{} {:.6} {:.6} {:.6} {:.6}",
                        class_id, cx, cy, w, h
                    )?;
                }
            }
        }
    }

    write_data_yaml(path, &categories_sorted)?;

    Ok(())
}

#[derive(Clone, Copy)]
struct ImageMeta {
    id: ImageId,
    width: u32,
    height: u32,
}

#[derive(Clone, Debug)]
struct YoloLayout {
    #[cfg_attr(not(test), allow(dead_code))]
    root: PathBuf,
    images_dir: PathBuf,
    labels_dir: PathBuf,
    class_source: ClassSource,
}

#[derive(Clone, Debug)]
enum ClassSource {
    DataYaml(PathBuf),
    ClassesTxt(PathBuf),
    Inferred,
}

#[derive(Debug)]
struct ClassMap {
    names: Vec<String>,
}

#[derive(Debug, PartialEq)]
struct LabelRow {
    class_id: usize,
    geometry: RowGeometry,
}

#[derive(Debug, PartialEq)]
enum RowGeometry {
    Box { cx: f64, cy: f64, w: f64, h: f64 },
    Polygon(Vec<f64>),
}

fn discover_layout(input: &Path) -> Result<YoloLayout, LabelportError> {
    if !input.is_dir() {
        return Err(LabelportError::YoloLayoutInvalid {
            path: input.to_path_buf(),
            message: "input must be a directory".to_string(),
        });
    }

    let (root, labels_dir) = if input.join("labels").is_dir() {
        (input.to_path_buf(), input.join("labels"))
    } else if is_dir_named(input, "labels") {
        let root = input
            .parent()
            .ok_or_else(|| LabelportError::YoloLayoutInvalid {
                path: input.to_path_buf(),
                message: "labels directory has no parent directory".to_string(),
            })?
            .to_path_buf();
        (root, input.to_path_buf())
    } else {
        return Err(LabelportError::YoloLayoutInvalid {
            path: input.to_path_buf(),
            message:
                "expected a YOLO dataset root containing labels/ or a labels/ directory itself"
                    .to_string(),
        });
    };

    let images_dir = root.join("images");
    if !images_dir.is_dir() {
        return Err(LabelportError::YoloLayoutInvalid {
            path: images_dir,
            message: "missing images/ directory".to_string(),
        });
    }

    let data_yaml = root.join("data.yaml");
    let classes_txt = root.join("classes.txt");
    let class_source = if data_yaml.is_file() {
        ClassSource::DataYaml(data_yaml)
    } else if classes_txt.is_file() {
        ClassSource::ClassesTxt(classes_txt)
    } else {
        ClassSource::Inferred
    };

    Ok(YoloLayout {
        root,
        images_dir,
        labels_dir,
        class_source,
    })
}

fn load_class_map(layout: &YoloLayout, mode: LabelMode) -> Result<ClassMap, LabelportError> {
    match &layout.class_source {
        ClassSource::DataYaml(path) => read_data_yaml_names(path),
        ClassSource::ClassesTxt(path) => read_classes_txt(path),
        ClassSource::Inferred => infer_class_map(&layout.labels_dir, mode),
    }
}

#[derive(Debug, Deserialize)]
struct DataYaml {
    names: DataYamlNames,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DataYamlNames {
    Sequence(Vec<String>),
    Mapping(BTreeMap<usize, String>),
}

fn read_data_yaml_names(path: &Path) -> Result<ClassMap, LabelportError> {
    let data = fs::read_to_string(path)?;
    let parsed: DataYaml =
        serde_yaml::from_str(&data).map_err(|source| LabelportError::YoloDataYamlParse {
            path: path.to_path_buf(),
            source,
        })?;

    let names = match parsed.names {
        DataYamlNames::Sequence(names) => names,
        DataYamlNames::Mapping(mapping) => {
            if mapping.is_empty() {
                Vec::new()
            } else {
                let max_index = *mapping.keys().max().expect("checked non-empty");
                let mut names = vec![String::new(); max_index + 1];
                for (index, name) in mapping {
                    names[index] = name;
                }
                for (index, name) in names.iter_mut().enumerate() {
                    if name.trim().is_empty() {
                        *name = format!("class_{}", index);
                    }
                }
                names
            }
        }
    };

    Ok(ClassMap { names })
}

fn write_data_yaml(output_root: &Path, categories: &[&Category]) -> Result<(), LabelportError> {
    let mut yaml = String::new();
    yaml.push_str("train: images/train\n");
    yaml.push_str("val: images/val\n");
    yaml.push_str(&format!("nc: {}\n", categories.len()));
    yaml.push_str("names:\n");
    for (idx, category) in categories.iter().enumerate() {
        yaml.push_str(&format!(
            "  {}: {}\n",
            idx,
            yaml_single_quoted(&category.name)
        ));
    }

    let path = output_root.join("data.yaml");
    fs::write(&path, yaml)?;
    Ok(())
}

fn yaml_single_quoted(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

fn read_classes_txt(path: &Path) -> Result<ClassMap, LabelportError> {
    let data = fs::read_to_string(path)?;
    let mut names = Vec::new();

    for (line_idx, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(LabelportError::YoloClassesTxtInvalid {
                path: path.to_path_buf(),
                message: format!("line {} is empty", line_idx + 1),
            });
        }
        names.push(trimmed.to_string());
    }

    Ok(ClassMap { names })
}

fn infer_class_map(labels_dir: &Path, mode: LabelMode) -> Result<ClassMap, LabelportError> {
    let mut label_files = collect_files_with_extensions(labels_dir, &[LABEL_EXTENSION])?;
    label_files.sort_by_cached_key(|label_path| rel_string(labels_dir, label_path));

    let mut class_ids = BTreeSet::new();

    for label_path in label_files {
        let content = fs::read_to_string(&label_path)?;
        for (line_idx, line) in content.lines().enumerate() {
            let line_num = line_idx + 1;
            let Some(row) = parse_label_line(line, &label_path, line_num, mode)? else {
                continue;
            };
            class_ids.insert(row.class_id);
        }
    }

    let max_class_id = class_ids.into_iter().max();
    let names = match max_class_id {
        Some(max_id) => (0..=max_id).map(|id| format!("class_{}", id)).collect(),
        None => Vec::new(),
    };

    Ok(ClassMap { names })
}

pub(super) fn collect_files_with_extensions(
    root: &Path,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, LabelportError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|source| LabelportError::YoloLayoutInvalid {
            path: root.to_path_buf(),
            message: format!("failed while traversing directory: {source}"),
        })?;

        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}

pub(super) fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}

pub(super) fn read_image_dimensions(path: &Path) -> Result<(u32, u32), LabelportError> {
    let size = imagesize::size(path).map_err(|source| LabelportError::ImageDimensionRead {
        path: path.to_path_buf(),
        source,
    })?;

    let width: u32 = size
        .width
        .try_into()
        .map_err(|_| LabelportError::YoloLayoutInvalid {
            path: path.to_path_buf(),
            message: format!("image width {} does not fit in u32", size.width),
        })?;

    let height: u32 = size
        .height
        .try_into()
        .map_err(|_| LabelportError::YoloLayoutInvalid {
            path: path.to_path_buf(),
            message: format!("image height {} does not fit in u32", size.height),
        })?;

    Ok((width, height))
}

fn find_image_for_label(images_dir: &Path, label_rel_path: &Path) -> Option<PathBuf> {
    let stem_rel_path = label_rel_path.with_extension("");
    for ext in IMAGE_EXTENSIONS {
        let candidate = images_dir.join(&stem_rel_path).with_extension(ext);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn parse_label_line(
    line: &str,
    file_path: &Path,
    line_num: usize,
    mode: LabelMode,
) -> Result<Option<LabelRow>, LabelportError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();

    if tokens.len() < 5 {
        return Err(LabelportError::YoloLabelParse {
            path: file_path.to_path_buf(),
            line: line_num,
            message: format!("expected at least 5 fields, found {}", tokens.len()),
        });
    }

    let class_id = tokens[0]
        .parse::<usize>()
        .map_err(|_| LabelportError::YoloLabelParse {
            path: file_path.to_path_buf(),
            line: line_num,
            message: format!(
                "invalid class_id '{}'; expected non-negative integer",
                tokens[0]
            ),
        })?;

    if tokens.len() == 5 {
        let cx = parse_f64_token(tokens[1], "x_center", file_path, line_num)?;
        let cy = parse_f64_token(tokens[2], "y_center", file_path, line_num)?;
        let w = parse_f64_token(tokens[3], "width", file_path, line_num)?;
        let h = parse_f64_token(tokens[4], "height", file_path, line_num)?;

        return Ok(Some(LabelRow {
            class_id,
            geometry: RowGeometry::Box { cx, cy, w, h },
        }));
    }

    if mode == LabelMode::BoxesOnly {
        return Err(LabelportError::YoloLabelParse {
            path: file_path.to_path_buf(),
            line: line_num,
            message: format!(
                "found {} fields; polygon rows belong to the yolo-seg format",
                tokens.len()
            ),
        });
    }

    let coord_count = tokens.len() - 1;
    if coord_count % 2 != 0 || coord_count < 6 {
        return Err(LabelportError::YoloLabelParse {
            path: file_path.to_path_buf(),
            line: line_num,
            message: format!(
                "polygon rows need an even coordinate count of at least 6, found {}",
                coord_count
            ),
        });
    }

    let mut coords = Vec::with_capacity(coord_count);
    for token in &tokens[1..] {
        coords.push(parse_f64_token(token, "polygon coordinate", file_path, line_num)?);
    }

    Ok(Some(LabelRow {
        class_id,
        geometry: RowGeometry::Polygon(coords),
    }))
}

fn parse_f64_token(
    raw: &str,
    field_name: &str,
    file_path: &Path,
    line_num: usize,
) -> Result<f64, LabelportError> {
    raw.parse::<f64>()
        .map_err(|_| LabelportError::YoloLabelParse {
            path: file_path.to_path_buf(),
            line: line_num,
            message: format!("invalid {field_name} '{raw}'; expected floating-point number"),
        })
}

fn is_dir_named(path: &Path, dir_name: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.eq_ignore_ascii_case(dir_name))
        .unwrap_or(false)
}

pub(super) fn rel_string(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}
