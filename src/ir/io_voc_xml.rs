//! Pascal VOC XML reader and writer.
//!
//! Supports the common VOC layout with an `Annotations/` directory holding
//! one XML file per image. Nested subdirectories under `Annotations/` are
//! scanned recursively. Boxes stay pixel-space XYXY in the IR; `bndbox`
//! values are rounded to whole pixels on output, matching the usual VOC
//! convention.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::Node;
use walkdir::WalkDir;

use super::model::{Annotation, Category, Dataset, DatasetInfo, Image};
use super::{AnnotationId, BBoxXYXY, CategoryId, ImageId, Pixel};
use crate::error::LabelportError;

const VOC_XML_EXTENSION: &str = "xml";
const JPEG_IMAGES_README: &str = "This directory is a placeholder. Image files are not copied during conversion.\nPlace your original images here to complete the VOC dataset layout.\n";

/// Read a Pascal VOC dataset directory into IR.
///
/// `path` may be the dataset root containing `Annotations/`, or the
/// `Annotations/` directory itself.
pub fn read_voc_dir(path: &Path) -> Result<Dataset, LabelportError> {
    let layout = discover_layout(path)?;
    let mut xml_files = collect_xml_files(&layout.annotations_dir)?;
    xml_files.sort_by_cached_key(|xml_path| rel_string(&layout.annotations_dir, xml_path));

    let mut parsed_files = Vec::with_capacity(xml_files.len());
    for xml_path in xml_files {
        let parsed = parse_voc_xml(&xml_path)?;
        parsed_files.push((xml_path, parsed));
    }

    let mut image_defs: BTreeMap<String, (u32, u32, Option<u32>)> = BTreeMap::new();
    let mut category_names = BTreeSet::new();

    for (xml_path, parsed) in &parsed_files {
        if image_defs.contains_key(&parsed.filename) {
            return Err(LabelportError::VocXmlParse {
                path: xml_path.clone(),
                message: format!(
                    "duplicate <filename> '{}' found in multiple XML files",
                    parsed.filename
                ),
            });
        }

        image_defs.insert(
            parsed.filename.clone(),
            (parsed.width, parsed.height, parsed.depth),
        );

        for object in &parsed.objects {
            category_names.insert(object.name.clone());
        }
    }

    let categories: Vec<Category> = category_names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| Category::new((idx + 1) as u64, name))
        .collect();

    let category_id_by_name: BTreeMap<String, CategoryId> = categories
        .iter()
        .map(|category| (category.name.clone(), category.id))
        .collect();

    let images: Vec<Image> = image_defs
        .into_iter()
        .enumerate()
        .map(|(idx, (file_name, (width, height, depth)))| {
            let mut image = Image::new((idx + 1) as u64, file_name, width, height);
            if let Some(depth) = depth {
                image
                    .attributes
                    .insert("depth".to_string(), depth.to_string());
            }
            image
        })
        .collect();

    let image_id_by_name: BTreeMap<String, ImageId> = images
        .iter()
        .map(|image| (image.file_name.clone(), image.id))
        .collect();

    let mut annotations = Vec::new();
    let mut next_annotation_id: u64 = 1;

    for (xml_path, parsed) in parsed_files {
        let image_id = image_id_by_name
            .get(&parsed.filename)
            .copied()
            .ok_or_else(|| LabelportError::VocXmlParse {
                path: xml_path.clone(),
                message: format!(
                    "internal error: image '{}' missing from lookup",
                    parsed.filename
                ),
            })?;

        for object in parsed.objects {
            let category_id = category_id_by_name
                .get(&object.name)
                .copied()
                .ok_or_else(|| LabelportError::VocXmlParse {
                    path: xml_path.clone(),
                    message: format!(
                        "internal error: category '{}' missing from lookup",
                        object.name
                    ),
                })?;

            let mut annotation = Annotation::new(
                AnnotationId::new(next_annotation_id),
                image_id,
                category_id,
                BBoxXYXY::<Pixel>::from_xyxy(object.xmin, object.ymin, object.xmax, object.ymax),
            );
            annotation.attributes = object.attrs;

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

/// Write an IR dataset as a Pascal VOC directory.
///
/// Creates `Annotations/` and `JPEGImages/README.txt` under `path`. Polygon
/// outlines have no VOC representation and are dropped; the bbox remains.
pub fn write_voc_dir(path: &Path, dataset: &Dataset) -> Result<(), LabelportError> {
    fs::create_dir_all(path)?;

    let annotations_dir = path.join("Annotations");
    let jpeg_images_dir = path.join("JPEGImages");

    fs::create_dir_all(&annotations_dir)?;
    fs::create_dir_all(&jpeg_images_dir)?;
    fs::write(jpeg_images_dir.join("README.txt"), JPEG_IMAGES_README)?;

    let image_by_id: BTreeMap<ImageId, &Image> =
        dataset.images.iter().map(|img| (img.id, img)).collect();
    let category_name_by_id: BTreeMap<CategoryId, String> = dataset
        .categories
        .iter()
        .map(|category| (category.id, category.name.clone()))
        .collect();

    let mut annotations_by_image: BTreeMap<ImageId, Vec<&Annotation>> = BTreeMap::new();
    for annotation in &dataset.annotations {
        if !image_by_id.contains_key(&annotation.image_id) {
            return Err(LabelportError::VocWriteError {
                path: path.to_path_buf(),
                message: format!(
                    "annotation {} references missing image {}",
                    annotation.id.as_u64(),
                    annotation.image_id.as_u64()
                ),
            });
        }

        if !category_name_by_id.contains_key(&annotation.category_id) {
            return Err(LabelportError::VocWriteError {
                path: path.to_path_buf(),
                message: format!(
                    "annotation {} references missing category {}",
                    annotation.id.as_u64(),
                    annotation.category_id.as_u64()
                ),
            });
        }

        annotations_by_image
            .entry(annotation.image_id)
            .or_default()
            .push(annotation);
    }

    let mut images_sorted: Vec<&Image> = dataset.images.iter().collect();
    images_sorted.sort_by(|left, right| left.file_name.cmp(&right.file_name));

    for image in images_sorted {
        let xml_rel_path = Path::new(&image.file_name).with_extension(VOC_XML_EXTENSION);
        let xml_path = annotations_dir.join(&xml_rel_path);

        if let Some(parent) = xml_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut image_annotations = annotations_by_image.remove(&image.id).unwrap_or_default();
        image_annotations.sort_by_key(|annotation| annotation.id);

        write_voc_xml(
            &xml_path,
            image,
            &image_annotations,
            &category_name_by_id,
            path,
        )?;
    }

    Ok(())
}

#[derive(Clone, Debug)]
struct VocLayout {
    #[cfg_attr(not(test), allow(dead_code))]
    root: PathBuf,
    annotations_dir: PathBuf,
    #[cfg_attr(not(test), allow(dead_code))]
    images_dir: Option<PathBuf>,
}

#[derive(Debug)]
struct ParsedVocAnnotation {
    filename: String,
    width: u32,
    height: u32,
    depth: Option<u32>,
    objects: Vec<ParsedVocObject>,
}

#[derive(Debug)]
struct ParsedVocObject {
    name: String,
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    attrs: BTreeMap<String, String>,
}

fn discover_layout(input: &Path) -> Result<VocLayout, LabelportError> {
    if !input.is_dir() {
        return Err(LabelportError::VocLayoutInvalid {
            path: input.to_path_buf(),
            message: "input must be a directory".to_string(),
        });
    }

    let (root, annotations_dir) = if input.join("Annotations").is_dir() {
        (input.to_path_buf(), input.join("Annotations"))
    } else if is_dir_named(input, "Annotations") {
        let root = input
            .parent()
            .ok_or_else(|| LabelportError::VocLayoutInvalid {
                path: input.to_path_buf(),
                message: "Annotations directory has no parent directory".to_string(),
            })?
            .to_path_buf();
        (root, input.to_path_buf())
    } else {
        return Err(LabelportError::VocLayoutInvalid {
            path: input.to_path_buf(),
            message: "expected a VOC dataset root containing Annotations/ or an Annotations/ directory itself"
                .to_string(),
        });
    };

    let images_dir = root.join("JPEGImages");
    let images_dir = images_dir.is_dir().then_some(images_dir);

    Ok(VocLayout {
        root,
        annotations_dir,
        images_dir,
    })
}

fn collect_xml_files(dir: &Path) -> Result<Vec<PathBuf>, LabelportError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|source| LabelportError::VocLayoutInvalid {
            path: dir.to_path_buf(),
            message: format!("failed while traversing annotations directory: {source}"),
        })?;

        if entry.file_type().is_file() && has_xml_extension(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}

fn parse_voc_xml(path: &Path) -> Result<ParsedVocAnnotation, LabelportError> {
    let xml = fs::read_to_string(path)?;
    parse_voc_xml_str(&xml, path)
}

fn parse_voc_xml_str(xml: &str, path: &Path) -> Result<ParsedVocAnnotation, LabelportError> {
    let document =
        roxmltree::Document::parse(xml).map_err(|source| LabelportError::VocXmlParse {
            path: path.to_path_buf(),
            message: source.to_string(),
        })?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(LabelportError::VocXmlParse {
            path: path.to_path_buf(),
            message: "missing <annotation> root element".to_string(),
        });
    }

    let filename = required_child_text(annotation, "filename", path, "<annotation>")?;

    let size = required_child_element(annotation, "size", path, "<annotation>")?;
    let width = parse_required_u32(size, "width", path, "<size>")?;
    let height = parse_required_u32(size, "height", path, "<size>")?;
    let depth = optional_child_text(size, "depth")
        .map(|raw| {
            raw.parse::<u32>().map_err(|_| LabelportError::VocXmlParse {
                path: path.to_path_buf(),
                message: format!("invalid <depth> value '{raw}' in <size>; expected u32"),
            })
        })
        .transpose()?;

    let mut objects = Vec::new();
    for object in annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        let name = required_child_text(object, "name", path, "<object>")?;
        let bndbox = required_child_element(object, "bndbox", path, "<object>")?;

        let xmin = parse_required_f64(bndbox, "xmin", path, "<bndbox>")?;
        let ymin = parse_required_f64(bndbox, "ymin", path, "<bndbox>")?;
        let xmax = parse_required_f64(bndbox, "xmax", path, "<bndbox>")?;
        let ymax = parse_required_f64(bndbox, "ymax", path, "<bndbox>")?;

        let mut attrs = BTreeMap::new();
        for key in ["pose", "truncated", "difficult", "occluded"] {
            if let Some(value) = optional_child_text(object, key) {
                attrs.insert(key.to_string(), value);
            }
        }

        objects.push(ParsedVocObject {
            name,
            xmin,
            ymin,
            xmax,
            ymax,
            attrs,
        });
    }

    Ok(ParsedVocAnnotation {
        filename,
        width,
        height,
        depth,
        objects,
    })
}

fn required_child_element<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<Node<'a, 'input>, LabelportError> {
    child_element(node, tag).ok_or_else(|| LabelportError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("missing <{tag}> in {context}"),
    })
}

fn required_child_text(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<String, LabelportError> {
    optional_child_text(node, tag).ok_or_else(|| LabelportError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("missing <{tag}> in {context}"),
    })
}

fn parse_required_u32(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<u32, LabelportError> {
    let raw = required_child_text(node, tag, path, context)?;
    raw.parse::<u32>().map_err(|_| LabelportError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("invalid <{tag}> value '{raw}' in {context}; expected u32"),
    })
}

fn parse_required_f64(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<f64, LabelportError> {
    let raw = required_child_text(node, tag, path, context)?;
    raw.parse::<f64>().map_err(|_| LabelportError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!(
            "invalid <{tag}> value '{raw}' in {context}; expected floating-point number"
        ),
    })
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn write_voc_xml(
    xml_path: &Path,
    image: &Image,
    annotations: &[&Annotation],
    category_name_by_id: &BTreeMap<CategoryId, String>,
    output_root: &Path,
) -> Result<(), LabelportError> {
    let mut xml = String::new();

    writeln!(xml, "<?xml version=\"1.0\" encoding=\"utf-8\"?>").expect("write to string");
    writeln!(xml, "<annotation>").expect("write to string");
    writeln!(xml, "  <folder>JPEGImages</folder>").expect("write to string");
    writeln!(
        xml,
        "  <filename>{}</filename>",
        xml_escape(&image.file_name)
    )
    .expect("write to string");
    writeln!(xml, "  <size>").expect("write to string");
    writeln!(xml, "    <width>{}</width>", image.width).expect("write to string");
    writeln!(xml, "    <height>{}</height>", image.height).expect("write to string");

    let depth = image
        .attributes
        .get("depth")
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .unwrap_or(3);
    writeln!(xml, "    <depth>{}</depth>", depth).expect("write to string");
    writeln!(xml, "  </size>").expect("write to string");

    for annotation in annotations {
        let category_name = category_name_by_id
            .get(&annotation.category_id)
            .ok_or_else(|| LabelportError::VocWriteError {
                path: output_root.to_path_buf(),
                message: format!(
                    "annotation {} references missing category {}",
                    annotation.id.as_u64(),
                    annotation.category_id.as_u64()
                ),
            })?;

        writeln!(xml, "  <object>").expect("write to string");
        writeln!(xml, "    <name>{}</name>", xml_escape(category_name)).expect("write to string");

        if let Some(pose) = annotation
            .attributes
            .get("pose")
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
        {
            writeln!(xml, "    <pose>{}</pose>", xml_escape(pose)).expect("write to string");
        }

        for key in ["truncated", "difficult", "occluded"] {
            if let Some(raw) = annotation.attributes.get(key) {
                if let Some(normalized) = normalize_bool_attr(raw) {
                    writeln!(xml, "    <{0}>{1}</{0}>", key, normalized).expect("write to string");
                }
            }
        }

        writeln!(xml, "    <bndbox>").expect("write to string");
        writeln!(
            xml,
            "      <xmin>{}</xmin>",
            annotation.bbox.xmin().round() as i64
        )
        .expect("write to string");
        writeln!(
            xml,
            "      <ymin>{}</ymin>",
            annotation.bbox.ymin().round() as i64
        )
        .expect("write to string");
        writeln!(
            xml,
            "      <xmax>{}</xmax>",
            annotation.bbox.xmax().round() as i64
        )
        .expect("write to string");
        writeln!(
            xml,
            "      <ymax>{}</ymax>",
            annotation.bbox.ymax().round() as i64
        )
        .expect("write to string");
        writeln!(xml, "    </bndbox>").expect("write to string");
        writeln!(xml, "  </object>").expect("write to string");
    }

    writeln!(xml, "</annotation>").expect("write to string");

    fs::write(xml_path, xml)?;
    Ok(())
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn normalize_bool_attr(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some("1"),
        "false" | "no" | "0" => Some("0"),
        _ => None,
    }
}

fn has_xml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(VOC_XML_EXTENSION))
        .unwrap_or(false)
}

fn is_dir_named(path: &Path, dir_name: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.eq_ignore_ascii_case(dir_name))
        .unwrap_or(false)
}

fn rel_string(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}
