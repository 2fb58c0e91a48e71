//! Annotation-space geometric augmentation.
//!
//! Transforms operate purely on annotation geometry and image dimensions;
//! pixel resampling is left to the training pipeline. Every transform keeps
//! boxes and polygon outlines consistent with the dimensions the augmented
//! image would have, and clipping guarantees no coordinate leaves the image.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{RngExt, SeedableRng};

use crate::error::LabelportError;
use crate::ir::{Annotation, BBoxXYXY, Coord, Dataset, Image, Pixel, Polygon};

/// Minimum box side length (pixels) surviving a crop.
const MIN_CROP_BOX_SIDE: f64 = 1.0;

/// Augmentation options.
#[derive(Clone, Debug)]
pub struct AugmentOptions {
    /// Mirror annotations horizontally.
    pub hflip: bool,
    /// Mirror annotations vertically.
    pub vflip: bool,
    /// Rotation in whole degrees about the image center; 0 disables.
    pub rotate_deg: i32,
    /// Crop to this fraction of each dimension at a random offset; 1.0 disables.
    pub crop_ratio: f64,
    /// Uniform scale factor for coordinates and dimensions; 1.0 disables.
    pub scale_ratio: f64,
    /// Generate 2x2 mosaic composites from groups of four images.
    pub mosaic: bool,
    /// Generate mixup composites from pairs of images.
    pub mixup: bool,
    /// Blend factor recorded on mixup composites.
    pub mixup_alpha: f64,
    /// RNG seed; crops and composite picks are deterministic when set.
    pub seed: Option<u64>,
}

impl Default for AugmentOptions {
    fn default() -> Self {
        Self {
            hflip: false,
            vflip: false,
            rotate_deg: 0,
            crop_ratio: 1.0,
            scale_ratio: 1.0,
            mosaic: false,
            mixup: false,
            mixup_alpha: 0.5,
            seed: None,
        }
    }
}

/// Validate augmentation options before running.
pub fn validate_augment_options(opts: &AugmentOptions) -> Result<(), LabelportError> {
    if !opts.crop_ratio.is_finite() || !(0.0 < opts.crop_ratio && opts.crop_ratio <= 1.0) {
        return Err(LabelportError::InvalidAugmentParams {
            message: "--crop-ratio must be in the interval (0.0, 1.0]".to_string(),
        });
    }
    if !opts.scale_ratio.is_finite() || opts.scale_ratio <= 0.0 {
        return Err(LabelportError::InvalidAugmentParams {
            message: "--scale-ratio must be greater than 0".to_string(),
        });
    }
    if !opts.mixup_alpha.is_finite() || !(0.0..=1.0).contains(&opts.mixup_alpha) {
        return Err(LabelportError::InvalidAugmentParams {
            message: "--mixup-alpha must be in [0.0, 1.0]".to_string(),
        });
    }
    Ok(())
}

/// Geometry of one annotation while a transform pipeline runs.
///
/// Polygons are carried as pixel vertices so the same point algebra applies
/// to boxes and outlines; they are re-normalized against the final image
/// dimensions when the pipeline finishes.
#[derive(Clone, Debug)]
struct WorkingGeometry {
    category_id: crate::ir::CategoryId,
    confidence: Option<f64>,
    attributes: std::collections::BTreeMap<String, String>,
    bbox: BBoxXYXY<Pixel>,
    polygon: Option<Vec<Coord<Pixel>>>,
}

/// Augments a dataset, producing one transformed copy per image plus any
/// requested mosaic/mixup composites. IDs are reassigned sequentially.
pub fn augment_dataset(
    dataset: &Dataset,
    opts: &AugmentOptions,
) -> Result<Dataset, LabelportError> {
    validate_augment_options(opts)?;

    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };

    // Stable image order so seeded runs reproduce.
    let mut source_images: Vec<&Image> = dataset.images.iter().collect();
    source_images.sort_by(|a, b| a.file_name.cmp(&b.file_name).then(a.id.cmp(&b.id)));

    let mut out = Dataset {
        info: dataset.info.clone(),
        categories: dataset.categories.clone(),
        ..Default::default()
    };
    let mut next_image_id = 0u64;
    let mut next_annotation_id = 0u64;

    for image in &source_images {
        let (new_image, geometries) = transform_image(image, dataset, opts, &mut rng);
        push_result(
            &mut out,
            new_image,
            geometries,
            &mut next_image_id,
            &mut next_annotation_id,
        );
    }

    if opts.mosaic && source_images.len() >= 4 {
        let count = (source_images.len() / 4).max(1);
        for i in 0..count {
            let picks = sample(&mut rng, source_images.len(), 4);
            let picked: Vec<&Image> = picks.iter().map(|idx| source_images[idx]).collect();
            let (new_image, geometries) = mosaic_composite(&picked, dataset, i);
            push_result(
                &mut out,
                new_image,
                geometries,
                &mut next_image_id,
                &mut next_annotation_id,
            );
        }
    }

    if opts.mixup && source_images.len() >= 2 {
        let count = (source_images.len() / 5).max(1);
        for i in 0..count {
            let picks = sample(&mut rng, source_images.len(), 2);
            let picked: Vec<&Image> = picks.iter().map(|idx| source_images[idx]).collect();
            let (new_image, geometries) =
                mixup_composite(picked[0], picked[1], dataset, i, opts.mixup_alpha);
            push_result(
                &mut out,
                new_image,
                geometries,
                &mut next_image_id,
                &mut next_annotation_id,
            );
        }
    }

    Ok(out)
}

fn push_result(
    out: &mut Dataset,
    mut image: Image,
    geometries: Vec<WorkingGeometry>,
    next_image_id: &mut u64,
    next_annotation_id: &mut u64,
) {
    *next_image_id += 1;
    image.id = (*next_image_id).into();

    let (width, height) = (image.width as f64, image.height as f64);
    for geometry in geometries {
        *next_annotation_id += 1;
        let mut annotation = Annotation::new(
            *next_annotation_id,
            *next_image_id,
            geometry.category_id,
            geometry.bbox,
        );
        annotation.confidence = geometry.confidence;
        annotation.attributes = geometry.attributes;
        annotation.segmentation = geometry
            .polygon
            .map(|points| Polygon::from_pixel_points(&points, width, height));
        out.annotations.push(annotation);
    }

    out.images.push(image);
}

/// Collect an image's annotations as pixel-space working geometry.
fn working_geometries(image: &Image, dataset: &Dataset) -> Vec<WorkingGeometry> {
    let (width, height) = (image.width as f64, image.height as f64);
    dataset
        .annotations
        .iter()
        .filter(|ann| ann.image_id == image.id)
        .map(|ann| WorkingGeometry {
            category_id: ann.category_id,
            confidence: ann.confidence,
            attributes: ann.attributes.clone(),
            bbox: ann.bbox,
            polygon: ann
                .segmentation
                .as_ref()
                .map(|polygon| polygon.to_pixel_points(width, height)),
        })
        .collect()
}

/// Run the per-image transform pipeline: flips, rotation, crop, scale.
fn transform_image(
    image: &Image,
    dataset: &Dataset,
    opts: &AugmentOptions,
    rng: &mut StdRng,
) -> (Image, Vec<WorkingGeometry>) {
    let mut geometries = working_geometries(image, dataset);
    let mut width = image.width as f64;
    let mut height = image.height as f64;

    if opts.hflip {
        for geometry in &mut geometries {
            geometry.bbox = hflip_box(&geometry.bbox, width);
            if let Some(points) = &mut geometry.polygon {
                for point in points.iter_mut() {
                    point.x = width - point.x;
                }
            }
        }
    }

    if opts.vflip {
        for geometry in &mut geometries {
            geometry.bbox = vflip_box(&geometry.bbox, height);
            if let Some(points) = &mut geometry.polygon {
                for point in points.iter_mut() {
                    point.y = height - point.y;
                }
            }
        }
    }

    if opts.rotate_deg % 360 != 0 {
        let radians = (opts.rotate_deg as f64).to_radians();
        let (cx, cy) = (width / 2.0, height / 2.0);
        for geometry in &mut geometries {
            geometry.bbox = rotate_box(&geometry.bbox, cx, cy, radians)
                .clamped(0.0, 0.0, width, height);
            if let Some(points) = &mut geometry.polygon {
                for point in points.iter_mut() {
                    let (x, y) = rotate_point(point.x, point.y, cx, cy, radians);
                    point.x = x.clamp(0.0, width);
                    point.y = y.clamp(0.0, height);
                }
            }
        }
    }

    if opts.crop_ratio < 0.999 {
        let new_width = (width * opts.crop_ratio).floor().max(1.0);
        let new_height = (height * opts.crop_ratio).floor().max(1.0);
        let offset_x = rng.random_range(0.0..=(width - new_width).max(0.0)).floor();
        let offset_y = rng.random_range(0.0..=(height - new_height).max(0.0)).floor();

        geometries.retain_mut(|geometry| {
            let shifted = BBoxXYXY::from_xyxy(
                geometry.bbox.xmin() - offset_x,
                geometry.bbox.ymin() - offset_y,
                geometry.bbox.xmax() - offset_x,
                geometry.bbox.ymax() - offset_y,
            )
            .clamped(0.0, 0.0, new_width, new_height);

            if shifted.width() <= MIN_CROP_BOX_SIDE || shifted.height() <= MIN_CROP_BOX_SIDE {
                return false;
            }

            geometry.bbox = shifted;
            if let Some(points) = &mut geometry.polygon {
                for point in points.iter_mut() {
                    point.x = (point.x - offset_x).clamp(0.0, new_width);
                    point.y = (point.y - offset_y).clamp(0.0, new_height);
                }
            }
            true
        });

        width = new_width;
        height = new_height;
    }

    if (opts.scale_ratio - 1.0).abs() > 1e-3 {
        width = (width * opts.scale_ratio).floor().max(1.0);
        height = (height * opts.scale_ratio).floor().max(1.0);

        // The flooring above can shave a fraction off the new dimensions, so
        // scaled geometry is clipped against them.
        for geometry in &mut geometries {
            geometry.bbox = scale_box(&geometry.bbox, opts.scale_ratio, opts.scale_ratio)
                .clamped(0.0, 0.0, width, height);
            if let Some(points) = &mut geometry.polygon {
                for point in points.iter_mut() {
                    point.x = (point.x * opts.scale_ratio).clamp(0.0, width);
                    point.y = (point.y * opts.scale_ratio).clamp(0.0, height);
                }
            }
        }
    }

    let mut new_image = Image::new(
        image.id,
        augmented_file_name(&image.file_name),
        width as u32,
        height as u32,
    );
    new_image.attributes = image.attributes.clone();

    (new_image, geometries)
}

/// Compose four images into a 2x2 mosaic.
///
/// Each source is scaled to the common minimum size with a single
/// aspect-preserving factor, then its annotations are offset into the
/// quadrant it lands in. The canvas is twice the minimum size per axis.
fn mosaic_composite(
    picked: &[&Image],
    dataset: &Dataset,
    index: usize,
) -> (Image, Vec<WorkingGeometry>) {
    let min_width = picked.iter().map(|i| i.width).min().unwrap_or(1);
    let min_height = picked.iter().map(|i| i.height).min().unwrap_or(1);

    let mut geometries = Vec::new();
    for (quadrant, image) in picked.iter().enumerate() {
        let scale_w = min_width as f64 / image.width as f64;
        let scale_h = min_height as f64 / image.height as f64;
        let scale = scale_w.min(scale_h);

        let offset_x = (quadrant % 2) as f64 * min_width as f64;
        let offset_y = (quadrant / 2) as f64 * min_height as f64;

        for mut geometry in working_geometries(image, dataset) {
            let scaled = scale_box(&geometry.bbox, scale, scale);
            geometry.bbox = BBoxXYXY::from_xyxy(
                scaled.xmin() + offset_x,
                scaled.ymin() + offset_y,
                scaled.xmax() + offset_x,
                scaled.ymax() + offset_y,
            );
            if let Some(points) = &mut geometry.polygon {
                for point in points.iter_mut() {
                    point.x = point.x * scale + offset_x;
                    point.y = point.y * scale + offset_y;
                }
            }
            geometries.push(geometry);
        }
    }

    let image = Image::new(
        0u64,
        format!("mosaic_{:03}.jpg", index),
        min_width * 2,
        min_height * 2,
    );

    (image, geometries)
}

/// Compose two images into a mixup union on the common minimum canvas.
///
/// Each source's annotations are rescaled per axis onto the canvas. The
/// blend alpha only affects pixels, which this pipeline never touches, so it
/// is recorded as an image attribute instead.
fn mixup_composite(
    first: &Image,
    second: &Image,
    dataset: &Dataset,
    index: usize,
    alpha: f64,
) -> (Image, Vec<WorkingGeometry>) {
    let width = first.width.min(second.width);
    let height = first.height.min(second.height);

    let mut geometries = Vec::new();
    for image in [first, second] {
        let scale_x = width as f64 / image.width as f64;
        let scale_y = height as f64 / image.height as f64;

        for mut geometry in working_geometries(image, dataset) {
            geometry.bbox = scale_box(&geometry.bbox, scale_x, scale_y);
            if let Some(points) = &mut geometry.polygon {
                for point in points.iter_mut() {
                    point.x *= scale_x;
                    point.y *= scale_y;
                }
            }
            geometries.push(geometry);
        }
    }

    let mut image = Image::new(0u64, format!("mixup_{:03}.jpg", index), width, height);
    image
        .attributes
        .insert("mixup_alpha".to_string(), format!("{}", alpha));

    (image, geometries)
}

/// Mirror a box across the vertical axis of a `width`-wide image.
pub fn hflip_box(bbox: &BBoxXYXY<Pixel>, width: f64) -> BBoxXYXY<Pixel> {
    BBoxXYXY::from_xyxy(
        width - bbox.xmax(),
        bbox.ymin(),
        width - bbox.xmin(),
        bbox.ymax(),
    )
}

/// Mirror a box across the horizontal axis of a `height`-tall image.
pub fn vflip_box(bbox: &BBoxXYXY<Pixel>, height: f64) -> BBoxXYXY<Pixel> {
    BBoxXYXY::from_xyxy(
        bbox.xmin(),
        height - bbox.ymax(),
        bbox.xmax(),
        height - bbox.ymin(),
    )
}

fn rotate_point(x: f64, y: f64, cx: f64, cy: f64, radians: f64) -> (f64, f64) {
    let (sin, cos) = radians.sin_cos();
    let dx = x - cx;
    let dy = y - cy;
    (cx + dx * cos - dy * sin, cy + dx * sin + dy * cos)
}

/// Rotate a box about (cx, cy) and return the axis-aligned hull of its
/// four rotated corners.
pub fn rotate_box(bbox: &BBoxXYXY<Pixel>, cx: f64, cy: f64, radians: f64) -> BBoxXYXY<Pixel> {
    let corners = [
        (bbox.xmin(), bbox.ymin()),
        (bbox.xmax(), bbox.ymin()),
        (bbox.xmax(), bbox.ymax()),
        (bbox.xmin(), bbox.ymax()),
    ];

    let mut xmin = f64::INFINITY;
    let mut ymin = f64::INFINITY;
    let mut xmax = f64::NEG_INFINITY;
    let mut ymax = f64::NEG_INFINITY;

    for (x, y) in corners {
        let (rx, ry) = rotate_point(x, y, cx, cy, radians);
        xmin = xmin.min(rx);
        ymin = ymin.min(ry);
        xmax = xmax.max(rx);
        ymax = ymax.max(ry);
    }

    BBoxXYXY::from_xyxy(xmin, ymin, xmax, ymax)
}

fn scale_box(bbox: &BBoxXYXY<Pixel>, scale_x: f64, scale_y: f64) -> BBoxXYXY<Pixel> {
    BBoxXYXY::from_xyxy(
        bbox.xmin() * scale_x,
        bbox.ymin() * scale_y,
        bbox.xmax() * scale_x,
        bbox.ymax() * scale_y,
    )
}

/// Insert `_aug` before the extension: `train/a.jpg` becomes `train/a_aug.jpg`.
fn augmented_file_name(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_aug.{}", stem, ext),
        None => format!("{}_aug", file_name),
    }
}
