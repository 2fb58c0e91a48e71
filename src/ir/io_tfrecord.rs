//! TFRecord writer (write-only).
//!
//! Emits `dataset.tfrecord` with one `tf.train.Example` per annotated image
//! using the TensorFlow Object Detection feature keys, plus a `label_map.json`
//! mapping
//! category names to 1-based ids. The proto messages are small enough that we
//! define them by hand with prost derives instead of a build-time codegen
//! step.
//!
//! Record framing per the TFRecord spec:
//!
//! ```text
//! u64 length (LE)
//! u32 masked crc32c of the length bytes (LE)
//! payload
//! u32 masked crc32c of the payload (LE)
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use prost::Message;

use super::model::Dataset;
use crate::error::LabelportError;

#[derive(Clone, PartialEq, Message)]
struct BytesList {
    #[prost(bytes = "vec", repeated, tag = "1")]
    value: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
struct FloatList {
    #[prost(float, repeated, tag = "1")]
    value: Vec<f32>,
}

#[derive(Clone, PartialEq, Message)]
struct Int64List {
    #[prost(int64, repeated, tag = "1")]
    value: Vec<i64>,
}

#[derive(Clone, PartialEq, Message)]
struct Feature {
    #[prost(oneof = "feature_kind::Kind", tags = "1, 2, 3")]
    kind: Option<feature_kind::Kind>,
}

mod feature_kind {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        BytesList(super::BytesList),
        #[prost(message, tag = "2")]
        FloatList(super::FloatList),
        #[prost(message, tag = "3")]
        Int64List(super::Int64List),
    }
}

// btree_map keeps feature encoding order stable across runs.
#[derive(Clone, PartialEq, Message)]
struct Features {
    #[prost(btree_map = "string, message", tag = "1")]
    feature: BTreeMap<String, Feature>,
}

#[derive(Clone, PartialEq, Message)]
struct Example {
    #[prost(message, optional, tag = "1")]
    features: Option<Features>,
}

fn bytes_feature(values: Vec<Vec<u8>>) -> Feature {
    Feature {
        kind: Some(feature_kind::Kind::BytesList(BytesList { value: values })),
    }
}

fn float_feature(values: Vec<f32>) -> Feature {
    Feature {
        kind: Some(feature_kind::Kind::FloatList(FloatList { value: values })),
    }
}

fn int64_feature(values: Vec<i64>) -> Feature {
    Feature {
        kind: Some(feature_kind::Kind::Int64List(Int64List { value: values })),
    }
}

const CRC_MASK_DELTA: u32 = 0xa282_ead8;

fn masked_crc32c(bytes: &[u8]) -> u32 {
    let crc = crc32c::crc32c(bytes);
    ((crc >> 15) | (crc << 17)).wrapping_add(CRC_MASK_DELTA)
}

fn write_record<W: Write>(writer: &mut W, payload: &[u8]) -> std::io::Result<()> {
    let length_bytes = (payload.len() as u64).to_le_bytes();
    writer.write_all(&length_bytes)?;
    writer.write_all(&masked_crc32c(&length_bytes).to_le_bytes())?;
    writer.write_all(payload)?;
    writer.write_all(&masked_crc32c(payload).to_le_bytes())?;
    Ok(())
}

/// Summary of a TFRecord export.
#[derive(Clone, Copy, Debug, Default)]
pub struct TfRecordWriteReport {
    /// Examples written to `dataset.tfrecord`.
    pub records_written: usize,
    /// Images skipped because they carry no annotations.
    pub images_skipped_no_annotations: usize,
    /// Records written with an empty `image/encoded` payload because the
    /// image file was not found under `images_dir`.
    pub images_missing_bytes: usize,
}

/// Writes an IR dataset as a TFRecord directory.
///
/// Produces `dataset.tfrecord` and `label_map.json` under `path`, one record
/// per annotated image. When `images_dir` is given, image bytes are embedded
/// in `image/encoded`; a missing file leaves that feature empty (the record
/// stays structurally valid) and is counted in the returned report.
pub fn write_tfrecord_dir(
    path: &Path,
    dataset: &Dataset,
    images_dir: Option<&Path>,
) -> Result<TfRecordWriteReport, LabelportError> {
    fs::create_dir_all(path)?;

    let mut write_report = TfRecordWriteReport::default();

    let category_name_by_id: BTreeMap<_, _> = dataset
        .categories
        .iter()
        .map(|cat| (cat.id, cat.name.as_str()))
        .collect();

    let record_path = path.join("dataset.tfrecord");
    let file = File::create(&record_path)?;
    let mut writer = BufWriter::new(file);

    let mut images_sorted: Vec<_> = dataset.images.iter().collect();
    images_sorted.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    for image in images_sorted {
        let mut anns: Vec<_> = dataset
            .annotations
            .iter()
            .filter(|ann| ann.image_id == image.id)
            .collect();
        anns.sort_by_key(|ann| ann.id);

        if anns.is_empty() {
            write_report.images_skipped_no_annotations += 1;
            continue;
        }

        let width = image.width as f64;
        let height = image.height as f64;

        let mut xmins = Vec::with_capacity(anns.len());
        let mut ymins = Vec::with_capacity(anns.len());
        let mut xmaxs = Vec::with_capacity(anns.len());
        let mut ymaxs = Vec::with_capacity(anns.len());
        let mut labels = Vec::with_capacity(anns.len());

        for ann in &anns {
            let name = category_name_by_id
                .get(&ann.category_id)
                .copied()
                .ok_or_else(|| LabelportError::TfRecordWrite {
                    path: record_path.clone(),
                    message: format!(
                        "annotation {} references missing category {}",
                        ann.id.as_u64(),
                        ann.category_id.as_u64()
                    ),
                })?;

            xmins.push((ann.bbox.xmin() / width) as f32);
            ymins.push((ann.bbox.ymin() / height) as f32);
            xmaxs.push((ann.bbox.xmax() / width) as f32);
            ymaxs.push((ann.bbox.ymax() / height) as f32);
            labels.push(name.as_bytes().to_vec());
        }

        let encoded = match images_dir {
            Some(dir) => {
                let image_path = dir.join(&image.file_name);
                if image_path.is_file() {
                    fs::read(&image_path)?
                } else {
                    write_report.images_missing_bytes += 1;
                    Vec::new()
                }
            }
            None => Vec::new(),
        };

        let format = image_format_tag(&image.file_name);
        let filename = Path::new(&image.file_name)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| image.file_name.clone());

        let mut feature = BTreeMap::new();
        feature.insert("image/encoded".to_string(), bytes_feature(vec![encoded]));
        feature.insert(
            "image/format".to_string(),
            bytes_feature(vec![format.as_bytes().to_vec()]),
        );
        feature.insert(
            "image/filename".to_string(),
            bytes_feature(vec![filename.into_bytes()]),
        );
        feature.insert(
            "image/height".to_string(),
            int64_feature(vec![image.height as i64]),
        );
        feature.insert(
            "image/width".to_string(),
            int64_feature(vec![image.width as i64]),
        );
        feature.insert("image/object/bbox/xmin".to_string(), float_feature(xmins));
        feature.insert("image/object/bbox/ymin".to_string(), float_feature(ymins));
        feature.insert("image/object/bbox/xmax".to_string(), float_feature(xmaxs));
        feature.insert("image/object/bbox/ymax".to_string(), float_feature(ymaxs));
        feature.insert("image/object/class/text".to_string(), bytes_feature(labels));

        let example = Example {
            features: Some(Features { feature }),
        };

        write_record(&mut writer, &example.encode_to_vec())?;
        write_report.records_written += 1;
    }

    writer.flush()?;

    write_label_map(path, dataset)?;

    Ok(write_report)
}

fn image_format_tag(file_name: &str) -> &'static str {
    match Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "png",
        Some("bmp") => "bmp",
        Some("webp") => "webp",
        _ => "jpeg",
    }
}

fn write_label_map(path: &Path, dataset: &Dataset) -> Result<(), LabelportError> {
    let mut names: Vec<&str> = dataset
        .categories
        .iter()
        .map(|cat| cat.name.as_str())
        .collect();
    names.sort_unstable();
    names.dedup();

    let label_map: BTreeMap<&str, usize> = names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| (name, idx + 1))
        .collect();

    let label_map_path = path.join("label_map.json");
    let file = File::create(&label_map_path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &label_map).map_err(|source| {
        LabelportError::TfRecordWrite {
            path: label_map_path.clone(),
            message: source.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::model::{Annotation, Category, Image};
    use crate::ir::{BBoxXYXY, Pixel};
    use crate::test_support::write_bmp;

    fn sample_dataset() -> Dataset {
        Dataset {
            images: vec![Image::new(1u64, "img1.bmp", 100, 50)],
            categories: vec![Category::new(1u64, "person"), Category::new(2u64, "dog")],
            annotations: vec![
                Annotation::new(
                    1u64,
                    1u64,
                    1u64,
                    BBoxXYXY::<Pixel>::from_xyxy(10.0, 5.0, 60.0, 45.0),
                ),
                Annotation::new(
                    2u64,
                    1u64,
                    2u64,
                    BBoxXYXY::<Pixel>::from_xyxy(0.0, 0.0, 50.0, 25.0),
                ),
            ],
            ..Default::default()
        }
    }

    fn read_records(path: &Path) -> Vec<Vec<u8>> {
        let data = fs::read(path).expect("read tfrecord");
        let mut records = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            let length_bytes: [u8; 8] = data[offset..offset + 8].try_into().unwrap();
            let length = u64::from_le_bytes(length_bytes) as usize;

            let length_crc =
                u32::from_le_bytes(data[offset + 8..offset + 12].try_into().unwrap());
            assert_eq!(length_crc, masked_crc32c(&length_bytes), "length crc");

            let payload = &data[offset + 12..offset + 12 + length];
            let payload_crc = u32::from_le_bytes(
                data[offset + 12 + length..offset + 16 + length]
                    .try_into()
                    .unwrap(),
            );
            assert_eq!(payload_crc, masked_crc32c(payload), "payload crc");

            records.push(payload.to_vec());
            offset += 16 + length;
        }

        records
    }

    #[test]
    fn masked_crc_matches_reference_transform() {
        // mask(crc) = ((crc >> 15) | (crc << 17)) + 0xa282ead8
        let crc = crc32c::crc32c(b"hello");
        let expected = ((crc >> 15) | (crc << 17)).wrapping_add(0xa282_ead8);
        assert_eq!(masked_crc32c(b"hello"), expected);
    }

    #[test]
    fn written_records_pass_crc_verification() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let dataset = sample_dataset();

        write_tfrecord_dir(temp.path(), &dataset, None).expect("write tfrecord");

        let records = read_records(&temp.path().join("dataset.tfrecord"));
        assert_eq!(records.len(), 1);

        let example = Example::decode(records[0].as_slice()).expect("decode example");
        let features = example.features.expect("features present").feature;

        let width = &features["image/width"];
        match width.kind.as_ref().expect("kind") {
            feature_kind::Kind::Int64List(list) => assert_eq!(list.value, vec![100]),
            other => panic!("unexpected kind: {other:?}"),
        }

        let xmins = &features["image/object/bbox/xmin"];
        match xmins.kind.as_ref().expect("kind") {
            feature_kind::Kind::FloatList(list) => {
                assert_eq!(list.value.len(), 2);
                assert!((list.value[0] - 0.1).abs() < 1e-6);
                assert!((list.value[1] - 0.0).abs() < 1e-6);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn label_map_is_sorted_with_one_based_ids() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let dataset = sample_dataset();

        write_tfrecord_dir(temp.path(), &dataset, None).expect("write tfrecord");

        let label_map: BTreeMap<String, usize> = serde_json::from_str(
            &fs::read_to_string(temp.path().join("label_map.json")).expect("read label map"),
        )
        .expect("parse label map");

        assert_eq!(label_map["dog"], 1);
        assert_eq!(label_map["person"], 2);
    }

    #[test]
    fn skips_unannotated_images_and_counts_missing_bytes() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let images = temp.path().join("images");
        fs::create_dir_all(&images).expect("create images dir");

        let mut dataset = sample_dataset();
        dataset.images.push(Image::new(2u64, "empty.bmp", 10, 10));

        let out = temp.path().join("out");
        let report =
            write_tfrecord_dir(&out, &dataset, Some(&images)).expect("write tfrecord");

        // The unannotated image gets no record; img1.bmp has no file on
        // disk, so its record carries an empty payload and is counted.
        assert_eq!(report.records_written, 1);
        assert_eq!(report.images_skipped_no_annotations, 1);
        assert_eq!(report.images_missing_bytes, 1);

        let records = read_records(&out.join("dataset.tfrecord"));
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn embeds_image_bytes_when_images_dir_is_given() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let images = temp.path().join("images");
        write_bmp(&images.join("img1.bmp"), 100, 50);

        let out = temp.path().join("out");
        let dataset = sample_dataset();

        write_tfrecord_dir(&out, &dataset, Some(&images)).expect("write tfrecord");

        let records = read_records(&out.join("dataset.tfrecord"));
        let example = Example::decode(records[0].as_slice()).expect("decode example");
        let features = example.features.expect("features present").feature;

        match features["image/encoded"].kind.as_ref().expect("kind") {
            feature_kind::Kind::BytesList(list) => {
                assert!(!list.value[0].is_empty());
                assert_eq!(&list.value[0][..2], b"BM");
            }
            other => panic!("unexpected kind: {other:?}"),
        }

        match features["image/format"].kind.as_ref().expect("kind") {
            feature_kind::Kind::BytesList(list) => assert_eq!(list.value[0], b"bmp"),
            other => panic!("unexpected kind: {other:?}"),
        }
    }
}
