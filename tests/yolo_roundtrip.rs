//! Integration tests for YOLO detection format support.

use std::fs;
use std::path::Path;

use labelport::ir::io_yolo::{read_yolo_dir, write_yolo_dir};
use labelport::LabelportError;

mod common;
use common::{write_bmp, write_text};

fn create_sample_dataset(root: &Path) {
    write_bmp(&root.join("images/val/frame_02.bmp"), 16, 12);
    write_bmp(&root.join("images/val/frame_01.bmp"), 40, 20);
    write_bmp(&root.join("images/val/frame_03.bmp"), 10, 10);

    write_text(
        &root.join("data.yaml"),
        "names:\n  - car\n  - truck\n  - bus\n",
    );

    write_text(
        &root.join("labels/val/frame_01.txt"),
        "0 0.25 0.5 0.3 0.6\n2 0.75 0.25 0.1 0.3\n",
    );
    write_text(&root.join("labels/val/frame_02.txt"), "1 0.5 0.5 0.25 0.5\n");
    // frame_03 has no label file on purpose.
}

fn copy_images_for_reread(src_root: &Path, dst_root: &Path) {
    for image_name in ["frame_01.bmp", "frame_02.bmp", "frame_03.bmp"] {
        let src = src_root.join("images/val").join(image_name);
        let dst = dst_root.join("images/val").join(image_name);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).expect("create output image dir");
        }
        fs::copy(src, dst).expect("copy image for reread");
    }
}

#[test]
fn read_yolo_assigns_ids_by_relative_path() {
    let temp = tempfile::tempdir().expect("create temp dir");
    create_sample_dataset(temp.path());

    let dataset = read_yolo_dir(temp.path()).expect("read yolo dataset");

    assert_eq!(dataset.images.len(), 3);
    assert_eq!(dataset.categories.len(), 3);
    assert_eq!(dataset.annotations.len(), 3);

    // frame_02 sorts after frame_01 even though it was written first.
    assert_eq!(dataset.images[0].file_name, "val/frame_01.bmp");
    assert_eq!(dataset.images[0].id.as_u64(), 1);
    assert_eq!(dataset.images[1].file_name, "val/frame_02.bmp");
    assert_eq!(dataset.images[1].id.as_u64(), 2);
    assert_eq!(dataset.images[2].file_name, "val/frame_03.bmp");
    assert_eq!(dataset.images[2].id.as_u64(), 3);

    assert_eq!(dataset.categories[0].name, "car");
    assert_eq!(dataset.categories[2].name, "bus");
}

#[test]
fn read_yolo_denormalizes_boxes_to_pixels() {
    let temp = tempfile::tempdir().expect("create temp dir");
    create_sample_dataset(temp.path());

    let dataset = read_yolo_dir(temp.path()).expect("read yolo dataset");

    // frame_01 is 40x20; center 0.25,0.5 and size 0.3x0.6
    // => xmin=4, xmax=16, ymin=4, ymax=16.
    let bbox = &dataset.annotations[0].bbox;
    assert!((bbox.xmin() - 4.0).abs() < 1e-6);
    assert!((bbox.ymin() - 4.0).abs() < 1e-6);
    assert!((bbox.xmax() - 16.0).abs() < 1e-6);
    assert!((bbox.ymax() - 16.0).abs() < 1e-6);

    // Class 2 maps to the third category (1-based category ids).
    assert_eq!(dataset.annotations[1].category_id.as_u64(), 3);
}

#[test]
fn read_yolo_from_labels_dir_succeeds() {
    let temp = tempfile::tempdir().expect("create temp dir");
    create_sample_dataset(temp.path());

    let dataset = read_yolo_dir(&temp.path().join("labels")).expect("read yolo dataset");
    assert_eq!(dataset.images.len(), 3);
    assert_eq!(dataset.annotations.len(), 3);
}

#[test]
fn read_yolo_rejects_polygon_rows() {
    let temp = tempfile::tempdir().expect("create temp dir");

    write_bmp(&temp.path().join("images/img1.bmp"), 8, 8);
    write_text(
        &temp.path().join("labels/img1.txt"),
        "0 0.1 0.2 0.3 0.4 0.5 0.6\n",
    );

    let err = read_yolo_dir(temp.path()).unwrap_err();
    match err {
        LabelportError::YoloLabelParse { message, .. } => {
            assert!(message.contains("yolo-seg"));
        }
        other => panic!("expected YoloLabelParse, got {other:?}"),
    }
}

#[test]
fn read_yolo_rejects_out_of_range_class_id() {
    let temp = tempfile::tempdir().expect("create temp dir");

    write_bmp(&temp.path().join("images/img1.bmp"), 8, 8);
    write_text(&temp.path().join("data.yaml"), "names:\n  - car\n");
    write_text(&temp.path().join("labels/img1.txt"), "5 0.5 0.5 0.2 0.2\n");

    let err = read_yolo_dir(temp.path()).unwrap_err();
    assert!(matches!(err, LabelportError::YoloLabelParse { .. }));
}

#[test]
fn yolo_write_then_read_roundtrip_semantic() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let input_root = temp.path().join("input_yolo");
    let output_root = temp.path().join("output_yolo");

    create_sample_dataset(&input_root);

    let input_dataset = read_yolo_dir(&input_root).expect("read input dataset");
    write_yolo_dir(&output_root, &input_dataset).expect("write yolo dataset");

    // Writer creates an empty label file for the unannotated frame_03.
    let empty_label = output_root.join("labels/val/frame_03.txt");
    assert!(empty_label.is_file());
    let contents = fs::read_to_string(&empty_label).expect("read empty label");
    assert!(contents.is_empty());

    // Writer does not copy image binaries.
    assert!(output_root.join("images").is_dir());
    assert!(!output_root.join("images/val/frame_01.bmp").exists());

    copy_images_for_reread(&input_root, &output_root);

    let restored = read_yolo_dir(&output_root).expect("read restored dataset");

    assert_eq!(restored.images.len(), input_dataset.images.len());
    assert_eq!(restored.categories.len(), input_dataset.categories.len());
    assert_eq!(restored.annotations.len(), input_dataset.annotations.len());

    for (left, right) in input_dataset
        .annotations
        .iter()
        .zip(restored.annotations.iter())
    {
        assert!((left.bbox.xmin() - right.bbox.xmin()).abs() < 1e-3);
        assert!((left.bbox.ymin() - right.bbox.ymin()).abs() < 1e-3);
        assert!((left.bbox.xmax() - right.bbox.xmax()).abs() < 1e-3);
        assert!((left.bbox.ymax() - right.bbox.ymax()).abs() < 1e-3);
    }
}
