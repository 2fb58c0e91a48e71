//! Integration tests for COCO JSON format support.

use std::fs;
use std::path::Path;

use labelport::ir::io_coco_json::{read_coco_json, write_coco_json};

fn write_sample_coco(path: &Path) {
    let json = r#"{
  "info": {"version": "1.0", "year": 2024},
  "images": [
    {"id": 10, "file_name": "street.jpg", "width": 400, "height": 300},
    {"id": 11, "file_name": "park.jpg", "width": 200, "height": 200}
  ],
  "categories": [
    {"id": 3, "name": "dog", "supercategory": "animal"},
    {"id": 7, "name": "bench"}
  ],
  "annotations": [
    {"id": 1, "image_id": 10, "category_id": 3, "bbox": [40.0, 30.0, 100.0, 60.0], "iscrowd": 0},
    {
      "id": 2,
      "image_id": 11,
      "category_id": 7,
      "bbox": [20.0, 20.0, 80.0, 80.0],
      "segmentation": [[20.0, 20.0, 100.0, 20.0, 60.0, 100.0]],
      "score": 0.9
    }
  ]
}"#;
    fs::write(path, json).expect("write coco json");
}

#[test]
fn read_coco_preserves_original_ids() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let input = temp.path().join("coco.json");
    write_sample_coco(&input);

    let dataset = read_coco_json(&input).expect("read coco dataset");

    assert_eq!(dataset.images.len(), 2);
    assert_eq!(dataset.images[0].id.as_u64(), 10);
    assert_eq!(dataset.categories[0].id.as_u64(), 3);
    assert_eq!(dataset.categories[0].supercategory.as_deref(), Some("animal"));
    assert_eq!(dataset.info.version.as_deref(), Some("1.0"));
}

#[test]
fn read_coco_converts_xywh_to_corners() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let input = temp.path().join("coco.json");
    write_sample_coco(&input);

    let dataset = read_coco_json(&input).expect("read coco dataset");

    let bbox = &dataset.annotations[0].bbox;
    assert_eq!(bbox.xmin(), 40.0);
    assert_eq!(bbox.ymin(), 30.0);
    assert_eq!(bbox.xmax(), 140.0);
    assert_eq!(bbox.ymax(), 90.0);
}

#[test]
fn read_coco_normalizes_segmentation_ring() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let input = temp.path().join("coco.json");
    write_sample_coco(&input);

    let dataset = read_coco_json(&input).expect("read coco dataset");

    let seg = dataset.annotations[1]
        .segmentation
        .as_ref()
        .expect("polygon annotation");
    assert_eq!(seg.point_count(), 3);

    // park.jpg is 200x200, so pixel x=100 normalizes to 0.5.
    let flat = seg.to_flat();
    assert!((flat[2] - 0.5).abs() < 1e-9);

    assert_eq!(dataset.annotations[1].confidence, Some(0.9));
}

#[test]
fn coco_write_then_read_roundtrip_semantic() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let input = temp.path().join("input.coco.json");
    let output = temp.path().join("output.coco.json");
    write_sample_coco(&input);

    let input_dataset = read_coco_json(&input).expect("read input dataset");
    write_coco_json(&output, &input_dataset).expect("write coco dataset");
    let restored = read_coco_json(&output).expect("read restored dataset");

    assert_eq!(restored.images.len(), input_dataset.images.len());
    assert_eq!(restored.categories.len(), input_dataset.categories.len());
    assert_eq!(restored.annotations.len(), input_dataset.annotations.len());

    for (left, right) in input_dataset
        .annotations
        .iter()
        .zip(restored.annotations.iter())
    {
        assert_eq!(left.id, right.id);
        assert_eq!(left.image_id, right.image_id);
        assert_eq!(left.category_id, right.category_id);
        assert!((left.bbox.xmin() - right.bbox.xmin()).abs() < 1e-9);
        assert!((left.bbox.ymax() - right.bbox.ymax()).abs() < 1e-9);
        assert_eq!(left.confidence, right.confidence);
        assert_eq!(
            left.segmentation.as_ref().map(|p| p.point_count()),
            right.segmentation.as_ref().map(|p| p.point_count())
        );
    }
}
