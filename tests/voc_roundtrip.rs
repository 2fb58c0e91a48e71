//! Integration tests for Pascal VOC format support.

use std::fs;
use std::path::Path;

use labelport::ir::io_voc_xml::{read_voc_dir, write_voc_dir};
use labelport::LabelportError;

fn write_xml(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create annotations dir");
    }
    fs::write(path, contents).expect("write xml file");
}

fn create_sample_voc_dataset(root: &Path) {
    let beach_xml = r#"<?xml version="1.0" encoding="utf-8"?>
<annotation>
  <filename>beach.jpg</filename>
  <size>
    <width>200</width>
    <height>150</height>
    <depth>3</depth>
  </size>
  <object>
    <name>kite</name>
    <truncated>1</truncated>
    <bndbox>
      <xmin>20</xmin>
      <ymin>10</ymin>
      <xmax>90</xmax>
      <ymax>60</ymax>
    </bndbox>
  </object>
  <object>
    <name>bird</name>
    <pose>Flying</pose>
    <difficult>0</difficult>
    <bndbox>
      <xmin>100</xmin>
      <ymin>30</ymin>
      <xmax>140</xmax>
      <ymax>70</ymax>
    </bndbox>
  </object>
</annotation>
"#;

    let castle_xml = r#"<?xml version="1.0" encoding="utf-8"?>
<annotation>
  <filename>castle.jpg</filename>
  <size>
    <width>64</width>
    <height>48</height>
    <depth>3</depth>
  </size>
</annotation>
"#;

    write_xml(&root.join("Annotations/beach.xml"), beach_xml);
    write_xml(&root.join("Annotations/castle.xml"), castle_xml);
}

#[test]
fn read_voc_orders_images_and_categories() {
    let temp = tempfile::tempdir().expect("create temp dir");
    create_sample_voc_dataset(temp.path());

    let dataset = read_voc_dir(temp.path()).expect("read voc dataset");

    assert_eq!(dataset.images.len(), 2);
    assert_eq!(dataset.categories.len(), 2);
    assert_eq!(dataset.annotations.len(), 2);

    // Images ordered by file name, categories alphabetically.
    assert_eq!(dataset.images[0].file_name, "beach.jpg");
    assert_eq!(dataset.images[0].width, 200);
    assert_eq!(dataset.images[1].file_name, "castle.jpg");
    assert_eq!(dataset.categories[0].name, "bird");
    assert_eq!(dataset.categories[1].name, "kite");
}

#[test]
fn read_voc_carries_object_attributes() {
    let temp = tempfile::tempdir().expect("create temp dir");
    create_sample_voc_dataset(temp.path());

    let dataset = read_voc_dir(temp.path()).expect("read voc dataset");

    let kite = &dataset.annotations[0];
    assert_eq!(kite.attributes.get("truncated").map(String::as_str), Some("1"));
    assert_eq!(kite.bbox.xmin(), 20.0);
    assert_eq!(kite.bbox.ymax(), 60.0);

    let bird = &dataset.annotations[1];
    assert_eq!(bird.attributes.get("pose").map(String::as_str), Some("Flying"));
    assert_eq!(bird.attributes.get("difficult").map(String::as_str), Some("0"));
}

#[test]
fn read_voc_from_annotations_dir_succeeds() {
    let temp = tempfile::tempdir().expect("create temp dir");
    create_sample_voc_dataset(temp.path());

    let dataset = read_voc_dir(&temp.path().join("Annotations")).expect("read voc dataset");
    assert_eq!(dataset.images.len(), 2);
}

#[test]
fn read_voc_rejects_duplicate_filenames() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let xml = r#"<?xml version="1.0"?>
<annotation>
  <filename>same.jpg</filename>
  <size><width>10</width><height>10</height></size>
</annotation>
"#;
    write_xml(&temp.path().join("Annotations/one.xml"), xml);
    write_xml(&temp.path().join("Annotations/two.xml"), xml);

    let err = read_voc_dir(temp.path()).unwrap_err();
    match err {
        LabelportError::VocXmlParse { message, .. } => {
            assert!(message.contains("duplicate"));
        }
        other => panic!("expected VocXmlParse, got {other:?}"),
    }
}

#[test]
fn voc_write_then_read_roundtrip_semantic() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let input_root = temp.path().join("input_voc");
    let output_root = temp.path().join("output_voc");

    create_sample_voc_dataset(&input_root);

    let input_dataset = read_voc_dir(&input_root).expect("read input dataset");
    write_voc_dir(&output_root, &input_dataset).expect("write voc dataset");

    assert!(output_root.join("Annotations").is_dir());

    let restored = read_voc_dir(&output_root).expect("read restored dataset");

    assert_eq!(restored.images.len(), input_dataset.images.len());
    assert_eq!(restored.categories.len(), input_dataset.categories.len());
    assert_eq!(restored.annotations.len(), input_dataset.annotations.len());

    for (left, right) in input_dataset
        .annotations
        .iter()
        .zip(restored.annotations.iter())
    {
        assert_eq!(left.bbox.xmin(), right.bbox.xmin());
        assert_eq!(left.bbox.ymin(), right.bbox.ymin());
        assert_eq!(left.bbox.xmax(), right.bbox.xmax());
        assert_eq!(left.bbox.ymax(), right.bbox.ymax());
        assert_eq!(left.attributes, right.attributes);
    }
}
