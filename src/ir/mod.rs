//! Intermediate representation for annotation datasets.
//!
//! All supported formats read into and write out of the types defined here.
//! Coordinate spaces are tracked in the type system: boxes are stored in
//! pixel space, polygons in normalized space, and conversions between the
//! two require the image dimensions.

pub mod bbox;
pub mod coord;
pub mod ids;
pub mod io_coco_json;
pub mod io_json;
pub mod io_tfrecord;
pub mod io_voc_xml;
pub mod io_yolo;
pub mod io_yolo_seg;
pub mod model;
pub mod polygon;
pub mod space;

pub use bbox::BBoxXYXY;
pub use coord::Coord;
pub use ids::{AnnotationId, CategoryId, ImageId};
pub use model::{Annotation, Category, Dataset, DatasetInfo, Image};
pub use polygon::Polygon;
pub use space::{Normalized, Pixel};
