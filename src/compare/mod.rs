//! Dataset comparison.
//!
//! Compares two datasets loaded into IR and reports how their images,
//! labels and annotation counts differ. Images match by file name and
//! categories by label name, so the two sides can come from different
//! formats with unrelated numeric ids.

mod report;

pub use report::{CompareReport, LabelDelta, OverlapCounts, SideCounts};

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::ir::Dataset;

/// Options for dataset comparison.
#[derive(Clone, Debug)]
pub struct CompareOptions {
    /// Listing cap for the only-in-one-side file name lists.
    pub max_listed: usize,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self { max_listed: 10 }
    }
}

/// Compare two datasets by image file names and label distributions.
pub fn compare_datasets(left: &Dataset, right: &Dataset, opts: &CompareOptions) -> CompareReport {
    let names_left: BTreeSet<&str> = left.images.iter().map(|img| img.file_name.as_str()).collect();
    let names_right: BTreeSet<&str> =
        right.images.iter().map(|img| img.file_name.as_str()).collect();

    let labels_left: BTreeSet<&str> =
        left.categories.iter().map(|cat| cat.name.as_str()).collect();
    let labels_right: BTreeSet<&str> =
        right.categories.iter().map(|cat| cat.name.as_str()).collect();

    let counts_left = label_counts(left);
    let counts_right = label_counts(right);

    let mut labels = Vec::new();
    let all_labels: BTreeSet<&str> = counts_left
        .keys()
        .chain(counts_right.keys())
        .copied()
        .collect();
    for label in all_labels {
        labels.push(LabelDelta {
            label: label.to_string(),
            left: counts_left.get(label).copied().unwrap_or(0),
            right: counts_right.get(label).copied().unwrap_or(0),
        });
    }

    CompareReport {
        images: OverlapCounts {
            shared: names_left.intersection(&names_right).count(),
            only_in_left: names_left.difference(&names_right).count(),
            only_in_right: names_right.difference(&names_left).count(),
        },
        categories: OverlapCounts {
            shared: labels_left.intersection(&labels_right).count(),
            only_in_left: labels_left.difference(&labels_right).count(),
            only_in_right: labels_right.difference(&labels_left).count(),
        },
        annotations: SideCounts {
            left: left.annotations.len(),
            right: right.annotations.len(),
        },
        unannotated_images: SideCounts {
            left: unannotated_count(left),
            right: unannotated_count(right),
        },
        labels,
        files_only_in_left: listed(&names_left, &names_right, opts.max_listed),
        files_only_in_right: listed(&names_right, &names_left, opts.max_listed),
        max_listed: opts.max_listed,
    }
}

/// Annotation counts per label name.
fn label_counts(dataset: &Dataset) -> BTreeMap<&str, usize> {
    let name_by_id: BTreeMap<_, _> = dataset
        .categories
        .iter()
        .map(|cat| (cat.id, cat.name.as_str()))
        .collect();

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for ann in &dataset.annotations {
        if let Some(name) = name_by_id.get(&ann.category_id).copied() {
            *counts.entry(name).or_default() += 1;
        }
    }
    counts
}

fn unannotated_count(dataset: &Dataset) -> usize {
    let annotated: HashSet<_> = dataset.annotations.iter().map(|ann| ann.image_id).collect();
    dataset
        .images
        .iter()
        .filter(|img| !annotated.contains(&img.id))
        .count()
}

fn listed(side: &BTreeSet<&str>, other: &BTreeSet<&str>, max_listed: usize) -> Vec<String> {
    side.difference(other)
        .take(max_listed)
        .map(|name| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Annotation, BBoxXYXY, Category, Image, Pixel};

    fn base_dataset() -> Dataset {
        Dataset {
            images: vec![
                Image::new(1u64, "one.jpg", 100, 100),
                Image::new(2u64, "two.jpg", 100, 100),
            ],
            categories: vec![Category::new(1u64, "car"), Category::new(2u64, "bus")],
            annotations: vec![
                Annotation::new(
                    1u64,
                    1u64,
                    1u64,
                    BBoxXYXY::<Pixel>::from_xyxy(10.0, 10.0, 20.0, 20.0),
                ),
                Annotation::new(
                    2u64,
                    2u64,
                    2u64,
                    BBoxXYXY::<Pixel>::from_xyxy(30.0, 30.0, 50.0, 50.0),
                ),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn identical_datasets_report_no_differences() {
        let left = base_dataset();
        let right = base_dataset();

        let report = compare_datasets(&left, &right, &CompareOptions::default());

        assert!(report.is_identical());
        assert_eq!(report.images.shared, 2);
        assert_eq!(report.categories.shared, 2);
        assert_eq!(report.annotations.delta(), 0);
        assert!(report.files_only_in_left.is_empty());
        assert!(report.files_only_in_right.is_empty());
    }

    #[test]
    fn matches_images_by_file_name_not_id() {
        let left = base_dataset();
        let mut right = base_dataset();
        for (offset, image) in right.images.iter_mut().enumerate() {
            image.id = (100 + offset as u64).into();
        }
        for (offset, ann) in right.annotations.iter_mut().enumerate() {
            ann.image_id = (100 + offset as u64).into();
        }

        let report = compare_datasets(&left, &right, &CompareOptions::default());
        assert_eq!(report.images.shared, 2);
        assert_eq!(report.images.only_in_left, 0);
        assert_eq!(report.images.only_in_right, 0);
    }

    #[test]
    fn reports_per_label_count_deltas() {
        let left = base_dataset();
        let mut right = base_dataset();
        right.annotations.push(Annotation::new(
            3u64,
            1u64,
            1u64,
            BBoxXYXY::<Pixel>::from_xyxy(60.0, 60.0, 80.0, 80.0),
        ));
        right.categories.push(Category::new(3u64, "truck"));

        let report = compare_datasets(&left, &right, &CompareOptions::default());

        assert!(!report.is_identical());
        assert_eq!(report.categories.only_in_right, 1);
        assert_eq!(report.annotations.delta(), 1);

        let car = report
            .labels
            .iter()
            .find(|row| row.label == "car")
            .expect("car row");
        assert_eq!(car.left, 1);
        assert_eq!(car.right, 2);
        assert_eq!(car.delta(), 1);
    }

    #[test]
    fn lists_side_only_files_up_to_the_cap() {
        let left = base_dataset();
        let mut right = base_dataset();
        right.images[1].file_name = "three.jpg".into();

        let opts = CompareOptions { max_listed: 1 };
        let report = compare_datasets(&left, &right, &opts);

        assert_eq!(report.images.shared, 1);
        assert_eq!(report.files_only_in_left, vec!["two.jpg".to_string()]);
        assert_eq!(report.files_only_in_right, vec!["three.jpg".to_string()]);
    }

    #[test]
    fn counts_images_without_annotations() {
        let left = base_dataset();
        let mut right = base_dataset();
        right.annotations.pop();

        let report = compare_datasets(&left, &right, &CompareOptions::default());
        assert_eq!(report.unannotated_images.left, 0);
        assert_eq!(report.unannotated_images.right, 1);
    }
}
