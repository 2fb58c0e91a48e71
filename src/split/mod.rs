//! Train/val/test dataset partitioning.

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use std::collections::HashSet;

use crate::error::LabelportError;
use crate::ir::{Dataset, ImageId};

/// Ratio sum tolerance.
const RATIO_TOLERANCE: f64 = 1e-6;

/// Split options.
#[derive(Clone, Debug)]
pub struct SplitOptions {
    pub train: f64,
    pub val: f64,
    pub test: f64,
    pub seed: Option<u64>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            train: 0.7,
            val: 0.2,
            test: 0.1,
            seed: None,
        }
    }
}

/// The three subsets produced by [`split_dataset`].
#[derive(Clone, Debug)]
pub struct SplitResult {
    pub train: Dataset,
    pub val: Dataset,
    pub test: Dataset,
}

impl SplitResult {
    /// Image counts per subset, in train/val/test order.
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.train.images.len(),
            self.val.images.len(),
            self.test.images.len(),
        )
    }
}

/// Validate split options before running.
pub fn validate_split_options(opts: &SplitOptions) -> Result<(), LabelportError> {
    for (name, ratio) in [("train", opts.train), ("val", opts.val), ("test", opts.test)] {
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(LabelportError::InvalidSplitParams {
                message: format!("--{} must be a non-negative finite ratio", name),
            });
        }
    }

    let sum = opts.train + opts.val + opts.test;
    if (sum - 1.0).abs() > RATIO_TOLERANCE {
        return Err(LabelportError::InvalidSplitParams {
            message: format!("ratios must sum to 1.0 (got {})", sum),
        });
    }

    Ok(())
}

/// Partitions a dataset into train/val/test subsets by image.
///
/// Images are shuffled (deterministically when a seed is given) and
/// partitioned by ratio; annotations follow their image. Original IDs are
/// preserved in every subset, and the category table is carried whole so a
/// subset never loses class definitions.
pub fn split_dataset(dataset: &Dataset, opts: &SplitOptions) -> Result<SplitResult, LabelportError> {
    validate_split_options(opts)?;

    let mut ids = sorted_image_ids(dataset);

    if let Some(seed) = opts.seed {
        let mut rng = StdRng::seed_from_u64(seed);
        ids.shuffle(&mut rng);
    } else {
        let mut rng = rand::rng();
        ids.shuffle(&mut rng);
    }

    let total = ids.len();
    let train_count = (total as f64 * opts.train) as usize;
    let val_count = (total as f64 * opts.val) as usize;

    let train_ids: HashSet<ImageId> = ids[..train_count].iter().copied().collect();
    let val_ids: HashSet<ImageId> = ids[train_count..train_count + val_count]
        .iter()
        .copied()
        .collect();
    let test_ids: HashSet<ImageId> = ids[train_count + val_count..].iter().copied().collect();

    Ok(SplitResult {
        train: subset_by_image_ids(dataset, &train_ids),
        val: subset_by_image_ids(dataset, &val_ids),
        test: subset_by_image_ids(dataset, &test_ids),
    })
}

/// Image IDs ordered by file name so shuffling starts from a stable order.
fn sorted_image_ids(dataset: &Dataset) -> Vec<ImageId> {
    let mut rows: Vec<(String, ImageId)> = dataset
        .images
        .iter()
        .map(|image| (image.file_name.clone(), image.id))
        .collect();

    rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    rows.into_iter().map(|(_, id)| id).collect()
}

/// Create a subset dataset by selected image IDs, preserving original IDs.
pub fn subset_by_image_ids(dataset: &Dataset, keep: &HashSet<ImageId>) -> Dataset {
    let images = dataset
        .images
        .iter()
        .filter(|image| keep.contains(&image.id))
        .cloned()
        .collect();

    let annotations = dataset
        .annotations
        .iter()
        .filter(|ann| keep.contains(&ann.image_id))
        .cloned()
        .collect();

    Dataset {
        info: dataset.info.clone(),
        images,
        categories: dataset.categories.clone(),
        annotations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Annotation, BBoxXYXY, Category, Image, Pixel};

    fn make_dataset(image_count: usize) -> Dataset {
        let images = (0..image_count)
            .map(|i| Image::new(i as u64 + 1, format!("img_{:03}.jpg", i), 100, 100))
            .collect();

        let annotations = (0..image_count)
            .map(|i| {
                Annotation::new(
                    i as u64 + 1,
                    i as u64 + 1,
                    1u64,
                    BBoxXYXY::<Pixel>::from_xyxy(1.0, 1.0, 10.0, 10.0),
                )
            })
            .collect();

        Dataset {
            images,
            categories: vec![Category::new(1u64, "person")],
            annotations,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_ratios_not_summing_to_one() {
        let opts = SplitOptions {
            train: 0.5,
            val: 0.2,
            test: 0.2,
            seed: None,
        };
        assert!(validate_split_options(&opts).is_err());
    }

    #[test]
    fn rejects_negative_ratio() {
        let opts = SplitOptions {
            train: 1.2,
            val: -0.1,
            test: -0.1,
            seed: None,
        };
        assert!(validate_split_options(&opts).is_err());
    }

    #[test]
    fn partitions_by_ratio() {
        let dataset = make_dataset(10);
        let result = split_dataset(&dataset, &SplitOptions::default()).unwrap();

        assert_eq!(result.counts(), (7, 2, 1));
        let total: usize = [&result.train, &result.val, &result.test]
            .iter()
            .map(|d| d.images.len())
            .sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn annotations_follow_their_image() {
        let dataset = make_dataset(10);
        let result = split_dataset(
            &dataset,
            &SplitOptions {
                seed: Some(7),
                ..Default::default()
            },
        )
        .unwrap();

        for subset in [&result.train, &result.val, &result.test] {
            let image_ids: HashSet<ImageId> = subset.images.iter().map(|i| i.id).collect();
            assert!(subset
                .annotations
                .iter()
                .all(|ann| image_ids.contains(&ann.image_id)));
            assert_eq!(subset.annotations.len(), subset.images.len());
        }
    }

    #[test]
    fn same_seed_same_partition() {
        let dataset = make_dataset(20);
        let opts = SplitOptions {
            seed: Some(42),
            ..Default::default()
        };

        let a = split_dataset(&dataset, &opts).unwrap();
        let b = split_dataset(&dataset, &opts).unwrap();

        let ids = |d: &Dataset| d.images.iter().map(|i| i.id).collect::<Vec<_>>();
        assert_eq!(ids(&a.train), ids(&b.train));
        assert_eq!(ids(&a.val), ids(&b.val));
        assert_eq!(ids(&a.test), ids(&b.test));
    }

    #[test]
    fn categories_carried_into_every_subset() {
        let dataset = make_dataset(5);
        let result = split_dataset(
            &dataset,
            &SplitOptions {
                seed: Some(1),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(result.train.categories.len(), 1);
        assert_eq!(result.val.categories.len(), 1);
        assert_eq!(result.test.categories.len(), 1);
    }
}
