use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::fs::copy;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use crate::config::SplitArgs;
use crate::io::{create_dataset_yaml, list_images, read_classes_file, setup_split_directories};
use crate::types::SplitStats;
use crate::utils::create_progress_bar;

/// Error types for the dataset splitter.
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    /// The root directory is missing the `images/` or `labels/` subdirectory
    #[error("missing input directory: {0}")]
    MissingInput(PathBuf),

    /// The train and validation ratios sum to more than 1.0
    #[error("train_size + val_size must not exceed 1.0 (got {0})")]
    InvalidRatios(f64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An image file paired with its same-stem label file.
#[derive(Debug, Clone)]
pub struct PairedFile {
    pub image: PathBuf,
    pub label: PathBuf,
}

/// Pair image files with `<stem>.txt` label files; images without a label
/// are counted, not paired.
pub fn collect_pairs(
    images_dir: &Path,
    labels_dir: &Path,
) -> Result<(Vec<PairedFile>, usize), SplitError> {
    let mut pairs = Vec::new();
    let mut unpaired = 0;
    for image in list_images(images_dir)? {
        let stem = match image.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => continue,
        };
        let label = labels_dir.join(format!("{stem}.txt"));
        if label.is_file() {
            pairs.push(PairedFile { image, label });
        } else {
            unpaired += 1;
        }
    }
    Ok((pairs, unpaired))
}

/// Partition pairs into train/valid/test by ratio.
///
/// Counts are `floor(N * train_size)` and `floor(N * val_size)`, with the
/// remainder as test; every pair lands in exactly one partition. The base
/// order is the sorted filename order, so a fixed seed (or disabled
/// shuffling) makes the assignment idempotent across runs.
pub fn split_pairs(
    mut pairs: Vec<PairedFile>,
    train_size: f64,
    val_size: f64,
    seed: u64,
    shuffle: bool,
) -> Result<(Vec<PairedFile>, Vec<PairedFile>, Vec<PairedFile>), SplitError> {
    if train_size + val_size > 1.0 {
        return Err(SplitError::InvalidRatios(train_size + val_size));
    }

    if shuffle {
        let mut rng = StdRng::seed_from_u64(seed);
        pairs.shuffle(&mut rng);
    }

    let total = pairs.len();
    let train_count = (total as f64 * train_size).floor() as usize;
    let val_count = (total as f64 * val_size).floor() as usize;

    let test = pairs.split_off(train_count + val_count.min(total - train_count));
    let valid = pairs.split_off(train_count);
    Ok((pairs, valid, test))
}

/// Run the dataset splitter: copy pairs into train/valid/test trees and
/// write `dataset.yaml`.
pub fn run_split(args: &SplitArgs) -> Result<SplitStats, SplitError> {
    let images_dir = args.root_dir.join("images");
    let labels_dir = args.root_dir.join("labels");
    for dir in [&images_dir, &labels_dir] {
        if !dir.is_dir() {
            return Err(SplitError::MissingInput(dir.clone()));
        }
    }

    let (pairs, unpaired) = collect_pairs(&images_dir, &labels_dir)?;
    let (train, valid, test) = split_pairs(
        pairs,
        args.train_size,
        args.val_size,
        args.seed,
        !args.no_shuffle,
    )?;

    let dirs = setup_split_directories(&args.root_dir)?;
    let train_pairs = copy_split(&train, &dirs.train_images_dir, &dirs.train_labels_dir, "Train");
    let valid_pairs = copy_split(&valid, &dirs.valid_images_dir, &dirs.valid_labels_dir, "Valid");
    let test_pairs = copy_split(&test, &dirs.test_images_dir, &dirs.test_labels_dir, "Test");

    let names = class_names(args)?;
    create_dataset_yaml(&args.root_dir, &names)?;

    Ok(SplitStats {
        train_pairs,
        valid_pairs,
        test_pairs,
        unpaired_images: unpaired,
    })
}

// Copy one partition in parallel; per-file failures are logged and skipped.
fn copy_split(pairs: &[PairedFile], images_dir: &Path, labels_dir: &Path, label: &str) -> usize {
    let pb = create_progress_bar(pairs.len() as u64, label);
    let copied = AtomicUsize::new(0);

    pairs.par_iter().for_each(|pair| {
        let result = copy_pair(pair, images_dir, labels_dir);
        match result {
            Ok(()) => {
                copied.fetch_add(1, Relaxed);
            }
            Err(e) => {
                log::error!("Failed to copy {}: {}", pair.image.display(), e);
            }
        }
        pb.inc(1);
    });

    pb.finish_with_message(format!("{label} copy complete"));
    copied.load(Relaxed)
}

fn copy_pair(pair: &PairedFile, images_dir: &Path, labels_dir: &Path) -> std::io::Result<()> {
    let image_name = sanitize_filename::sanitize(
        pair.image
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default(),
    );
    let label_name = sanitize_filename::sanitize(
        pair.label
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default(),
    );
    copy(&pair.image, images_dir.join(image_name))?;
    copy(&pair.label, labels_dir.join(label_name))?;
    Ok(())
}

// Class names for dataset.yaml: explicit list first, then the classes file
// the generator leaves next to its labels.
fn class_names(args: &SplitArgs) -> std::io::Result<Vec<String>> {
    if !args.label_list.is_empty() {
        return Ok(args.label_list.clone());
    }
    for candidate in [
        args.root_dir.join("classes.txt"),
        args.root_dir.join("labels/classes.txt"),
    ] {
        if candidate.is_file() {
            return read_classes_file(&candidate);
        }
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_pairs(count: usize) -> Vec<PairedFile> {
        (0..count)
            .map(|i| PairedFile {
                image: PathBuf::from(format!("{i}.jpg")),
                label: PathBuf::from(format!("{i}.txt")),
            })
            .collect()
    }

    #[test]
    fn split_counts_follow_floor_semantics() {
        let (train, valid, test) = split_pairs(make_pairs(10), 0.7, 0.2, 42, true).unwrap();
        assert_eq!(train.len(), 7);
        assert_eq!(valid.len(), 2);
        assert_eq!(test.len(), 1);

        // floor() on both partitions, remainder to test
        let (train, valid, test) = split_pairs(make_pairs(7), 0.5, 0.25, 42, true).unwrap();
        assert_eq!(train.len(), 3);
        assert_eq!(valid.len(), 1);
        assert_eq!(test.len(), 3);
    }

    #[test]
    fn every_pair_lands_in_exactly_one_partition() {
        let (train, valid, test) = split_pairs(make_pairs(23), 0.6, 0.2, 7, true).unwrap();
        let mut all: Vec<_> = train
            .iter()
            .chain(valid.iter())
            .chain(test.iter())
            .map(|pair| pair.image.clone())
            .collect();
        assert_eq!(all.len(), 23);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 23);
    }

    #[test]
    fn fixed_seed_is_idempotent() {
        let first = split_pairs(make_pairs(20), 0.7, 0.2, 42, true).unwrap();
        let second = split_pairs(make_pairs(20), 0.7, 0.2, 42, true).unwrap();
        let stems = |pairs: &[PairedFile]| -> Vec<PathBuf> {
            pairs.iter().map(|pair| pair.image.clone()).collect()
        };
        assert_eq!(stems(&first.0), stems(&second.0));
        assert_eq!(stems(&first.1), stems(&second.1));
        assert_eq!(stems(&first.2), stems(&second.2));
    }

    #[test]
    fn disabled_shuffle_keeps_sorted_order() {
        let (train, _, _) = split_pairs(make_pairs(5), 0.6, 0.2, 42, false).unwrap();
        assert_eq!(train[0].image, PathBuf::from("0.jpg"));
        assert_eq!(train[1].image, PathBuf::from("1.jpg"));
        assert_eq!(train[2].image, PathBuf::from("2.jpg"));
    }

    #[test]
    fn rejects_ratio_overflow() {
        assert!(matches!(
            split_pairs(make_pairs(4), 0.8, 0.4, 42, true),
            Err(SplitError::InvalidRatios(_))
        ));
    }

    #[test]
    fn collect_pairs_skips_unpaired_images() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let labels = dir.path().join("labels");
        fs::create_dir_all(&images).unwrap();
        fs::create_dir_all(&labels).unwrap();
        for name in ["0.jpg", "1.jpg", "2.jpg"] {
            fs::write(images.join(name), b"x").unwrap();
        }
        fs::write(labels.join("0.txt"), b"").unwrap();
        fs::write(labels.join("2.txt"), b"").unwrap();

        let (pairs, unpaired) = collect_pairs(&images, &labels).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(unpaired, 1);
    }
}
