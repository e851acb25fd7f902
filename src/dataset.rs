//! On-disk segmentation dataset: `src/` images with `gt/` color masks.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::augment::{build_eval_pipeline, build_training_pipeline, to_normalized_tensor, to_tensor};
use crate::config::{AugmentationConfig, Config};
use crate::mask::{normalize_rgb, ColorMapping};
use crate::pipeline::{Pipeline, Sample};

pub const SOURCE_DIR: &str = "src";
pub const MASK_DIR: &str = "gt";
pub const MASK_EXTENSION: &str = "png";
pub const DEFAULT_SPLIT_SEED: u64 = 42;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "bmp"];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Path of the ground-truth mask for a source image: the `src` folder is
/// swapped for `gt` and the extension for `.png`.
pub fn mask_path(item: &Path) -> PathBuf {
    let components: Vec<Component> = item.components().collect();
    let src_index = components
        .iter()
        .rposition(|c| c.as_os_str() == SOURCE_DIR);

    let mut path = PathBuf::new();
    for (i, component) in components.iter().enumerate() {
        if Some(i) == src_index {
            path.push(MASK_DIR);
        } else {
            path.push(component.as_os_str());
        }
    }
    path.set_extension(MASK_EXTENSION);
    path
}

/// Load a source image and its class mask
pub fn load_sample(item: &Path, mapping: &ColorMapping) -> Result<Sample> {
    let image = image::open(item)
        .with_context(|| format!("Failed to open image {}", item.display()))?
        .to_rgb8();

    let mask_file = mask_path(item);
    let colors = image::open(&mask_file)
        .with_context(|| format!("Failed to open mask {}", mask_file.display()))?
        .to_rgb8();

    if image.dimensions() != colors.dimensions() {
        anyhow::bail!(
            "Mask {} is {:?} but image {} is {:?}",
            mask_file.display(),
            colors.dimensions(),
            item.display(),
            image.dimensions()
        );
    }

    Ok(Sample::with_mask(image, normalize_rgb(&colors, mapping)))
}

/// Source images found under `<root>/src`
#[derive(Debug, Clone)]
pub struct Dataset {
    items: Vec<PathBuf>,
}

impl Dataset {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let src = root.join(SOURCE_DIR);
        if !src.is_dir() {
            anyhow::bail!("Dataset folder {} has no '{}' directory", root.display(), SOURCE_DIR);
        }

        let mut items = Vec::new();
        for entry in WalkDir::new(&src) {
            let entry = entry.with_context(|| format!("Failed to scan {}", src.display()))?;
            if entry.file_type().is_file() && is_image_file(entry.path()) {
                items.push(entry.into_path());
            }
        }
        items.sort();

        info!("Found {} images in {}", items.len(), src.display());
        Ok(Self { items })
    }

    pub fn items(&self) -> &[PathBuf] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Shuffle with `seed` and hold out `validation_split` of the items
    pub fn split(&self, validation_split: f32, seed: u64) -> Result<DatasetSplit> {
        if !(0.0..1.0).contains(&validation_split) {
            anyhow::bail!("validation split must be in [0, 1), got {}", validation_split);
        }

        let mut shuffled = self.items.clone();
        let mut rng = StdRng::seed_from_u64(seed);
        shuffled.shuffle(&mut rng);

        let cut = (validation_split * shuffled.len() as f32) as usize;
        let train = shuffled.split_off(cut);
        Ok(DatasetSplit {
            train,
            valid: shuffled,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSplit {
    pub train: Vec<PathBuf>,
    pub valid: Vec<PathBuf>,
}

/// Batched access to a split, augmenting training samples on the way out
pub struct DataLoaders {
    split: DatasetSplit,
    batch_size: usize,
    mapping: ColorMapping,
    train_pipeline: Pipeline,
    valid_pipeline: Pipeline,
    sample_size: Option<u32>,
    normalize: bool,
}

impl DataLoaders {
    pub fn new(
        split: DatasetSplit,
        batch_size: usize,
        mapping: ColorMapping,
        aug: &AugmentationConfig,
    ) -> Result<Self> {
        if batch_size == 0 {
            anyhow::bail!("batch size must be positive");
        }
        let sample_size = aug
            .aug_transforms
            .as_ref()
            .and_then(|t| t.size)
            .or(aug.resize);
        Ok(Self {
            split,
            batch_size,
            mapping,
            train_pipeline: build_training_pipeline(aug),
            valid_pipeline: build_eval_pipeline(aug),
            sample_size,
            normalize: aug.normalize,
        })
    }

    /// Open `data.path_to_dataset` and split it the way training does
    pub fn from_config(config: &Config) -> Result<Self> {
        let dataset = Dataset::open(&config.data.path_to_dataset)?;
        let split = dataset.split(config.data.validation_split, DEFAULT_SPLIT_SEED)?;
        info!(
            "Split {} items into {} train / {} valid",
            dataset.len(),
            split.train.len(),
            split.valid.len()
        );
        Self::new(
            split,
            config.data.batch_size,
            config.mapping()?,
            &config.data.augmentation,
        )
    }

    pub fn split(&self) -> &DatasetSplit {
        &self.split
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn mapping(&self) -> &ColorMapping {
        &self.mapping
    }

    /// Side of the square samples fed to the model, when fixed by augmentation
    pub fn sample_size(&self) -> Option<u32> {
        self.sample_size
    }

    /// Whether batch tensors are normalized with ImageNet statistics
    pub fn normalize(&self) -> bool {
        self.normalize
    }

    /// CHW tensor of a sample image as fed to the model
    pub fn image_tensor(&self, image: &RgbImage) -> Vec<f32> {
        if self.normalize {
            to_normalized_tensor(image)
        } else {
            to_tensor(image)
        }
    }

    pub fn train_batches(&self) -> usize {
        self.split.train.len().div_ceil(self.batch_size)
    }

    pub fn valid_batches(&self) -> usize {
        self.split.valid.len().div_ceil(self.batch_size)
    }

    fn batch_items(items: &[PathBuf], batch_size: usize, index: usize) -> &[PathBuf] {
        let start = (index * batch_size).min(items.len());
        let end = (start + batch_size).min(items.len());
        &items[start..end]
    }

    /// Load and augment the `index`-th training batch
    pub fn train_batch(&self, index: usize, rng: &mut dyn RngCore) -> Result<Vec<Sample>> {
        let items = Self::batch_items(&self.split.train, self.batch_size, index);
        debug!("Loading train batch {} ({} items)", index, items.len());
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let sample = load_sample(item, &self.mapping)?;
                self.train_pipeline
                    .run_indexed(sample, index * self.batch_size + i + 1, rng)
            })
            .collect()
    }

    /// Load the `index`-th validation batch (resized, never augmented)
    pub fn valid_batch(&self, index: usize, rng: &mut dyn RngCore) -> Result<Vec<Sample>> {
        let items = Self::batch_items(&self.split.valid, self.batch_size, index);
        items
            .iter()
            .map(|item| {
                let sample = load_sample(item, &self.mapping)?;
                self.valid_pipeline.run(sample, rng)
            })
            .collect()
    }

    /// Image tensors of the `index`-th training batch
    pub fn train_tensors(&self, index: usize, rng: &mut dyn RngCore) -> Result<Vec<Vec<f32>>> {
        let batch = self.train_batch(index, rng)?;
        Ok(batch.iter().map(|s| self.image_tensor(&s.image)).collect())
    }

    /// Image tensors of the `index`-th validation batch
    pub fn valid_tensors(&self, index: usize, rng: &mut dyn RngCore) -> Result<Vec<Vec<f32>>> {
        let batch = self.valid_batch(index, rng)?;
        Ok(batch.iter().map(|s| self.image_tensor(&s.image)).collect())
    }
}
