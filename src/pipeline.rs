use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use image::{GrayImage, RgbImage};
use rand::RngCore;
use tracing::debug;

/// Data that flows through the augmentation pipeline.
/// Geometric steps move the image and its mask together.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Source pixels
    pub image: RgbImage,

    /// Class-index mask, same size as `image` (None for image-only runs)
    pub mask: Option<GrayImage>,
}

impl Sample {
    pub fn from_image(image: RgbImage) -> Self {
        Self { image, mask: None }
    }

    pub fn with_mask(image: RgbImage, mask: GrayImage) -> Self {
        Self {
            image,
            mask: Some(mask),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Apply the same transform to the image and, when present, the mask
    pub fn map<F, G>(self, image_fn: F, mask_fn: G) -> Self
    where
        F: FnOnce(&RgbImage) -> RgbImage,
        G: FnOnce(&GrayImage) -> GrayImage,
    {
        Sample {
            image: image_fn(&self.image),
            mask: self.mask.as_ref().map(mask_fn),
        }
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
    /// Whether debug mode is enabled
    pub enabled: bool,
}

impl DebugConfig {
    fn step_dir(&self, step_idx: usize, step_name: &str) -> PathBuf {
        self.output_dir.join(format!(
            "{:02}_{}",
            step_idx,
            step_name.to_lowercase().replace(' ', "_")
        ))
    }

    fn save(&self, step_idx: usize, step_name: &str, item: usize, sample: &Sample) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let step_dir = self.step_dir(step_idx, step_name);
        std::fs::create_dir_all(&step_dir)?;

        let image_path = step_dir.join(format!("{:04}.png", item));
        sample
            .image
            .save(&image_path)
            .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;
        if let Some(mask) = &sample.mask {
            let mask_path = step_dir.join(format!("{:04}_mask.png", item));
            mask.save(&mask_path)
                .map_err(|e| anyhow::anyhow!("Failed to save debug mask: {}", e))?;
        }
        debug!("Debug: saved {}", image_path.display());
        Ok(())
    }
}

/// Trait that all augmentation steps must implement
pub trait AugmentStep: Send + Sync {
    /// Transform one sample. Randomized steps draw from `rng` only.
    fn apply(&self, sample: Sample, rng: &mut dyn RngCore) -> Result<Sample>;

    /// Human-readable name for this step (used in logs and debug folders)
    fn name(&self) -> &str;
}

/// Composable augmentation pipeline
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn AugmentStep>>,
    debug: Option<DebugConfig>,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug = Some(DebugConfig {
            output_dir,
            enabled: true,
        });

        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn AugmentStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Helper method to add a step from a Box (for convenience)
    pub fn add_step_boxed(mut self, step: Box<dyn AugmentStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step on one sample
    pub fn run(&self, sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        self.run_indexed(sample, 1, rng)
    }

    /// Run every step on one sample; `item` numbers its debug outputs
    pub fn run_indexed(&self, sample: Sample, item: usize, rng: &mut dyn RngCore) -> Result<Sample> {
        self.run_partial(sample, item, self.steps.len(), rng)
    }

    /// Run the pipeline but stop after `num_steps` steps (useful for debugging)
    pub fn run_partial(
        &self,
        input: Sample,
        item: usize,
        num_steps: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Sample> {
        if let Some(debug_config) = &self.debug {
            debug_config.save(0, "input", item, &input)?;
        }

        let mut sample = input;
        for (step_idx, step) in self.steps.iter().take(num_steps).enumerate() {
            debug!("Running step {}: {}", step_idx + 1, step.name());
            sample = step.apply(sample, rng)?;

            if let Some(debug_config) = &self.debug {
                debug_config.save(step_idx + 1, step.name(), item, &sample)?;
            }
        }

        Ok(sample)
    }
}
