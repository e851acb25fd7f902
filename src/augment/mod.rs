pub mod geometry;
pub mod shadow;
pub mod steps;

use std::sync::Arc;

use image::RgbImage;

use crate::config::{AugmentationConfig, SampleMode};
use crate::pipeline::Pipeline;
use steps::*;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Build the training-time augmentation pipeline from `data.augmentation`.
///
/// Order: resize, shadow, then the flip/affine/lighting group, then the
/// optional random resized crop.
pub fn build_training_pipeline(aug: &AugmentationConfig) -> Pipeline {
    let mut pipeline = Pipeline::new();

    if let Some(size) = aug.resize {
        let mode = aug
            .aug_transforms
            .as_ref()
            .map(|t| t.mode)
            .unwrap_or(SampleMode::Bilinear);
        pipeline = pipeline.add_step(Arc::new(ResizeStep { size, mode }));
    }

    if let Some(shadow) = &aug.shadow_transform {
        pipeline = pipeline.add_step(Arc::new(ShadowStep {
            config: shadow.clone(),
        }));
    }

    if let Some(t) = &aug.aug_transforms {
        if t.do_flip {
            pipeline = pipeline.add_step(Arc::new(FlipStep {
                vertical: t.flip_vert,
            }));
        }
        pipeline = pipeline
            .add_step(Arc::new(AffineStep {
                max_rotate: t.max_rotate * t.mult,
                min_zoom: t.min_zoom,
                max_zoom: t.max_zoom,
                max_warp: t.max_warp * t.mult,
                p_affine: t.p_affine,
                mode: t.mode,
                pad_mode: t.pad_mode,
            }))
            .add_step(Arc::new(LightingStep {
                max_lighting: t.max_lighting * t.mult,
                p_lighting: t.p_lighting,
            }));
        if let Some(size) = t.size {
            pipeline = pipeline.add_step(Arc::new(RandomResizedCropStep {
                size,
                min_scale: t.min_scale,
                mode: t.mode,
            }));
        }
    }

    pipeline
}

/// Deterministic pipeline for validation and test samples: resize only
pub fn build_eval_pipeline(aug: &AugmentationConfig) -> Pipeline {
    match aug.resize {
        Some(size) => Pipeline::new().add_step(Arc::new(ResizeStep {
            size,
            mode: SampleMode::Bilinear,
        })),
        None => Pipeline::new(),
    }
}

/// Channel-major `f32` tensor with values scaled to `[0, 1]`
pub fn to_tensor(image: &RgbImage) -> Vec<f32> {
    channel_major(image, |_, value| value)
}

/// Channel-major `f32` tensor normalized with ImageNet statistics
pub fn to_normalized_tensor(image: &RgbImage) -> Vec<f32> {
    channel_major(image, |c, value| (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c])
}

fn channel_major(image: &RgbImage, scale: impl Fn(usize, f32) -> f32) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let plane = width as usize * height as usize;
    let mut tensor = vec![0.0f32; 3 * plane];
    for (i, pixel) in image.pixels().enumerate() {
        for c in 0..3 {
            tensor[c * plane + i] = scale(c, pixel[c] as f32 / 255.0);
        }
    }
    tensor
}
