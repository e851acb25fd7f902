mod common;

use std::collections::HashSet;

use anyhow::Result;
use common::*;
use image::GrayImage;
use parkseg::augment::{build_eval_pipeline, build_training_pipeline, to_normalized_tensor};
use parkseg::config::{AugTransformsConfig, AugmentationConfig, ShadowConfig};
use parkseg::mask::normalize_rgb;
use parkseg::pipeline::{AugmentStep, Pipeline, Sample};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

fn full_augmentation() -> AugmentationConfig {
    AugmentationConfig {
        resize: Some(48),
        shadow_transform: Some(ShadowConfig::default()),
        aug_transforms: Some(AugTransformsConfig {
            flip_vert: true,
            size: Some(32),
            min_scale: 0.5,
            ..Default::default()
        }),
        normalize: true,
    }
}

fn sample(width: u32, height: u32) -> Sample {
    Sample::with_mask(
        gradient_image(width, height),
        normalize_rgb(&striped_mask(width, height), &test_mapping()),
    )
}

fn classes(mask: &GrayImage) -> HashSet<u8> {
    mask.pixels().map(|p| p[0]).collect()
}

/// Marks the top-left pixel
struct MarkStep;

impl AugmentStep for MarkStep {
    fn apply(&self, mut sample: Sample, _rng: &mut dyn RngCore) -> Result<Sample> {
        sample.image.put_pixel(0, 0, image::Rgb([42, 0, 0]));
        Ok(sample)
    }

    fn name(&self) -> &str {
        "Mark Step"
    }
}

#[test]
fn test_training_pipeline_order() {
    let pipeline = build_training_pipeline(&full_augmentation());
    assert_eq!(
        pipeline.step_names(),
        vec!["Resize", "Shadow", "Dihedral", "Affine", "Lighting", "Random Resized Crop"]
    );
}

#[test]
fn test_pipeline_without_transforms_only_resizes() {
    let aug = AugmentationConfig {
        resize: Some(16),
        ..Default::default()
    };
    assert_eq!(build_training_pipeline(&aug).step_names(), vec!["Resize"]);
    assert!(build_eval_pipeline(&AugmentationConfig::default()).is_empty());
}

#[test]
fn test_augmented_mask_stays_aligned_and_valid() -> Result<()> {
    let pipeline = build_training_pipeline(&full_augmentation());
    let original = sample(60, 40);
    let allowed = classes(original.mask.as_ref().unwrap());

    for seed in 0..8 {
        let out = pipeline.run(original.clone(), &mut StdRng::seed_from_u64(seed))?;
        let mask = out.mask.expect("mask must survive augmentation");
        assert_eq!(out.image.dimensions(), (32, 32));
        assert_eq!(mask.dimensions(), (32, 32));
        assert!(classes(&mask).is_subset(&allowed), "seed {} invented a class", seed);
    }
    Ok(())
}

#[test]
fn test_same_seed_same_augmentation() -> Result<()> {
    let pipeline = build_training_pipeline(&full_augmentation());

    let a = pipeline.run(sample(40, 40), &mut StdRng::seed_from_u64(3))?;
    let b = pipeline.run(sample(40, 40), &mut StdRng::seed_from_u64(3))?;

    assert_eq!(a.image, b.image);
    assert_eq!(a.mask, b.mask);
    Ok(())
}

#[test]
fn test_eval_pipeline_resizes_without_changing_classes() -> Result<()> {
    let pipeline = build_eval_pipeline(&full_augmentation());
    let out = pipeline.run(sample(30, 30), &mut StdRng::seed_from_u64(0))?;

    assert_eq!(out.dimensions(), (48, 48));
    assert_eq!(classes(out.mask.as_ref().unwrap()), (0..5).collect::<HashSet<u8>>());
    Ok(())
}

#[test]
fn test_run_partial_stops_early() -> Result<()> {
    let pipeline = Pipeline::new()
        .add_step_boxed(Box::new(MarkStep))
        .add_step(std::sync::Arc::new(parkseg::augment::steps::ResizeStep {
            size: 8,
            mode: Default::default(),
        }));

    let out = pipeline.run_partial(sample(20, 20), 1, 1, &mut StdRng::seed_from_u64(0))?;

    assert_eq!(out.dimensions(), (20, 20));
    assert_eq!(out.image.get_pixel(0, 0)[0], 42);
    Ok(())
}

#[test]
fn test_debug_outputs_every_step() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let debug_dir = dir.path().join("debug");
    let pipeline = Pipeline::new()
        .add_step_boxed(Box::new(MarkStep))
        .with_debug(debug_dir.clone())?;

    pipeline.run_indexed(sample(10, 10), 3, &mut StdRng::seed_from_u64(0))?;

    assert!(debug_dir.join("00_input/0003.png").is_file());
    assert!(debug_dir.join("00_input/0003_mask.png").is_file());
    assert!(debug_dir.join("01_mark_step/0003.png").is_file());
    Ok(())
}

#[test]
fn test_debug_dir_must_be_empty() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    std::fs::write(dir.path().join("leftover.txt"), "x")?;

    assert!(Pipeline::new().with_debug(dir.path().to_path_buf()).is_err());
    Ok(())
}

#[test]
fn test_normalized_tensor_layout() {
    let image = image::RgbImage::from_pixel(2, 3, image::Rgb([255, 0, 0]));
    let tensor = to_normalized_tensor(&image);

    assert_eq!(tensor.len(), 3 * 2 * 3);
    let red = (1.0 - 0.485) / 0.229;
    let green = (0.0 - 0.456) / 0.224;
    assert!((tensor[0] - red).abs() < 1e-5);
    assert!((tensor[6] - green).abs() < 1e-5);
}
