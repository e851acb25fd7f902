#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb, RgbImage};
use parkseg::config::Config;
use parkseg::mask::ColorMapping;
use parkseg::models::Color;

/// Class colors used by the test mapping
pub const BACKGROUND: Color = Color { r: 0, g: 0, b: 0 };
pub const VEGETATION: Color = Color { r: 107, g: 142, b: 35 };
pub const BUILDING: Color = Color { r: 102, g: 102, b: 156 };
pub const ROAD: Color = Color { r: 128, g: 64, b: 128 };
pub const VEHICLE: Color = Color { r: 0, g: 0, b: 142 };
pub const PARKED: Color = Color { r: 255, g: 255, b: 0 };

pub fn rgb(color: Color) -> Rgb<u8> {
    Rgb([color.r, color.g, color.b])
}

/// Background 0, vegetation 1, building 2, road 3, vehicle 4
pub fn test_mapping() -> ColorMapping {
    ColorMapping::new([
        (BACKGROUND, 0),
        (VEGETATION, 1),
        (BUILDING, 2),
        (ROAD, 3),
        (VEHICLE, 4),
    ])
    .expect("Test mapping must be valid")
}

/// Gradient image so that geometric transforms visibly move pixels
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

/// Color mask with one horizontal band per class of the test mapping
pub fn striped_mask(width: u32, height: u32) -> RgbImage {
    let bands = [BACKGROUND, VEGETATION, BUILDING, ROAD, VEHICLE];
    ImageBuffer::from_fn(width, height, |_, y| {
        let band = (y as usize * bands.len() / height.max(1) as usize).min(bands.len() - 1);
        rgb(bands[band])
    })
}

/// Writes `count` image/mask pairs as `<root>/src/img_<i>.png` and
/// `<root>/gt/img_<i>.png`; returns the image paths
pub fn create_dataset(root: &Path, count: usize, size: u32) -> Vec<PathBuf> {
    let src = root.join("src");
    let gt = root.join("gt");
    std::fs::create_dir_all(&src).expect("Failed to create src folder");
    std::fs::create_dir_all(&gt).expect("Failed to create gt folder");

    (0..count)
        .map(|i| {
            let name = format!("img_{:02}.png", i);
            let image = src.join(&name);
            gradient_image(size, size)
                .save(&image)
                .expect("Failed to save dataset image");
            striped_mask(size, size)
                .save(gt.join(&name))
                .expect("Failed to save dataset mask");
            image
        })
        .collect()
}

/// YAML config pointing at the given folders
pub fn config_yaml(train: &Path, test: &Path, out: &Path, model_type: &str) -> String {
    format!(
        r#"
model:
  type: {model_type}
  backbone: resnet34
  pretrained: imagenet
  classes: 5
data:
  path_to_dataset: {train}
  path_test_dataset: {test}
  batch_size: 2
  validation_split: 0.25
  augmentation:
    resize: 32
    shadow_transform:
      num_shadows: 2
      min_opacity: 0.25
      max_opacity: 0.5
    aug_transforms:
      max_rotate: 10.0
      max_warp: 0.2
      flip_vert: true
  mapping_class_color:
    - color: [0, 0, 0]
      class: 0
    - color: [107, 142, 35]
      class: 1
    - color: [102, 102, 156]
      class: 2
    - color: [128, 64, 128]
      class: 3
    - color: [0, 0, 142]
      class: 4
training:
  epochs: 3
paths:
  models: {out}/models
  metrics: {out}/logs
  figures: {out}/figures
"#,
        model_type = model_type,
        train = train.display(),
        test = test.display(),
        out = out.display(),
    )
}

/// Parsed config over temp folders, with a 4-image train set and a
/// 2-image test set already written
pub fn create_test_config(dir: &Path, model_type: &str) -> Config {
    let train = dir.join("train");
    let test = dir.join("test");
    create_dataset(&train, 4, 40);
    create_dataset(&test, 2, 40);
    Config::from_yaml_str(&config_yaml(&train, &test, &dir.join("results"), model_type))
        .expect("Test config must be valid")
}
