//! Scoring of predicted color masks against the test ground truth.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dataset::{Dataset, MASK_DIR, MASK_EXTENSION};
use crate::mask::{normalize_rgb, ColorMapping};

pub const DEFAULT_NUM_SAMPLES: usize = 5;

/// Per-class pixel counts accumulated over any number of images
#[derive(Debug, Clone, Serialize)]
pub struct SegmentationMetrics {
    intersection: Vec<u64>,
    predicted: Vec<u64>,
    target: Vec<u64>,
    foreground: u64,
    foreground_correct: u64,
}

impl SegmentationMetrics {
    pub fn new() -> Self {
        Self {
            intersection: vec![0; 256],
            predicted: vec![0; 256],
            target: vec![0; 256],
            foreground: 0,
            foreground_correct: 0,
        }
    }

    /// Add one prediction/target pair of equal size
    pub fn accumulate(&mut self, prediction: &GrayImage, target: &GrayImage) -> Result<()> {
        if prediction.dimensions() != target.dimensions() {
            anyhow::bail!(
                "prediction is {:?} but target is {:?}",
                prediction.dimensions(),
                target.dimensions()
            );
        }
        for (p, t) in prediction.pixels().zip(target.pixels()) {
            let (p, t) = (p[0] as usize, t[0] as usize);
            self.predicted[p] += 1;
            self.target[t] += 1;
            if p == t {
                self.intersection[p] += 1;
            }
            if t != 0 {
                self.foreground += 1;
                if p == t {
                    self.foreground_correct += 1;
                }
            }
        }
        Ok(())
    }

    /// Pixel accuracy over pixels whose target is not class 0
    pub fn foreground_accuracy(&self) -> Option<f64> {
        (self.foreground > 0).then(|| self.foreground_correct as f64 / self.foreground as f64)
    }

    /// Mean Dice over every class present in prediction or target, background included
    pub fn dice(&self) -> Option<f64> {
        self.mean_over_classes(|i, p, t| 2.0 * i / (p + t))
    }

    /// Mean intersection over union over every class present in prediction or target
    pub fn jaccard(&self) -> Option<f64> {
        self.mean_over_classes(|i, p, t| i / (p + t - i))
    }

    fn mean_over_classes(&self, score: impl Fn(f64, f64, f64) -> f64) -> Option<f64> {
        let scores: Vec<f64> = (0..256)
            .filter(|&c| self.predicted[c] + self.target[c] > 0)
            .map(|c| {
                score(
                    self.intersection[c] as f64,
                    self.predicted[c] as f64,
                    self.target[c] as f64,
                )
            })
            .collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }
}

impl Default for SegmentationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub evaluated: usize,
    /// Predictions with no ground truth of the same name
    pub skipped: Vec<PathBuf>,
    pub metrics: SegmentationMetrics,
    pub figures: Vec<PathBuf>,
}

/// Evaluate every `.png` prediction in `pred_dir`, writing the default
/// number of comparison figures
pub fn evaluate_predictions(config: &Config, pred_dir: &Path) -> Result<EvaluationReport> {
    evaluate_predictions_with_samples(config, pred_dir, DEFAULT_NUM_SAMPLES)
}

/// Compare predictions with `<path_test_dataset>/gt/<stem>.png` and save
/// `sample_{i}_comparison.png` (image | true mask | predicted mask) for the
/// first `num_samples` of them into `paths.figures`
pub fn evaluate_predictions_with_samples(
    config: &Config,
    pred_dir: &Path,
    num_samples: usize,
) -> Result<EvaluationReport> {
    let mapping = config.mapping()?;
    let test_root = &config.data.path_test_dataset;
    let gt_dir = test_root.join(MASK_DIR);
    let sources = source_images(test_root);

    let mut predictions: Vec<PathBuf> = std::fs::read_dir(pred_dir)
        .with_context(|| format!("Failed to read predictions folder {}", pred_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("png"))
        .collect();
    predictions.sort();

    if num_samples > 0 {
        std::fs::create_dir_all(&config.paths.figures).with_context(|| {
            format!("Failed to create figures folder {}", config.paths.figures.display())
        })?;
    }

    let mut report = EvaluationReport {
        evaluated: 0,
        skipped: Vec::new(),
        metrics: SegmentationMetrics::new(),
        figures: Vec::new(),
    };

    for prediction_path in predictions {
        let Some(stem) = prediction_path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let gt_path = gt_dir.join(format!("{}.{}", stem, MASK_EXTENSION));
        if !gt_path.is_file() {
            warn!("No ground truth for {}, skipping", prediction_path.display());
            report.skipped.push(prediction_path);
            continue;
        }

        let target_colors = image::open(&gt_path)
            .with_context(|| format!("Failed to open ground truth {}", gt_path.display()))?
            .to_rgb8();
        let mut predicted_colors = image::open(&prediction_path)
            .with_context(|| format!("Failed to open prediction {}", prediction_path.display()))?
            .to_rgb8();
        if predicted_colors.dimensions() != target_colors.dimensions() {
            debug!(
                "Resizing prediction {} from {:?} to {:?}",
                prediction_path.display(),
                predicted_colors.dimensions(),
                target_colors.dimensions()
            );
            let (w, h) = target_colors.dimensions();
            predicted_colors = imageops::resize(&predicted_colors, w, h, FilterType::Nearest);
        }

        let target = normalize_rgb(&target_colors, &mapping);
        let predicted = normalize_rgb(&predicted_colors, &mapping);
        report
            .metrics
            .accumulate(&predicted, &target)
            .with_context(|| format!("Failed to score {}", prediction_path.display()))?;

        if report.figures.len() < num_samples {
            let source = match sources.get(&stem) {
                Some(path) => Some(
                    image::open(path)
                        .with_context(|| format!("Failed to open image {}", path.display()))?
                        .to_rgb8(),
                ),
                None => None,
            };
            let figure = comparison_figure(source.as_ref(), &target, &predicted, &mapping);
            let out = config
                .paths
                .figures
                .join(format!("sample_{}_comparison.png", report.figures.len()));
            figure
                .save(&out)
                .with_context(|| format!("Failed to save {}", out.display()))?;
            debug!("Saved {}", out.display());
            report.figures.push(out);
        }
        report.evaluated += 1;
    }

    info!(
        "Evaluated {} predictions ({} skipped): foreground accuracy {:?}, dice {:?}, jaccard {:?}",
        report.evaluated,
        report.skipped.len(),
        report.metrics.foreground_accuracy(),
        report.metrics.dice(),
        report.metrics.jaccard()
    );
    Ok(report)
}

/// Test images by file stem, empty when the test set has no `src` folder
fn source_images(test_root: &Path) -> HashMap<String, PathBuf> {
    match Dataset::open(test_root) {
        Ok(dataset) => dataset
            .items()
            .iter()
            .filter_map(|item| {
                let stem = item.file_stem()?.to_string_lossy().into_owned();
                Some((stem, item.clone()))
            })
            .collect(),
        Err(e) => {
            debug!("No source images for figures: {:#}", e);
            HashMap::new()
        }
    }
}

/// Paint a class mask with the mapping colors, gray levels for unmapped classes
fn render_classes(classes: &GrayImage, mapping: &ColorMapping) -> RgbImage {
    RgbImage::from_fn(classes.width(), classes.height(), |x, y| {
        let class_id = classes.get_pixel(x, y)[0];
        match mapping.color_of(class_id) {
            Some(color) => color.into(),
            None => Rgb([class_id; 3]),
        }
    })
}

/// Three panels side by side: image, true mask, predicted mask
fn comparison_figure(
    source: Option<&RgbImage>,
    target: &GrayImage,
    predicted: &GrayImage,
    mapping: &ColorMapping,
) -> RgbImage {
    let (w, h) = target.dimensions();
    let mut figure = RgbImage::new(3 * w, h);

    if let Some(source) = source {
        let source = if source.dimensions() == (w, h) {
            source.clone()
        } else {
            imageops::resize(source, w, h, FilterType::Triangle)
        };
        imageops::replace(&mut figure, &source, 0, 0);
    }
    imageops::replace(&mut figure, &render_classes(target, mapping), w as i64, 0);
    imageops::replace(&mut figure, &render_classes(predicted, mapping), 2 * w as i64, 0);
    figure
}
