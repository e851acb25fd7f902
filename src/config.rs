//! Typed view of the project's `config.yaml`.
//!
//! The document is split in the same sections the training scripts read:
//! `model`, `data` (including augmentation and the color/class table),
//! `training`, `paths`, plus an optional `parking` section used by the
//! parked-vehicle post-processing. Unknown keys are ignored so configs that
//! carry framework-specific options still load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mask::{ColorMapping, MaskError};
use crate::models::Color;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Mapping(#[from] MaskError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub parking: ParkingConfig,
}

impl Config {
    /// Load and validate a YAML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.batch_size == 0 {
            return Err(ConfigError::Invalid("data.batch_size must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.data.validation_split) {
            return Err(ConfigError::Invalid(format!(
                "data.validation_split must be in [0, 1), got {}",
                self.data.validation_split
            )));
        }
        if self.model.classes == 0 {
            return Err(ConfigError::Invalid("model.classes must be positive".into()));
        }
        if let Some(shadow) = &self.data.augmentation.shadow_transform {
            shadow.validate()?;
        }
        if let Some(aug) = &self.data.augmentation.aug_transforms {
            if aug.min_zoom <= 0.0 || aug.min_zoom > aug.max_zoom {
                return Err(ConfigError::Invalid(format!(
                    "aug_transforms zoom range [{}, {}] is empty",
                    aug.min_zoom, aug.max_zoom
                )));
            }
            if !(0.0..=1.0).contains(&aug.min_scale) || aug.min_scale == 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "aug_transforms.min_scale must be in (0, 1], got {}",
                    aug.min_scale
                )));
            }
        }
        self.parking.validate()?;
        // Builds the codec once so duplicate colors or classes surface here
        self.mapping()?;
        Ok(())
    }

    /// Color/class table for the mask codec
    pub fn mapping(&self) -> Result<ColorMapping, MaskError> {
        ColorMapping::new(
            self.data
                .mapping_class_color
                .iter()
                .map(|entry| (entry.color, entry.class_id)),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// One model name, or the list of names a training run may pick from
    #[serde(rename = "type")]
    pub kind: ModelTypes,
    pub backbone: String,
    #[serde(default)]
    pub pretrained: Option<String>,
    pub classes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelTypes {
    One(String),
    Many(Vec<String>),
}

impl ModelTypes {
    pub fn names(&self) -> Vec<&str> {
        match self {
            ModelTypes::One(name) => vec![name.as_str()],
            ModelTypes::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().contains(&name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub path_to_dataset: PathBuf,
    pub path_test_dataset: PathBuf,
    pub batch_size: usize,
    pub validation_split: f32,
    #[serde(default)]
    pub augmentation: AugmentationConfig,
    pub mapping_class_color: Vec<ClassColor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassColor {
    pub color: Color,
    #[serde(rename = "class")]
    pub class_id: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AugmentationConfig {
    pub resize: Option<u32>,
    pub shadow_transform: Option<ShadowConfig>,
    pub aug_transforms: Option<AugTransformsConfig>,
    #[serde(default)]
    pub normalize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub num_shadows: u32,
    pub min_opacity: f32,
    pub max_opacity: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            num_shadows: 3,
            min_opacity: 0.25,
            max_opacity: 0.5,
        }
    }
}

impl ShadowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_opacity)
            || !(0.0..=1.0).contains(&self.max_opacity)
            || self.min_opacity > self.max_opacity
        {
            return Err(ConfigError::Invalid(format!(
                "shadow opacity range [{}, {}] must satisfy 0 <= min <= max <= 1",
                self.min_opacity, self.max_opacity
            )));
        }
        Ok(())
    }
}

/// Interpolation used when resampling images (masks always use nearest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleMode {
    #[default]
    Bilinear,
    Nearest,
}

/// How pixels outside the source are filled after a geometric transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadMode {
    Zeros,
    Border,
    #[default]
    Reflection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AugTransformsConfig {
    pub mult: f32,
    pub do_flip: bool,
    pub flip_vert: bool,
    pub max_rotate: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub max_lighting: f32,
    pub max_warp: f32,
    pub p_affine: f32,
    pub p_lighting: f32,
    pub size: Option<u32>,
    pub mode: SampleMode,
    pub pad_mode: PadMode,
    pub min_scale: f32,
}

impl Default for AugTransformsConfig {
    fn default() -> Self {
        Self {
            mult: 1.0,
            do_flip: true,
            flip_vert: false,
            max_rotate: 10.0,
            min_zoom: 1.0,
            max_zoom: 1.1,
            max_lighting: 0.2,
            max_warp: 0.2,
            p_affine: 0.75,
            p_lighting: 0.75,
            size: None,
            mode: SampleMode::Bilinear,
            pad_mode: PadMode::Reflection,
            min_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self { epochs: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub models: PathBuf,
    pub metrics: PathBuf,
    pub figures: PathBuf,
}

/// Largest structuring element the dilation supports (radius 255)
pub const MAX_KERNEL_SIZE: u32 = 511;

/// Colors and neighborhood size for the parked-vehicle heuristic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParkingConfig {
    pub vehicle_color: Color,
    pub background_color: Color,
    pub road_color: Color,
    pub parked_color: Color,
    /// Side of the square structuring element used to grow each vehicle region
    pub kernel_size: u32,
    /// Appended to the file stem of every written result
    pub suffix: String,
}

impl Default for ParkingConfig {
    fn default() -> Self {
        Self {
            vehicle_color: Color::new(0, 0, 142),
            background_color: Color::new(0, 0, 0),
            road_color: Color::new(128, 64, 128),
            parked_color: Color::new(255, 255, 0),
            kernel_size: 15,
            suffix: "_parked".to_string(),
        }
    }
}

impl ParkingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_KERNEL_SIZE).contains(&self.kernel_size) {
            return Err(ConfigError::Invalid(format!(
                "parking.kernel_size must be in [1, {}], got {}",
                MAX_KERNEL_SIZE, self.kernel_size
            )));
        }
        Ok(())
    }
}
