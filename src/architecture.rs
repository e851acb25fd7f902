//! Selection of the segmentation architecture handed to the trainer.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::dataset::DataLoaders;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("unknown model type: {0}")]
    UnknownModelType(String),
    #[error("model type '{requested}' is not supported, choose from {allowed:?}")]
    NotAllowed {
        requested: String,
        allowed: Vec<String>,
    },
    #[error("data loaders are required for the U-Net model")]
    MissingDataLoaders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Pspnet,
    Deeplabv3Plus,
    Unet,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Pspnet => "pspnet",
            ModelKind::Deeplabv3Plus => "deeplabv3_plus",
            ModelKind::Unet => "unet",
        }
    }
}

impl FromStr for ModelKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pspnet" => Ok(ModelKind::Pspnet),
            "deeplabv3_plus" => Ok(ModelKind::Deeplabv3Plus),
            "unet" => Ok(ModelKind::Unet),
            other => Err(ModelError::UnknownModelType(other.to_string())),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the external trainer needs to instantiate the network
#[derive(Debug, Clone, Serialize)]
pub struct ModelSpec {
    pub kind: ModelKind,
    pub backbone: String,
    pub pretrained: bool,
    pub classes: u32,
    /// Input side length taken from the data loaders (U-Net only)
    pub input_size: Option<u32>,
}

impl ModelSpec {
    pub fn artifact_path(&self, config: &Config) -> PathBuf {
        config.paths.models.join(format!("{}_model.pkl", self.kind))
    }

    pub fn metrics_path(&self, config: &Config) -> PathBuf {
        config.paths.metrics.join(format!("{}_metrics.csv", self.kind))
    }
}

/// Check `requested` against the names listed under `model.type` and return
/// a config that selects it
pub fn select_model(config: &Config, requested: &str) -> Result<Config, ModelError> {
    if !config.model.kind.contains(requested) {
        return Err(ModelError::NotAllowed {
            requested: requested.to_string(),
            allowed: config
                .model
                .kind
                .names()
                .into_iter()
                .map(String::from)
                .collect(),
        });
    }
    let mut selected = config.clone();
    selected.model.kind = crate::config::ModelTypes::One(requested.to_string());
    Ok(selected)
}

/// Resolve `model.*` into a [`ModelSpec`].
///
/// U-Net is built from the data loaders, so they must be supplied for it.
pub fn create_model(config: &Config, dls: Option<&DataLoaders>) -> Result<ModelSpec, ModelError> {
    let names = config.model.kind.names();
    let name = match names.as_slice() {
        [single] => *single,
        _ => {
            return Err(ModelError::UnknownModelType(format!(
                "{:?} (select one model first)",
                names
            )));
        }
    };
    let kind: ModelKind = name.parse()?;
    let pretrained = config.model.pretrained.as_deref() == Some("imagenet");

    let input_size = match kind {
        ModelKind::Unet => {
            let dls = dls.ok_or(ModelError::MissingDataLoaders)?;
            dls.sample_size()
        }
        ModelKind::Pspnet | ModelKind::Deeplabv3Plus => None,
    };

    Ok(ModelSpec {
        kind,
        backbone: config.model.backbone.clone(),
        pretrained,
        classes: config.model.classes,
        input_size,
    })
}
