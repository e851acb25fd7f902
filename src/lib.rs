pub mod architecture;
pub mod augment;
pub mod config;
pub mod dataset;
pub mod detection;
pub mod evaluate;
pub mod mask;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod plot;
pub mod tiling;

pub use architecture::{create_model, select_model, ModelError, ModelKind, ModelSpec};
pub use augment::shadow::{add_shadow, ShadowError};
pub use config::{Config, ConfigError};
pub use dataset::{DataLoaders, Dataset, DatasetSplit};
pub use detection::ParkingDetector;
pub use evaluate::{evaluate_predictions, SegmentationMetrics};
pub use mask::{denormalize, normalize, ColorMapping, MaskError};
pub use metrics::MetricsLog;
pub use models::{Color, ParkingReport, Region, RegionDecision};
pub use pipeline::{AugmentStep, DebugConfig, Pipeline, Sample};
pub use plot::{plot_comparison, plot_metrics, PlotError};
pub use tiling::{split_image, TilingError};
