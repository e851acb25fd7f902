use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{error, info, Level};

use parkseg::architecture::{create_model, select_model, ModelSpec};
use parkseg::augment::build_training_pipeline;
use parkseg::augment::shadow::add_shadow;
use parkseg::config::Config;
use parkseg::dataset::{load_sample, DataLoaders, DatasetSplit};
use parkseg::detection::ParkingDetector;
use parkseg::evaluate::evaluate_predictions_with_samples;
use parkseg::mask::{denormalize, normalize};
use parkseg::metrics::MetricsLog;
use parkseg::pipeline::Sample;
use parkseg::plot::{plot_comparison, plot_metrics};
use parkseg::tiling::{split_image, DEFAULT_TILE_SIZE};

#[derive(Parser)]
#[command(name = "parkseg")]
#[command(about = "Segmentation toolkit for aerial images of parking areas")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Seed for the random augmentations (entropy when omitted)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cut a large image into numbered tiles
    Split {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
        #[arg(value_name = "OUTPUT_DIR")]
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
        tile_width: u32,
        #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
        tile_height: u32,
    },

    /// Convert a color mask into a class-index mask
    EncodeMask(MaskArgs),

    /// Convert a class-index mask back into a color mask
    DecodeMask(MaskArgs),

    /// Add random shadows to an image
    Shadow {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
        #[arg(long, default_value_t = 3)]
        num_shadows: u32,
        #[arg(long, default_value_t = 0.25)]
        min_opacity: f32,
        #[arg(long, default_value_t = 0.5)]
        max_opacity: f32,
    },

    /// Write augmented variants of an image (and its mask) using the training pipeline
    Augment {
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
        #[arg(value_name = "OUTPUT_DIR")]
        output: PathBuf,
        /// Ground-truth mask; defaults to the one next to the image in the dataset layout
        #[arg(long)]
        mask: Option<PathBuf>,
        #[arg(long, default_value_t = 4)]
        count: usize,
        /// Save every intermediate step to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,
    },

    /// Split the dataset and resolve the model, writing a run manifest for the trainer
    Prepare {
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
        /// Model type to use when the config lists several
        #[arg(long)]
        model: Option<String>,
        /// Manifest path (default: <paths.models>/<type>_run.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Recolor parked vehicles in a folder of predicted masks
    DetectParked {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,
        /// Read the `parking` section from this config
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Score predicted masks against the test ground truth
    Evaluate {
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
        #[arg(value_name = "PREDICTIONS")]
        predictions: PathBuf,
        /// Number of comparison figures to save
        #[arg(long, default_value_t = parkseg::evaluate::DEFAULT_NUM_SAMPLES)]
        samples: usize,
    },

    /// Plot the curves of a metrics CSV
    PlotMetrics {
        #[arg(value_name = "CSV")]
        csv: PathBuf,
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },

    /// Overlay one column of several metrics CSV files
    Compare {
        #[arg(long = "csv", required = true, num_args = 1..)]
        csv_paths: Vec<PathBuf>,
        #[arg(long = "name", required = true, num_args = 1..)]
        names: Vec<String>,
        #[arg(long, default_value = "valid_loss")]
        column: String,
        #[arg(short, long)]
        output: PathBuf,
        /// Only plot the first N rows
        #[arg(long)]
        rows: Option<usize>,
    },
}

#[derive(Args)]
struct MaskArgs {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
    #[arg(value_name = "INPUT")]
    input: PathBuf,
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,
}

#[derive(Serialize)]
struct RunManifest {
    model: ModelSpec,
    batch_size: usize,
    epochs: u32,
    split: DatasetSplit,
    /// Images are normalized with ImageNet statistics
    normalize: bool,
    model_path: PathBuf,
    metrics_path: PathBuf,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    match args.command {
        Commands::Split {
            image,
            output,
            tile_width,
            tile_height,
        } => {
            split_image(&image, &output, tile_width, tile_height)?;
        }

        Commands::EncodeMask(mask) => {
            let config = Config::load(&mask.config)?;
            let colors = image::open(&mask.input)
                .with_context(|| format!("Failed to open {}", mask.input.display()))?;
            let classes = normalize(&colors, &config.mapping()?)?;
            classes
                .save(&mask.output)
                .with_context(|| format!("Failed to save {}", mask.output.display()))?;
            info!("Class mask saved to {}", mask.output.display());
        }

        Commands::DecodeMask(mask) => {
            let config = Config::load(&mask.config)?;
            let classes = image::open(&mask.input)
                .with_context(|| format!("Failed to open {}", mask.input.display()))?
                .to_luma8();
            let colors = denormalize(&classes, &config.mapping()?)?;
            colors
                .save(&mask.output)
                .with_context(|| format!("Failed to save {}", mask.output.display()))?;
            info!("Color mask saved to {}", mask.output.display());
        }

        Commands::Shadow {
            image,
            output,
            num_shadows,
            min_opacity,
            max_opacity,
        } => {
            let img = image::open(&image)
                .with_context(|| format!("Failed to open {}", image.display()))?
                .to_rgb8();
            let shadowed = add_shadow(&img, num_shadows, min_opacity, max_opacity, &mut rng)?;
            shadowed
                .save(&output)
                .with_context(|| format!("Failed to save {}", output.display()))?;
            info!("Shadowed image saved to {}", output.display());
        }

        Commands::Augment {
            config,
            image,
            output,
            mask,
            count,
            debug_out,
        } => {
            let config = Config::load(&config)?;
            let mapping = config.mapping()?;
            let sample = match mask {
                Some(mask) => {
                    let img = image::open(&image)
                        .with_context(|| format!("Failed to open {}", image.display()))?
                        .to_rgb8();
                    let colors = image::open(&mask)
                        .with_context(|| format!("Failed to open {}", mask.display()))?;
                    Sample::with_mask(img, normalize(&colors, &mapping)?)
                }
                None => load_sample(&image, &mapping)?,
            };

            let mut pipeline = build_training_pipeline(&config.data.augmentation);
            if let Some(debug_dir) = debug_out {
                pipeline = pipeline.with_debug(debug_dir)?;
            }
            info!("Augmentation steps: {:?}", pipeline.step_names());

            std::fs::create_dir_all(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            for item in 1..=count {
                let augmented = pipeline.run_indexed(sample.clone(), item, &mut rng)?;
                let path = output.join(format!("{:04}.png", item));
                augmented.image.save(&path)?;
                if let Some(classes) = &augmented.mask {
                    denormalize(classes, &mapping)?.save(output.join(format!("{:04}_mask.png", item)))?;
                }
            }
            info!("Wrote {} augmented samples to {}", count, output.display());
        }

        Commands::Prepare { config, model, out } => {
            let mut config = Config::load(&config)?;
            if let Some(requested) = model {
                config = select_model(&config, &requested)?;
            }

            let dls = DataLoaders::from_config(&config)?;
            let spec = create_model(&config, Some(&dls))?;
            let manifest = RunManifest {
                model_path: spec.artifact_path(&config),
                metrics_path: spec.metrics_path(&config),
                batch_size: dls.batch_size(),
                epochs: config.training.epochs,
                split: dls.split().clone(),
                normalize: dls.normalize(),
                model: spec,
            };

            let out = out.unwrap_or_else(|| {
                config
                    .paths
                    .models
                    .join(format!("{}_run.json", manifest.model.kind))
            });
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let json = serde_json::to_string_pretty(&manifest)?;
            std::fs::write(&out, json).with_context(|| format!("Failed to write {}", out.display()))?;
            info!(
                "{} ({}): {} train / {} valid items, manifest saved to {}",
                manifest.model.kind,
                manifest.model.backbone,
                manifest.split.train.len(),
                manifest.split.valid.len(),
                out.display()
            );
        }

        Commands::DetectParked { folder, config } => {
            let params = match config {
                Some(path) => Config::load(&path)?.parking,
                None => Default::default(),
            };
            let reports = ParkingDetector::new(params)?.process_folder(&folder)?;
            let parked: usize = reports.iter().map(|r| r.parked).sum();
            info!("Processed {} images, {} parked vehicles", reports.len(), parked);
        }

        Commands::Evaluate {
            config,
            predictions,
            samples,
        } => {
            let config = Config::load(&config)?;
            let report = evaluate_predictions_with_samples(&config, &predictions, samples)?;
            let fmt = |v: Option<f64>| v.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "n/a".into());
            println!("Images evaluated:    {}", report.evaluated);
            println!("Foreground accuracy: {}", fmt(report.metrics.foreground_accuracy()));
            println!("Dice:                {}", fmt(report.metrics.dice()));
            println!("Jaccard:             {}", fmt(report.metrics.jaccard()));
        }

        Commands::PlotMetrics { csv, output } => {
            let log = MetricsLog::read_csv(&csv)?;
            if let Err(e) = plot_metrics(&log.series(), log.names(), &output) {
                error!("Failed to plot {}: {}", csv.display(), e);
            }
        }

        Commands::Compare {
            csv_paths,
            names,
            column,
            output,
            rows,
        } => {
            if let Err(e) = plot_comparison(&csv_paths, &names, &column, &output, rows) {
                error!("Failed to compare metrics: {}", e);
            }
        }
    }

    Ok(())
}
