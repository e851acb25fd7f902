pub mod contours;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use tracing::{debug, info};

use crate::config::{ConfigError, ParkingConfig};
use crate::models::{ParkingReport, RegionDecision};

/// Parked-vehicle post-processing of color-coded predictions.
///
/// Every connected vehicle region is grown by a square neighborhood; when
/// that neighborhood holds more background than road pixels the region is
/// repainted with the parked color.
pub struct ParkingDetector {
    params: ParkingConfig,
}

impl ParkingDetector {
    pub fn new(params: ParkingConfig) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Half side of the structuring element, at most 255 for a validated kernel
    fn radius(&self) -> u8 {
        (self.params.kernel_size / 2) as u8
    }

    /// Run the heuristic on one prediction image.
    /// Returns the recolored image and the decision taken for each region.
    pub fn mark_parked(&self, image: &RgbImage) -> (RgbImage, Vec<RegionDecision>) {
        let (width, height) = image.dimensions();
        let mut output = image.clone();
        if width == 0 || height == 0 {
            return (output, Vec::new());
        }

        let vehicle_mask = contours::color_mask(image, self.params.vehicle_color);
        let (labels, regions) = contours::find_regions(&vehicle_mask, 1);
        let radius = self.radius();
        let parked_color: Rgb<u8> = self.params.parked_color.into();

        let mut decisions = Vec::with_capacity(regions.len());
        for region in regions {
            let window = region.padded_bounds(radius as u32, width, height);
            let (x0, y0, _, _) = window;
            let filled = contours::filled_region_mask(&labels, &region, window);
            let grown = dilate(&filled, Norm::LInf, radius);

            let mut background = 0u32;
            let mut road = 0u32;
            for (x, y, pixel) in grown.enumerate_pixels() {
                if pixel[0] == 0 {
                    continue;
                }
                let color = image.get_pixel(x0 + x, y0 + y);
                if self.params.background_color.matches(color) {
                    background += 1;
                } else if self.params.road_color.matches(color) {
                    road += 1;
                }
            }

            let parked = background > road;
            if parked {
                for (x, y, pixel) in filled.enumerate_pixels() {
                    if *pixel == Luma([255]) && vehicle_mask.get_pixel(x0 + x, y0 + y)[0] != 0 {
                        output.put_pixel(x0 + x, y0 + y, parked_color);
                    }
                }
            }

            debug!(
                "Region {} at {:?}: {}x{} box, {} px, background {} / road {} -> {}",
                region.label,
                region.center(),
                region.width(),
                region.height(),
                region.area(),
                background,
                road,
                if parked { "parked" } else { "not parked" }
            );
            decisions.push(RegionDecision {
                region,
                background,
                road,
                parked,
            });
        }

        (output, decisions)
    }

    /// `<stem><suffix>.png` next to `source`
    pub fn output_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        source.with_file_name(format!("{}{}.png", stem, self.params.suffix))
    }

    fn is_own_output(&self, path: &Path) -> bool {
        !self.params.suffix.is_empty()
            && path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.ends_with(&self.params.suffix))
                .unwrap_or(false)
    }

    /// Process one prediction file, leaving it untouched and writing the
    /// result next to it
    pub fn process_file(&self, source: &Path) -> Result<ParkingReport> {
        let image = image::open(source)
            .with_context(|| format!("Failed to open prediction {}", source.display()))?
            .to_rgb8();

        let (marked, decisions) = self.mark_parked(&image);
        let output = self.output_path(source);
        marked
            .save(&output)
            .with_context(|| format!("Failed to save {}", output.display()))?;

        let report = ParkingReport {
            source: source.to_path_buf(),
            output,
            regions: decisions.len(),
            parked: decisions.iter().filter(|d| d.parked).count(),
        };
        info!(
            "{}: {} vehicle regions, {} parked",
            source.display(),
            report.regions,
            report.parked
        );
        Ok(report)
    }

    /// Process every `.png` prediction in `folder`, skipping earlier outputs
    pub fn process_folder(&self, folder: &Path) -> Result<Vec<ParkingReport>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(folder)
            .with_context(|| format!("Failed to read folder {}", folder.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some("png")
                    && !self.is_own_output(path)
            })
            .collect();
        files.sort();

        files.iter().map(|path| self.process_file(path)).collect()
    }
}

impl Default for ParkingDetector {
    fn default() -> Self {
        Self {
            params: ParkingConfig::default(),
        }
    }
}
