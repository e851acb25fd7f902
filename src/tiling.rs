use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{DynamicImage, ImageReader};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_TILE_SIZE: u32 = 256;

#[derive(Error, Debug)]
pub enum TilingError {
    #[error("tile size must be positive, got {width}x{height}")]
    InvalidTileSize { width: u32, height: u32 },
}

/// Rectangle of one tile inside the source raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Row-major grid of tiles covering `width` x `height`, edge tiles clipped
pub fn tile_grid(
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
) -> Result<Vec<TileRect>, TilingError> {
    if tile_width == 0 || tile_height == 0 {
        return Err(TilingError::InvalidTileSize {
            width: tile_width,
            height: tile_height,
        });
    }

    let columns = width.div_ceil(tile_width);
    let rows = height.div_ceil(tile_height);

    let mut tiles = Vec::with_capacity(columns as usize * rows as usize);
    for row in 0..rows {
        for column in 0..columns {
            let x = column * tile_width;
            let y = row * tile_height;
            tiles.push(TileRect {
                x,
                y,
                width: (x + tile_width).min(width) - x,
                height: (y + tile_height).min(height) - y,
            });
        }
    }
    Ok(tiles)
}

/// File name of the `index`-th tile (1-based)
pub fn tile_filename(index: usize) -> String {
    format!("chunk_{:04}.png", index)
}

/// Split an in-memory image into tiles written to `output_dir`
pub fn split_loaded_image(
    img: &DynamicImage,
    output_dir: &Path,
    tile_width: u32,
    tile_height: u32,
) -> Result<Vec<PathBuf>> {
    let tiles = tile_grid(img.width(), img.height(), tile_width, tile_height)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output folder {}", output_dir.display()))?;

    let mut written = Vec::with_capacity(tiles.len());
    for (idx, rect) in tiles.iter().enumerate() {
        let tile = img.crop_imm(rect.x, rect.y, rect.width, rect.height);
        let path = output_dir.join(tile_filename(idx + 1));
        tile.save(&path)
            .with_context(|| format!("Failed to save tile {}", path.display()))?;
        debug!("tile {} at ({}, {}) {}x{}", idx + 1, rect.x, rect.y, rect.width, rect.height);
        written.push(path);
    }

    Ok(written)
}

/// Split the raster at `source` into `tile_width` x `tile_height` tiles.
///
/// The destination folder is created when missing. Tiles are numbered
/// row-major starting at 1; the last column and row are not padded.
pub fn split_image<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    output_dir: Q,
    tile_width: u32,
    tile_height: u32,
) -> Result<Vec<PathBuf>> {
    let source = source.as_ref();
    let output_dir = output_dir.as_ref();

    // Orthophotos easily exceed the decoder's default allocation limits
    let mut reader = ImageReader::open(source)
        .with_context(|| format!("Failed to open {}", source.display()))?
        .with_guessed_format()
        .with_context(|| format!("Failed to read {}", source.display()))?;
    reader.no_limits();
    let img = reader
        .decode()
        .with_context(|| format!("Failed to decode {}", source.display()))?;

    info!(
        "Splitting {} ({}x{}) into {}x{} tiles",
        source.display(),
        img.width(),
        img.height(),
        tile_width,
        tile_height
    );

    let written = split_loaded_image(&img, output_dir, tile_width, tile_height)?;
    info!("Wrote {} tiles to {}", written.len(), output_dir.display());
    Ok(written)
}
