use image::{Rgb, RgbImage};
use parkseg::tiling::{split_image, tile_filename, tile_grid, TilingError};

fn write_source(dir: &std::path::Path, width: u32, height: u32) -> anyhow::Result<std::path::PathBuf> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 7]));
    let path = dir.join("ortho.png");
    img.save(&path)?;
    Ok(path)
}

#[test]
fn test_split_300_by_256() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let source = write_source(dir.path(), 300, 300)?;
    let out = dir.path().join("tiles");

    let written = split_image(&source, &out, 256, 256)?;

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["chunk_0001.png", "chunk_0002.png", "chunk_0003.png", "chunk_0004.png"]
    );

    let sizes: Vec<(u32, u32)> = written
        .iter()
        .map(|p| image::image_dimensions(p))
        .collect::<Result<_, _>>()?;
    assert_eq!(sizes, vec![(256, 256), (44, 256), (256, 44), (44, 44)]);
    Ok(())
}

#[test]
fn test_tiles_keep_source_pixels() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let source = write_source(dir.path(), 30, 20)?;
    let out = dir.path().join("tiles");

    let written = split_image(&source, &out, 16, 16)?;
    assert_eq!(written.len(), 4);

    // Second tile starts at x = 16, last tile at (16, 16)
    let second = image::open(&written[1])?.to_rgb8();
    assert_eq!(second.dimensions(), (14, 16));
    assert_eq!(*second.get_pixel(0, 0), Rgb([16, 0, 7]));

    let last = image::open(&written[3])?.to_rgb8();
    assert_eq!(last.dimensions(), (14, 4));
    assert_eq!(*last.get_pixel(3, 2), Rgb([19, 18, 7]));
    Ok(())
}

#[test]
fn test_exact_multiple_has_no_partial_tiles() -> anyhow::Result<()> {
    let tiles = tile_grid(512, 256, 256, 256)?;
    assert_eq!(tiles.len(), 2);
    assert!(tiles.iter().all(|t| t.width == 256 && t.height == 256));
    Ok(())
}

#[test]
fn test_tile_count_formula() -> anyhow::Result<()> {
    let tiles = tile_grid(1000, 700, 300, 200)?;
    assert_eq!(tiles.len(), 4 * 4);
    assert_eq!((tiles[3].width, tiles[3].height), (100, 200));
    assert_eq!((tiles[15].width, tiles[15].height), (100, 100));
    Ok(())
}

#[test]
fn test_zero_tile_size_is_rejected() {
    assert!(matches!(
        tile_grid(10, 10, 0, 5),
        Err(TilingError::InvalidTileSize { width: 0, height: 5 })
    ));
}

#[test]
fn test_missing_source_fails_with_path() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("nope.png");
    let err = split_image(&missing, dir.path().join("out"), 8, 8).unwrap_err();
    assert!(format!("{:#}", err).contains("nope.png"));
}

#[test]
fn test_tile_filename_is_zero_padded() {
    assert_eq!(tile_filename(1), "chunk_0001.png");
    assert_eq!(tile_filename(12345), "chunk_12345.png");
}
