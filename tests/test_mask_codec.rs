mod common;

use common::*;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, RgbaImage};
use parkseg::mask::{denormalize, normalize, MaskError};

#[test]
fn test_round_trip_restores_mapped_colors() -> anyhow::Result<()> {
    let mapping = test_mapping();
    let mask = striped_mask(20, 25);

    let classes = normalize(&DynamicImage::ImageRgb8(mask.clone()), &mapping)?;
    let restored = denormalize(&classes, &mapping)?;

    assert_eq!(restored, mask);
    Ok(())
}

#[test]
fn test_normalize_assigns_class_ids() -> anyhow::Result<()> {
    let mapping = test_mapping();
    let mut mask = RgbImage::from_pixel(3, 1, rgb(ROAD));
    mask.put_pixel(1, 0, rgb(VEHICLE));
    mask.put_pixel(2, 0, rgb(VEGETATION));

    let classes = normalize(&DynamicImage::ImageRgb8(mask), &mapping)?;

    assert_eq!(classes.get_pixel(0, 0)[0], 3);
    assert_eq!(classes.get_pixel(1, 0)[0], 4);
    assert_eq!(classes.get_pixel(2, 0)[0], 1);
    Ok(())
}

#[test]
fn test_unmapped_colors_become_class_zero() -> anyhow::Result<()> {
    let mapping = test_mapping();
    let mut mask = RgbImage::from_pixel(4, 4, rgb(BUILDING));
    mask.put_pixel(2, 2, Rgb([1, 2, 3]));

    let classes = normalize(&DynamicImage::ImageRgb8(mask), &mapping)?;

    assert_eq!(classes.get_pixel(2, 2)[0], 0);
    assert_eq!(classes.get_pixel(0, 0)[0], 2);
    Ok(())
}

#[test]
fn test_normalize_rejects_non_rgb_masks() {
    let mapping = test_mapping();

    let rgba = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
    assert!(matches!(normalize(&rgba, &mapping), Err(MaskError::NotRgb(4))));

    let gray = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
    assert!(matches!(normalize(&gray, &mapping), Err(MaskError::NotRgb(1))));
}

#[test]
fn test_denormalize_reports_unmapped_class() {
    let mapping = test_mapping();
    let mut classes = GrayImage::from_pixel(5, 5, Luma([3]));
    classes.put_pixel(4, 4, Luma([7]));

    let err = denormalize(&classes, &mapping).unwrap_err();

    assert!(matches!(err, MaskError::UnmappedClass(7)));
    assert!(err.to_string().contains('7'));
}

#[test]
fn test_mapping_rejects_duplicates() {
    let duplicate_color = ColorMapping::new([(ROAD, 1), (ROAD, 2)]);
    assert!(matches!(duplicate_color, Err(MaskError::DuplicateColor(c)) if c == ROAD));

    let duplicate_class = ColorMapping::new([(ROAD, 1), (VEHICLE, 1)]);
    assert!(matches!(duplicate_class, Err(MaskError::DuplicateClass(1))));
}
