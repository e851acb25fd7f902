//! Color-coded label masks <-> per-pixel class indices.
//!
//! Ground-truth masks are drawn with one RGB color per class. Models work on
//! single-channel images holding the class id. [`ColorMapping`] holds the
//! table between the two and is the only place that translates.

use std::collections::HashMap;

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use thiserror::Error;

use crate::models::Color;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("mask must be an RGB image with 3 color channels, got {0} channel(s)")]
    NotRgb(u8),
    #[error("class {0} present in mask has no color in the mapping")]
    UnmappedClass(u8),
    #[error("color {0} is mapped to more than one class")]
    DuplicateColor(Color),
    #[error("class {0} is mapped from more than one color")]
    DuplicateClass(u8),
}

/// Bijective table between mask colors and class ids
#[derive(Debug, Clone)]
pub struct ColorMapping {
    entries: Vec<(Color, u8)>,
    by_color: HashMap<[u8; 3], u8>,
    by_class: HashMap<u8, Color>,
}

impl ColorMapping {
    pub fn new<I>(entries: I) -> Result<Self, MaskError>
    where
        I: IntoIterator<Item = (Color, u8)>,
    {
        let mut mapping = ColorMapping {
            entries: Vec::new(),
            by_color: HashMap::new(),
            by_class: HashMap::new(),
        };
        for (color, class_id) in entries {
            if mapping.by_color.insert(color.into(), class_id).is_some() {
                return Err(MaskError::DuplicateColor(color));
            }
            if mapping.by_class.insert(class_id, color).is_some() {
                return Err(MaskError::DuplicateClass(class_id));
            }
            mapping.entries.push((color, class_id));
        }
        Ok(mapping)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn class_of(&self, color: &Rgb<u8>) -> Option<u8> {
        self.by_color.get(&color.0).copied()
    }

    pub fn color_of(&self, class_id: u8) -> Option<Color> {
        self.by_class.get(&class_id).copied()
    }
}

/// Convert a color mask into a class mask.
///
/// Fails unless the image has exactly three channels. Colors missing from
/// the mapping become class 0.
pub fn normalize(mask: &DynamicImage, mapping: &ColorMapping) -> Result<GrayImage, MaskError> {
    let channels = mask.color().channel_count();
    if channels != 3 {
        return Err(MaskError::NotRgb(channels));
    }
    Ok(normalize_rgb(&mask.to_rgb8(), mapping))
}

/// Same as [`normalize`] for an image already decoded as RGB
pub fn normalize_rgb(mask: &RgbImage, mapping: &ColorMapping) -> GrayImage {
    let mut classes = GrayImage::new(mask.width(), mask.height());
    for (x, y, pixel) in mask.enumerate_pixels() {
        if let Some(class_id) = mapping.class_of(pixel) {
            classes.put_pixel(x, y, Luma([class_id]));
        }
    }
    classes
}

/// Convert a class mask back into a color mask.
///
/// Every class value present must have a color, otherwise the class id is
/// reported instead of painting it black.
pub fn denormalize(classes: &GrayImage, mapping: &ColorMapping) -> Result<RgbImage, MaskError> {
    let mut palette = [None; 256];
    for pixel in classes.pixels() {
        let class_id = pixel[0];
        if palette[class_id as usize].is_none() {
            let color = mapping
                .color_of(class_id)
                .ok_or(MaskError::UnmappedClass(class_id))?;
            palette[class_id as usize] = Some(Rgb::from(color));
        }
    }

    let mut colors = RgbImage::new(classes.width(), classes.height());
    for (x, y, pixel) in classes.enumerate_pixels() {
        if let Some(color) = palette[pixel[0] as usize] {
            colors.put_pixel(x, y, color);
        }
    }
    Ok(colors)
}
