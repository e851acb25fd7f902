use std::path::PathBuf;

use image::Rgb;
use serde::{Deserialize, Serialize};

/// RGB color as written in configuration files (`[r, g, b]`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn matches(&self, pixel: &Rgb<u8>) -> bool {
        pixel.0 == [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Color { r, g, b }
    }
}

impl From<Color> for [u8; 3] {
    fn from(color: Color) -> Self {
        [color.r, color.g, color.b]
    }
}

impl From<Color> for Rgb<u8> {
    fn from(color: Color) -> Self {
        Rgb([color.r, color.g, color.b])
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// A connected region of same-colored pixels in a mask
#[derive(Debug, Clone)]
pub struct Region {
    pub label: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub pixel_count: u32,
}

impl Region {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn area(&self) -> u32 {
        self.pixel_count
    }

    /// Bounding box grown by `margin` on every side, clamped to `width` x `height`.
    /// Returned as `(x, y, w, h)`.
    pub fn padded_bounds(&self, margin: u32, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x = self.min_x.saturating_sub(margin);
        let y = self.min_y.saturating_sub(margin);
        let max_x = (self.max_x + margin).min(width - 1);
        let max_y = (self.max_y + margin).min(height - 1);
        (x, y, max_x - x + 1, max_y - y + 1)
    }

    pub fn center(&self) -> (u32, u32) {
        ((self.min_x + self.max_x) / 2, (self.min_y + self.max_y) / 2)
    }
}

/// Context counts and verdict for one vehicle region
#[derive(Debug, Clone)]
pub struct RegionDecision {
    pub region: Region,
    /// Background-colored pixels in the grown neighborhood
    pub background: u32,
    /// Road-colored pixels in the grown neighborhood
    pub road: u32,
    pub parked: bool,
}

/// Outcome of post-processing one prediction image
#[derive(Debug, Clone)]
pub struct ParkingReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub regions: usize,
    pub parked: usize,
}
