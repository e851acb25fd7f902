use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::Projection;

use crate::config::{PadMode, SampleMode};

/// Map a continuous source coordinate onto `[0, len - 1]` according to `pad`.
/// None means the sample falls outside and is filled with zeros.
fn resolve(coord: f32, len: u32, pad: PadMode) -> Option<f32> {
    let max = (len - 1) as f32;
    match pad {
        PadMode::Zeros => {
            if coord < -0.5 || coord > max + 0.5 {
                None
            } else {
                Some(coord.clamp(0.0, max))
            }
        }
        PadMode::Border => Some(coord.clamp(0.0, max)),
        PadMode::Reflection => {
            // Mirror about the outer pixel edges (-0.5 and len - 0.5)
            let period = 2.0 * len as f32;
            let mut t = (coord + 0.5).rem_euclid(period);
            if t >= len as f32 {
                t = period - t;
            }
            Some((t - 0.5).clamp(0.0, max))
        }
    }
}

fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = image.get_pixel(x0, y0);
    let p10 = image.get_pixel(x1, y0);
    let p01 = image.get_pixel(x0, y1);
    let p11 = image.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Resample `image` through `inverse`, which maps output pixels to source pixels
pub fn warp_rgb(image: &RgbImage, inverse: &Projection, mode: SampleMode, pad: PadMode) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut out = RgbImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let (sx, sy) = *inverse * (x as f32, y as f32);
        let (Some(sx), Some(sy)) = (resolve(sx, width, pad), resolve(sy, height, pad)) else {
            continue;
        };
        *pixel = match mode {
            SampleMode::Bilinear => sample_bilinear(image, sx, sy),
            SampleMode::Nearest => *image.get_pixel(sx.round() as u32, sy.round() as u32),
        };
    }
    out
}

/// Nearest-neighbour counterpart of [`warp_rgb`] for class masks.
/// Padding with zeros yields class 0.
pub fn warp_mask(mask: &GrayImage, inverse: &Projection, pad: PadMode) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let (sx, sy) = *inverse * (x as f32, y as f32);
        if let (Some(sx), Some(sy)) = (resolve(sx, width, pad), resolve(sy, height, pad)) {
            *pixel = Luma([mask.get_pixel(sx.round() as u32, sy.round() as u32)[0]]);
        }
    }
    out
}
