use image::RgbImage;
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use rand::{Rng, RngCore};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShadowError {
    #[error("shadow opacity range [{min}, {max}] must satisfy 0 <= min <= max <= 1")]
    InvalidOpacity { min: f32, max: f32 },
}

/// Darken `image` with `num_shadows` random quadrilaterals.
///
/// Each shadow is painted black on a copy of the current result and blended
/// back with an opacity drawn from `[min_opacity, max_opacity]`, so pixels
/// are only ever darkened.
pub fn add_shadow(
    image: &RgbImage,
    num_shadows: u32,
    min_opacity: f32,
    max_opacity: f32,
    rng: &mut dyn RngCore,
) -> Result<RgbImage, ShadowError> {
    if !(0.0..=1.0).contains(&min_opacity)
        || !(0.0..=1.0).contains(&max_opacity)
        || min_opacity > max_opacity
    {
        return Err(ShadowError::InvalidOpacity {
            min: min_opacity,
            max: max_opacity,
        });
    }

    let (width, height) = image.dimensions();
    let mut result = image.clone();
    if width == 0 || height == 0 {
        return Ok(result);
    }

    for _ in 0..num_shadows {
        let mut shadowed = result.clone();

        let corners: Vec<Point<i32>> = (0..4)
            .map(|_| {
                Point::new(
                    rng.gen_range(0..=width as i32),
                    rng.gen_range(0..=height as i32),
                )
            })
            .collect();
        if let Some(polygon) = polygon_outline(&corners) {
            draw_polygon_mut(&mut shadowed, &polygon, image::Rgb([0, 0, 0]));
        }

        let alpha = rng.gen_range(min_opacity..=max_opacity);
        blend(&mut result, &shadowed, alpha);
    }

    Ok(result)
}

/// Drop repeated vertices; None when fewer than three distinct ones remain
fn polygon_outline(corners: &[Point<i32>]) -> Option<Vec<Point<i32>>> {
    let mut outline: Vec<Point<i32>> = Vec::with_capacity(corners.len());
    for &corner in corners {
        if outline.last() != Some(&corner) {
            outline.push(corner);
        }
    }
    while outline.len() > 1 && outline.first() == outline.last() {
        outline.pop();
    }
    if outline.len() < 3 {
        return None;
    }
    Some(outline)
}

/// `base = overlay * alpha + base * (1 - alpha)`, rounded and saturated
fn blend(base: &mut RgbImage, overlay: &RgbImage, alpha: f32) {
    for (dst, src) in base.pixels_mut().zip(overlay.pixels()) {
        for c in 0..3 {
            let value = src[c] as f32 * alpha + dst[c] as f32 * (1.0 - alpha);
            dst[c] = value.round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_drops_closing_duplicate() {
        let corners = [
            Point::new(0, 0),
            Point::new(5, 0),
            Point::new(5, 5),
            Point::new(0, 0),
        ];
        let outline = polygon_outline(&corners).unwrap();
        assert_eq!(outline.len(), 3);
    }

    #[test]
    fn outline_rejects_degenerate_quad() {
        let corners = [
            Point::new(2, 2),
            Point::new(2, 2),
            Point::new(7, 1),
            Point::new(7, 1),
        ];
        assert!(polygon_outline(&corners).is_none());
    }

    #[test]
    fn blend_with_identical_overlay_is_identity() {
        let mut base = RgbImage::from_pixel(3, 3, image::Rgb([201, 17, 99]));
        let overlay = base.clone();
        blend(&mut base, &overlay, 0.37);
        assert!(base.pixels().all(|p| p.0 == [201, 17, 99]));
    }
}
