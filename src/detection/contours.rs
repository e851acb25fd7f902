use std::collections::{HashMap, VecDeque};

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::models::{Color, Region};

pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Binary mask (255) of pixels exactly matching `color`
pub fn color_mask(image: &RgbImage, color: Color) -> GrayImage {
    let mut mask = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        if color.matches(pixel) {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    mask
}

/// Find 8-connected regions of a binary mask.
/// Returns the label image alongside the regions, ordered by label.
pub fn find_regions(mask: &GrayImage, min_area: u32) -> (LabelImage, Vec<Region>) {
    // Label connected components (non-zero pixels = foreground)
    let labeled = connected_components(mask, Connectivity::Eight, Luma([0]));

    let mut regions: HashMap<u32, (u32, u32, u32, u32, u32)> = HashMap::new();

    for (x, y, label) in labeled.enumerate_pixels() {
        let label_val = label[0];
        if label_val == 0 {
            continue; // Skip background
        }

        regions.entry(label_val)
            .and_modify(|(min_x, min_y, max_x, max_y, count)| {
                *min_x = (*min_x).min(x);
                *min_y = (*min_y).min(y);
                *max_x = (*max_x).max(x);
                *max_y = (*max_y).max(y);
                *count += 1;
            })
            .or_insert((x, y, x, y, 1));
    }

    let mut regions: Vec<Region> = regions.into_iter()
        .map(|(label, (min_x, min_y, max_x, max_y, count))| Region {
            label,
            min_x,
            min_y,
            max_x,
            max_y,
            pixel_count: count,
        })
        .filter(|r| r.pixel_count >= min_area)
        .collect();
    regions.sort_by_key(|r| r.label);

    (labeled, regions)
}

/// Mask of `region` inside the window `(x0, y0, w, h)` with its holes filled,
/// i.e. everything enclosed by the region's outer boundary.
pub fn filled_region_mask(labels: &LabelImage, region: &Region, window: (u32, u32, u32, u32)) -> GrayImage {
    let (x0, y0, w, h) = window;
    let mut mask = GrayImage::from_fn(w, h, |x, y| {
        if labels.get_pixel(x0 + x, y0 + y)[0] == region.label {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    fill_holes(&mut mask);
    mask
}

/// Set to 255 every zero pixel that cannot reach the border through zero
/// pixels (4-connected, dual to the 8-connected foreground).
fn fill_holes(mask: &mut GrayImage) {
    let (w, h) = mask.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let mut outside = vec![false; (w * h) as usize];
    let mut queue = VecDeque::new();

    let seed = |x: u32, y: u32, outside: &mut Vec<bool>, queue: &mut VecDeque<(u32, u32)>| {
        let idx = (y * w + x) as usize;
        if !outside[idx] && mask.get_pixel(x, y)[0] == 0 {
            outside[idx] = true;
            queue.push_back((x, y));
        }
    };

    for x in 0..w {
        seed(x, 0, &mut outside, &mut queue);
        seed(x, h - 1, &mut outside, &mut queue);
    }
    for y in 0..h {
        seed(0, y, &mut outside, &mut queue);
        seed(w - 1, y, &mut outside, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        if x > 0 {
            seed(x - 1, y, &mut outside, &mut queue);
        }
        if x + 1 < w {
            seed(x + 1, y, &mut outside, &mut queue);
        }
        if y > 0 {
            seed(x, y - 1, &mut outside, &mut queue);
        }
        if y + 1 < h {
            seed(x, y + 1, &mut outside, &mut queue);
        }
    }

    for (i, pixel) in mask.pixels_mut().enumerate() {
        if pixel[0] == 0 && !outside[i] {
            pixel[0] = 255;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_interior_is_filled() {
        // 5x5 ring enclosing a 3x3 hole
        let mut mask = GrayImage::new(7, 7);
        for y in 1..6 {
            for x in 1..6 {
                if x == 1 || x == 5 || y == 1 || y == 5 {
                    mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
        mask.put_pixel(3, 3, Luma([0]));
        fill_holes(&mut mask);
        assert_eq!(mask.get_pixel(3, 3)[0], 255);
        assert_eq!(mask.get_pixel(2, 2)[0], 255);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn open_shape_is_not_filled() {
        let mut mask = GrayImage::new(5, 5);
        for y in 1..4 {
            mask.put_pixel(1, y, Luma([255]));
            mask.put_pixel(3, y, Luma([255]));
        }
        fill_holes(&mut mask);
        assert_eq!(mask.get_pixel(2, 2)[0], 0);
    }
}
