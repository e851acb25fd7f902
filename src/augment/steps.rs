use anyhow::Result;
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Pixel};
use imageproc::geometric_transformations::Projection;
use rand::{Rng, RngCore};

use crate::augment::geometry::{warp_mask, warp_rgb};
use crate::augment::shadow::add_shadow;
use crate::config::{PadMode, SampleMode, ShadowConfig};
use crate::pipeline::{AugmentStep, Sample};

fn filter_for(mode: SampleMode) -> FilterType {
    match mode {
        SampleMode::Bilinear => FilterType::Triangle,
        SampleMode::Nearest => FilterType::Nearest,
    }
}

fn resize_sample(sample: Sample, width: u32, height: u32, mode: SampleMode) -> Sample {
    sample.map(
        |img| imageops::resize(img, width, height, filter_for(mode)),
        |mask| imageops::resize(mask, width, height, FilterType::Nearest),
    )
}

/// Resize image and mask to a square
pub struct ResizeStep {
    pub size: u32,
    pub mode: SampleMode,
}

impl AugmentStep for ResizeStep {
    fn apply(&self, sample: Sample, _rng: &mut dyn RngCore) -> Result<Sample> {
        if sample.dimensions() == (self.size, self.size) {
            return Ok(sample);
        }
        Ok(resize_sample(sample, self.size, self.size, self.mode))
    }

    fn name(&self) -> &str {
        "Resize"
    }
}

/// Random synthetic shadows (image only)
pub struct ShadowStep {
    pub config: ShadowConfig,
}

impl AugmentStep for ShadowStep {
    fn apply(&self, sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        let image = add_shadow(
            &sample.image,
            self.config.num_shadows,
            self.config.min_opacity,
            self.config.max_opacity,
            rng,
        )?;
        Ok(Sample {
            image,
            mask: sample.mask,
        })
    }

    fn name(&self) -> &str {
        "Shadow"
    }
}

/// Random horizontal flip, or one of the eight dihedral orientations when
/// vertical flips are allowed
pub struct FlipStep {
    pub vertical: bool,
}

type Buffer<P> = ImageBuffer<P, Vec<<P as Pixel>::Subpixel>>;

fn transpose<P: Pixel + 'static>(img: &Buffer<P>) -> Buffer<P> {
    imageops::flip_horizontal(&imageops::rotate90(img))
}

fn dihedral<P: Pixel + 'static>(img: &Buffer<P>, k: u8) -> Buffer<P> {
    let mut out = img.clone();
    if k & 1 != 0 {
        out = imageops::flip_horizontal(&out);
    }
    if k & 2 != 0 {
        out = imageops::flip_vertical(&out);
    }
    if k & 4 != 0 {
        out = transpose(&out);
    }
    out
}

impl AugmentStep for FlipStep {
    fn apply(&self, sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        let k: u8 = if self.vertical {
            rng.gen_range(0..8)
        } else if rng.gen_bool(0.5) {
            1
        } else {
            0
        };
        if k == 0 {
            return Ok(sample);
        }
        Ok(sample.map(|img| dihedral(img, k), |mask| dihedral(mask, k)))
    }

    fn name(&self) -> &str {
        if self.vertical { "Dihedral" } else { "Flip" }
    }
}

/// Rotation, zoom and perspective warp combined into one resampling pass.
/// Each component is drawn independently with probability `p_affine`.
pub struct AffineStep {
    pub max_rotate: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub max_warp: f32,
    pub p_affine: f32,
    pub mode: SampleMode,
    pub pad_mode: PadMode,
}

impl AffineStep {
    /// Draw a forward projection (source -> output) for a `width` x `height` sample
    pub fn draw_projection(&self, width: u32, height: u32, rng: &mut dyn RngCore) -> Option<Projection> {
        let p = self.p_affine.clamp(0.0, 1.0) as f64;
        let cx = (width as f32 - 1.0) / 2.0;
        let cy = (height as f32 - 1.0) / 2.0;
        let mut changed = false;
        let mut projection = Projection::translate(0.0, 0.0);

        if self.max_rotate > 0.0 && rng.gen_bool(p) {
            let degrees = rng.gen_range(-self.max_rotate..=self.max_rotate);
            projection = Projection::rotate(degrees.to_radians()) * projection;
            changed = true;
        }
        if self.max_zoom > self.min_zoom && rng.gen_bool(p) {
            let zoom = rng.gen_range(self.min_zoom..=self.max_zoom);
            projection = Projection::scale(zoom, zoom) * projection;
            changed = true;
        } else if self.min_zoom != 1.0 && self.min_zoom == self.max_zoom {
            projection = Projection::scale(self.min_zoom, self.min_zoom) * projection;
            changed = true;
        }
        // Center the rotation/zoom on the image
        projection = Projection::translate(cx, cy) * projection * Projection::translate(-cx, -cy);

        if self.max_warp > 0.0 && rng.gen_bool(p) {
            let tilt_x = rng.gen_range(-self.max_warp..=self.max_warp);
            let tilt_y = rng.gen_range(-self.max_warp..=self.max_warp);
            let w = width as f32 - 1.0;
            let h = height as f32 - 1.0;
            let dx = tilt_x * w / 2.0;
            let dy = tilt_y * h / 2.0;
            let from = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
            let to = [(dx, dy), (w - dx, -dy), (w + dx, h + dy), (-dx, h - dy)];
            if let Some(warp) = Projection::from_control_points(from, to) {
                projection = warp * projection;
                changed = true;
            }
        }

        changed.then_some(projection)
    }
}

impl AugmentStep for AffineStep {
    fn apply(&self, sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        let (width, height) = sample.dimensions();
        if width < 2 || height < 2 {
            return Ok(sample);
        }
        let Some(forward) = self.draw_projection(width, height, rng) else {
            return Ok(sample);
        };
        let inverse = forward.invert();
        let (mode, pad) = (self.mode, self.pad_mode);
        Ok(sample.map(
            |img| warp_rgb(img, &inverse, mode, pad),
            |mask| warp_mask(mask, &inverse, pad),
        ))
    }

    fn name(&self) -> &str {
        "Affine"
    }
}

fn logit(x: f32) -> f32 {
    let x = x.clamp(1e-4, 1.0 - 1e-4);
    (x / (1.0 - x)).ln()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Brightness and contrast jitter in logit space (image only)
pub struct LightingStep {
    pub max_lighting: f32,
    pub p_lighting: f32,
}

impl LightingStep {
    fn lookup_table(brightness: Option<f32>, contrast: Option<f32>) -> [u8; 256] {
        let mut table = [0u8; 256];
        for (value, slot) in table.iter_mut().enumerate() {
            let mut l = logit(value as f32 / 255.0);
            if let Some(b) = brightness {
                l += logit(b);
            }
            if let Some(c) = contrast {
                l *= c;
            }
            *slot = (sigmoid(l) * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        table
    }
}

impl AugmentStep for LightingStep {
    fn apply(&self, sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        let max = self.max_lighting.clamp(0.0, 0.99);
        if max == 0.0 {
            return Ok(sample);
        }
        let p = self.p_lighting.clamp(0.0, 1.0) as f64;

        let brightness = rng
            .gen_bool(p)
            .then(|| rng.gen_range(0.5 * (1.0 - max)..=0.5 * (1.0 + max)));
        let contrast = rng.gen_bool(p).then(|| {
            let bound = (1.0 - max).ln();
            rng.gen_range(bound..=-bound).exp()
        });
        if brightness.is_none() && contrast.is_none() {
            return Ok(sample);
        }

        let table = Self::lookup_table(brightness, contrast);
        let mut image = sample.image;
        for pixel in image.pixels_mut() {
            for c in 0..3 {
                pixel[c] = table[pixel[c] as usize];
            }
        }
        Ok(Sample {
            image,
            mask: sample.mask,
        })
    }

    fn name(&self) -> &str {
        "Lighting"
    }
}

/// Crop a random area fraction in `[min_scale, 1]` with aspect ratio in
/// `[3/4, 4/3]`, then resize to `size` x `size`
pub struct RandomResizedCropStep {
    pub size: u32,
    pub min_scale: f32,
    pub mode: SampleMode,
}

impl RandomResizedCropStep {
    fn draw_crop(&self, width: u32, height: u32, rng: &mut dyn RngCore) -> (u32, u32, u32, u32) {
        let area = (width * height) as f32;
        let min_scale = self.min_scale.clamp(f32::EPSILON, 1.0);
        let (log_lo, log_hi) = ((3.0f32 / 4.0).ln(), (4.0f32 / 3.0).ln());
        for _ in 0..10 {
            let target = area * rng.gen_range(min_scale..=1.0);
            let ratio = rng.gen_range(log_lo..=log_hi).exp();
            let w = (target * ratio).sqrt().round() as u32;
            let h = (target / ratio).sqrt().round() as u32;
            if w > 0 && h > 0 && w <= width && h <= height {
                let x = rng.gen_range(0..=width - w);
                let y = rng.gen_range(0..=height - h);
                return (x, y, w, h);
            }
        }
        // Fall back to the largest centered square
        let side = width.min(height);
        ((width - side) / 2, (height - side) / 2, side, side)
    }
}

impl AugmentStep for RandomResizedCropStep {
    fn apply(&self, sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        let (width, height) = sample.dimensions();
        if width == 0 || height == 0 {
            return Ok(sample);
        }
        let (x, y, w, h) = self.draw_crop(width, height, rng);
        let cropped = sample.map(
            |img| imageops::crop_imm(img, x, y, w, h).to_image(),
            |mask| imageops::crop_imm(mask, x, y, w, h).to_image(),
        );
        Ok(resize_sample(cropped, self.size, self.size, self.mode))
    }

    fn name(&self) -> &str {
        "Random Resized Crop"
    }
}
