mod common;

use common::*;
use parkseg::augment::shadow::{add_shadow, ShadowError};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_shadow_keeps_shape_and_only_darkens() -> anyhow::Result<()> {
    let image = gradient_image(64, 48);

    for seed in 0..10 {
        let mut rng = StdRng::seed_from_u64(seed);
        let shadowed = add_shadow(&image, 3, 0.25, 0.5, &mut rng)?;

        assert_eq!(shadowed.dimensions(), image.dimensions());
        for (before, after) in image.pixels().zip(shadowed.pixels()) {
            for c in 0..3 {
                assert!(after[c] <= before[c], "seed {}: channel brightened", seed);
            }
        }
    }
    Ok(())
}

#[test]
fn test_shadow_darkens_something() -> anyhow::Result<()> {
    let image = image::RgbImage::from_pixel(64, 64, image::Rgb([200, 200, 200]));

    let darkened = (0..10).any(|seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        add_shadow(&image, 3, 0.5, 0.5, &mut rng)
            .map(|out| out.pixels().any(|p| p[0] < 200))
            .unwrap_or(false)
    });

    assert!(darkened);
    Ok(())
}

#[test]
fn test_shadow_is_deterministic_for_a_seed() -> anyhow::Result<()> {
    let image = gradient_image(32, 32);

    let first = add_shadow(&image, 4, 0.25, 0.5, &mut StdRng::seed_from_u64(7))?;
    let second = add_shadow(&image, 4, 0.25, 0.5, &mut StdRng::seed_from_u64(7))?;

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_zero_shadows_is_identity() -> anyhow::Result<()> {
    let image = gradient_image(16, 16);
    let out = add_shadow(&image, 0, 0.25, 0.5, &mut StdRng::seed_from_u64(1))?;
    assert_eq!(out, image);
    Ok(())
}

#[test]
fn test_invalid_opacity_is_rejected() {
    let image = gradient_image(8, 8);
    let mut rng = StdRng::seed_from_u64(0);

    assert!(matches!(
        add_shadow(&image, 1, 0.6, 0.2, &mut rng),
        Err(ShadowError::InvalidOpacity { .. })
    ));
    assert!(matches!(
        add_shadow(&image, 1, 0.2, 1.5, &mut rng),
        Err(ShadowError::InvalidOpacity { .. })
    ));
}
