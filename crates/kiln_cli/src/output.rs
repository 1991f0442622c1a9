//! Conversion of accumulated samples to a displayable 8-bit image.

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use kiln_math::{Vec3, Vec4};

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Average of the accumulated samples; black while the weight is zero.
#[inline]
pub fn resolve(cell: Vec4) -> Vec3 {
    if cell.w > 0.0 {
        cell.truncate() / cell.w
    } else {
        Vec3::ZERO
    }
}

/// Convert a linear color to 8-bit RGBA.
pub fn color_to_rgba(color: Vec3) -> [u8; 4] {
    let r = (255.0 * linear_to_gamma(color.x).clamp(0.0, 1.0)) as u8;
    let g = (255.0 * linear_to_gamma(color.y).clamp(0.0, 1.0)) as u8;
    let b = (255.0 * linear_to_gamma(color.z).clamp(0.0, 1.0)) as u8;
    [r, g, b, 255]
}

/// Build an image from renderer pixels. Row 0 of the renderer is the
/// bottom of the picture.
pub fn to_image(pixels: &[Vec4], width: usize, height: usize) -> RgbaImage {
    RgbaImage::from_fn(width as u32, height as u32, |x, y| {
        let row = height - 1 - y as usize;
        Rgba(color_to_rgba(resolve(pixels[row * width + x as usize])))
    })
}

pub fn save_png(pixels: &[Vec4], width: usize, height: usize, path: &Path) -> Result<()> {
    to_image(pixels, width, height)
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_to_gamma() {
        assert_eq!(linear_to_gamma(0.0), 0.0);
        assert!((linear_to_gamma(1.0) - 1.0).abs() < 0.0001);
        assert!((linear_to_gamma(0.25) - 0.5).abs() < 0.0001);
    }

    #[test]
    fn test_resolve_divides_by_weight() {
        assert_eq!(resolve(Vec4::new(2.0, 1.0, 0.0, 4.0)), Vec3::new(0.5, 0.25, 0.0));
        assert_eq!(resolve(Vec4::ZERO), Vec3::ZERO);
    }

    #[test]
    fn test_image_is_flipped_vertically() {
        // 1x2: bottom row white, top row black
        let pixels = [Vec4::new(3.0, 3.0, 3.0, 3.0), Vec4::new(0.0, 0.0, 0.0, 1.0)];
        let image = to_image(&pixels, 1, 2);

        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(0, 1).0, [255, 255, 255, 255]);
    }
}
