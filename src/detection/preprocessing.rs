use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use imageproc::filter::gaussian_blur_f32;

use crate::geometry::Quadrilateral;

const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;
const OUTLINE: Rgb<u8> = Rgb([255, 0, 0]);

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Apply Gaussian blur to reduce noise; a non-positive sigma is a no-op
pub fn apply_blur(img: GrayImage, sigma: f32) -> GrayImage {
    if sigma > 0.0 {
        gaussian_blur_f32(&img, sigma)
    } else {
        img
    }
}

/// Mark pixels darker than `threshold` as foreground (255), the rest as background (0)
pub fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] < threshold {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

pub fn count_foreground(mask: &GrayImage) -> u64 {
    mask.pixels().filter(|p| p[0] == FOREGROUND).count() as u64
}

/// Render the mask in colour with each boundary outlined
pub fn render_diagnostic<'q>(
    mask: &GrayImage,
    boundaries: impl IntoIterator<Item = &'q Quadrilateral>,
) -> RgbImage {
    let mut canvas = RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        let v = mask.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });

    for quad in boundaries {
        let c = quad.corners();
        for i in 0..4 {
            let a = c[i];
            let b = c[(i + 1) % 4];
            draw_line_segment_mut(
                &mut canvas,
                (a.x as f32, a.y as f32),
                (b.x as f32, b.y as f32),
                OUTLINE,
            );
        }
    }

    canvas
}
