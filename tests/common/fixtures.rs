#![allow(dead_code)]

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point as PixelPoint;
use imageproc::rect::Rect;
use photoslicer::{CancelToken, Detection, DetectionEngine, ParameterSet};

/// Scanner lid colour
pub const BED: Rgb<u8> = Rgb([250, 250, 250]);
/// Uniform photograph colour, well below the default threshold
pub const PHOTO: Rgb<u8> = Rgb([60, 70, 80]);

/// A blank sheet of the given size
pub fn blank_sheet(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, BED)
}

/// Paint an upright uniform photograph
pub fn paint_photo(sheet: &mut RgbImage, x: i32, y: i32, width: u32, height: u32) {
    draw_filled_rect_mut(sheet, Rect::at(x, y).of_size(width, height), PHOTO);
}

/// Paint an upright photograph with position-dependent content
pub fn paint_textured_photo(sheet: &mut RgbImage, x: u32, y: u32, width: u32, height: u32) {
    for py in y..y + height {
        for px in x..x + width {
            let (dx, dy) = (px - x, py - y);
            sheet.put_pixel(
                px,
                py,
                Rgb([20 + (dx % 150) as u8, 30 + (dy % 150) as u8, 100]),
            );
        }
    }
}

/// Paint a photograph rotated clockwise by `degrees` around `(cx, cy)`
pub fn paint_rotated_photo(
    sheet: &mut RgbImage,
    cx: f64,
    cy: f64,
    width: f64,
    height: f64,
    degrees: f64,
) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (hw, hh) = (width / 2.0, height / 2.0);
    let poly: Vec<PixelPoint<i32>> = [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
        .iter()
        .map(|&(x, y)| {
            PixelPoint::new(
                (cx + x * cos - y * sin).round() as i32,
                (cy + x * sin + y * cos).round() as i32,
            )
        })
        .collect();
    draw_polygon_mut(sheet, &poly, PHOTO);
}

/// Sheet with two well separated photographs: 120x80 at (30, 40) and 150x100 at (220, 150)
pub fn two_photo_sheet() -> DynamicImage {
    let mut sheet = blank_sheet(400, 300);
    paint_photo(&mut sheet, 30, 40, 120, 80);
    paint_photo(&mut sheet, 220, 150, 150, 100);
    DynamicImage::ImageRgb8(sheet)
}

pub fn default_params() -> ParameterSet {
    ParameterSet::detection().expect("built-in parameters are valid")
}

/// Run detection, collecting progress messages
pub fn run_detection(
    image: &DynamicImage,
    params: &ParameterSet,
    cancel: &CancelToken,
) -> (Result<Detection, photoslicer::SlicerError>, Vec<String>) {
    let mut messages = Vec::new();
    let mut sink = |m: &str| messages.push(m.to_string());
    let result = DetectionEngine::new().detect(image, params, &mut sink, cancel);
    (result, messages)
}

pub fn assert_near(actual: photoslicer::Point, x: f64, y: f64, tolerance: f64) {
    assert!(
        (actual.x - x).abs() <= tolerance && (actual.y - y).abs() <= tolerance,
        "expected ({}, {}) ± {}, got {:?}",
        x,
        y,
        tolerance,
        actual
    );
}
