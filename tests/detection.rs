mod common;

use common::*;
use image::DynamicImage;
use photoslicer::params::{BORDER_MARGIN, MERGE_TOLERANCE, MIN_AREA};

#[test]
fn two_separate_photos_are_found_in_reading_order() {
    let sheet = two_photo_sheet();
    let (result, _) = run_detection(&sheet, &default_params(), &CancelToken::new());
    let detection = result.unwrap();

    assert_eq!(detection.slices.len(), 2);
    assert_eq!(
        (detection.diagnostic.width(), detection.diagnostic.height()),
        (sheet.width(), sheet.height())
    );

    let first = &detection.slices[0];
    let second = &detection.slices[1];
    assert_eq!((first.order(), second.order()), (0, 1));
    assert!(!first.is_locked() && !second.is_locked());

    let c = first.boundary().corners();
    assert_near(c[0], 30.0, 40.0, 1e-6);
    assert_near(c[1], 150.0, 40.0, 1e-6);
    assert_near(c[2], 150.0, 120.0, 1e-6);
    assert_near(c[3], 30.0, 120.0, 1e-6);

    assert_near(second.boundary().corners()[0], 220.0, 150.0, 1e-6);
    assert_near(second.boundary().corners()[2], 370.0, 250.0, 1e-6);
}

#[test]
fn blank_sheet_is_an_empty_success() {
    let sheet = DynamicImage::ImageRgb8(blank_sheet(200, 100));
    let (result, messages) = run_detection(&sheet, &default_params(), &CancelToken::new());
    let detection = result.unwrap();
    assert!(detection.slices.is_empty());
    assert_eq!(detection.diagnostic.width(), 200);
    assert_eq!(messages.len(), 4);
}

#[test]
fn detection_is_deterministic() {
    let sheet = two_photo_sheet();
    let params = default_params();
    let (a, _) = run_detection(&sheet, &params, &CancelToken::new());
    let (b, _) = run_detection(&sheet, &params, &CancelToken::new());
    assert_eq!(a.unwrap().slices, b.unwrap().slices);
}

#[test]
fn progress_reports_each_stage_in_order() {
    let (result, messages) = run_detection(&two_photo_sheet(), &default_params(), &CancelToken::new());
    result.unwrap();
    assert_eq!(messages.len(), 4);
    assert!(messages[0].starts_with("Binarized"));
    assert_eq!(messages[1], "Found 2 candidate regions");
    assert_eq!(messages[2], "Fitted 2 boundaries");
    assert_eq!(messages[3], "2 photographs after merging");
}

#[test]
fn early_cancel_yields_cancelled_after_first_message() {
    let cancel = CancelToken::new();
    cancel.request();
    let (result, messages) = run_detection(&two_photo_sheet(), &default_params(), &cancel);
    assert!(matches!(result, Err(SlicerError::Cancelled)));
    assert_eq!(messages.len(), 1);
}

#[test]
fn cancel_from_progress_sink_stops_at_next_checkpoint() {
    let cancel = CancelToken::new();
    let mut messages = Vec::new();
    let mut sink = |m: &str| {
        messages.push(m.to_string());
        if messages.len() == 2 {
            cancel.request();
        }
    };
    let result = DetectionEngine::new().detect(&two_photo_sheet(), &default_params(), &mut sink, &cancel);
    assert!(matches!(result, Err(SlicerError::Cancelled)));
    assert_eq!(messages.len(), 2);
}

#[test]
fn empty_raster_means_no_image() {
    let empty = DynamicImage::new_rgb8(0, 0);
    let (result, messages) = run_detection(&empty, &default_params(), &CancelToken::new());
    assert!(matches!(result, Err(SlicerError::NoImageLoaded)));
    assert!(messages.is_empty());
}

#[test]
fn small_regions_are_discarded() {
    let mut params = default_params();
    params.set(MIN_AREA, 10_000.0).unwrap();
    let (result, _) = run_detection(&two_photo_sheet(), &params, &CancelToken::new());
    let slices = result.unwrap().slices;
    assert_eq!(slices.len(), 1);
    assert_near(slices[0].boundary().corners()[0], 220.0, 150.0, 1e-6);
}

#[test]
fn border_margin_grows_boundaries() {
    let mut params = default_params();
    params.set(BORDER_MARGIN, 4.0).unwrap();
    let (result, _) = run_detection(&two_photo_sheet(), &params, &CancelToken::new());
    let slices = result.unwrap().slices;
    let c = slices[0].boundary().corners();
    assert_near(c[0], 26.0, 36.0, 1e-6);
    assert_near(c[2], 154.0, 124.0, 1e-6);
}

#[test]
fn margin_past_the_centre_drops_the_boundary() {
    let mut sheet = blank_sheet(200, 200);
    paint_photo(&mut sheet, 50, 50, 80, 80);
    let sheet = DynamicImage::ImageRgb8(sheet);

    let mut params = default_params();
    params.set(BORDER_MARGIN, -30.0).unwrap();
    let (result, _) = run_detection(&sheet, &params, &CancelToken::new());
    let slices = result.unwrap().slices;
    assert_eq!(slices.len(), 1);
    let c = slices[0].boundary().corners();
    assert_near(c[0], 80.0, 80.0, 1e-6);
    assert_near(c[2], 100.0, 100.0, 1e-6);

    params.set(BORDER_MARGIN, -45.0).unwrap();
    let (result, messages) = run_detection(&sheet, &params, &CancelToken::new());
    assert!(result.unwrap().slices.is_empty());
    assert_eq!(messages[2], "Fitted 0 boundaries");
}

#[test]
fn creased_photo_is_merged_back_together() {
    let mut sheet = blank_sheet(300, 200);
    // Two halves of one 200x120 photograph separated by a 2px crease
    paint_photo(&mut sheet, 40, 30, 200, 59);
    paint_photo(&mut sheet, 40, 91, 200, 59);
    let sheet = DynamicImage::ImageRgb8(sheet);

    let (result, messages) = run_detection(&sheet, &default_params(), &CancelToken::new());
    let slices = result.unwrap().slices;
    assert_eq!(messages[1], "Found 2 candidate regions");
    assert_eq!(slices.len(), 1);
    let c = slices[0].boundary().corners();
    assert_near(c[0], 40.0, 30.0, 1e-6);
    assert_near(c[2], 240.0, 150.0, 1e-6);

    let mut strict = default_params();
    strict.set(MERGE_TOLERANCE, 0.0).unwrap();
    let (result, _) = run_detection(&sheet, &strict, &CancelToken::new());
    assert_eq!(result.unwrap().slices.len(), 2);
}

#[test]
fn rotated_photo_gets_an_oriented_boundary() {
    let mut sheet = blank_sheet(400, 300);
    paint_rotated_photo(&mut sheet, 200.0, 150.0, 160.0, 100.0, 10.0);
    let sheet = DynamicImage::ImageRgb8(sheet);

    let (result, _) = run_detection(&sheet, &default_params(), &CancelToken::new());
    let slices = result.unwrap().slices;
    assert_eq!(slices.len(), 1);

    let boundary = slices[0].boundary();
    let c = boundary.corners();
    let angle = (c[1].y - c[0].y).atan2(c[1].x - c[0].x).to_degrees();
    assert!((angle - 10.0).abs() < 1.5, "angle {}", angle);

    let [top, right, _, _] = boundary.edge_lengths();
    assert!((top - 160.0).abs() < 4.0, "top {}", top);
    assert!((right - 100.0).abs() < 4.0, "right {}", right);
    assert_near(boundary.centroid(), 200.0, 150.0, 2.0);
}
