use std::collections::{BTreeMap, HashMap};

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::trace;

use crate::error::Result;
use crate::geometry::Point;
use crate::models::Region;
use crate::pipeline::CancelToken;

/// Per-label accumulator filled during a single raster scan
struct Accumulator {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    count: u64,
    /// (y, leftmost x, rightmost x), rows arrive in increasing y
    rows: Vec<(u32, u32, u32)>,
}

impl Accumulator {
    fn new(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            count: 0,
            rows: Vec::new(),
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.count += 1;
        match self.rows.last_mut() {
            Some((row, lo, hi)) if *row == y => {
                *lo = (*lo).min(x);
                *hi = (*hi).max(x);
            }
            _ => self.rows.push((y, x, x)),
        }
    }

    fn into_region(self, label: u32) -> Region {
        // Pixel (x, y) spans [x, x+1) x [y, y+1); keep the outer corners of each row
        let mut outline = Vec::with_capacity(self.rows.len() * 4);
        for (y, lo, hi) in self.rows {
            let (top, bottom) = (y as f64, y as f64 + 1.0);
            let (left, right) = (lo as f64, hi as f64 + 1.0);
            outline.push(Point::new(left, top));
            outline.push(Point::new(left, bottom));
            outline.push(Point::new(right, top));
            outline.push(Point::new(right, bottom));
        }

        Region {
            label,
            min_x: self.min_x,
            min_y: self.min_y,
            max_x: self.max_x,
            max_y: self.max_y,
            pixel_count: self.count,
            outline,
        }
    }
}

/// Find 8-connected foreground regions of at least `min_area` pixels.
///
/// Regions come back in label order. The cancel token is checked before each
/// component is finalised.
pub fn find_regions(mask: &GrayImage, min_area: u64, cancel: &CancelToken) -> Result<Vec<Region>> {
    let labeled = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut accumulators: HashMap<u32, Accumulator> = HashMap::new();
    for (x, y, label) in labeled.enumerate_pixels() {
        let label_val = label[0];
        if label_val == 0 {
            continue; // Skip background
        }
        accumulators
            .entry(label_val)
            .or_insert_with(|| Accumulator::new(x, y))
            .add(x, y);
    }

    let sorted: BTreeMap<u32, Accumulator> = accumulators.into_iter().collect();

    let mut regions = Vec::new();
    for (label, acc) in sorted {
        cancel.checkpoint()?;
        if acc.count < min_area {
            trace!(label, pixels = acc.count, "Discarding small component");
            continue;
        }
        regions.push(acc.into_region(label));
    }

    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SlicerError;

    fn mask_with_blocks(blocks: &[(u32, u32, u32, u32)]) -> GrayImage {
        let mut mask = GrayImage::new(100, 100);
        for &(x0, y0, w, h) in blocks {
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
        mask
    }

    #[test]
    fn finds_separate_blocks_and_drops_specks() {
        let mask = mask_with_blocks(&[(5, 5, 20, 10), (50, 60, 30, 30), (90, 5, 2, 2)]);
        let regions = find_regions(&mask, 50, &CancelToken::new()).unwrap();

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].area(), 200);
        assert_eq!((regions[0].width(), regions[0].height()), (20, 10));
        assert_eq!(regions[1].area(), 900);
        assert_eq!(regions[1].min_x, 50);
    }

    #[test]
    fn outline_lies_on_pixel_edges() {
        let mask = mask_with_blocks(&[(10, 20, 5, 3)]);
        let regions = find_regions(&mask, 1, &CancelToken::new()).unwrap();
        let hull = regions[0].hull();
        let xs: Vec<f64> = hull.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = hull.iter().map(|p| p.y).collect();
        assert_eq!(xs.iter().cloned().fold(f64::MAX, f64::min), 10.0);
        assert_eq!(xs.iter().cloned().fold(f64::MIN, f64::max), 15.0);
        assert_eq!(ys.iter().cloned().fold(f64::MAX, f64::min), 20.0);
        assert_eq!(ys.iter().cloned().fold(f64::MIN, f64::max), 23.0);
    }

    #[test]
    fn cancelled_token_aborts_segmentation() {
        let mask = mask_with_blocks(&[(5, 5, 20, 10)]);
        let cancel = CancelToken::new();
        cancel.request();
        assert!(matches!(
            find_regions(&mask, 1, &cancel),
            Err(SlicerError::Cancelled)
        ));
    }

    #[test]
    fn empty_mask_has_no_regions() {
        let mask = GrayImage::new(10, 10);
        assert!(find_regions(&mask, 0, &CancelToken::new()).unwrap().is_empty());
    }
}
