use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{info, instrument, warn};

use crate::error::{Result, SlicerError};
use crate::geometry::Quadrilateral;
use crate::models::PhotoSlice;

/// Result of one save attempt
#[derive(Debug)]
pub struct SaveOutcome {
    pub order: usize,
    pub path: PathBuf,
    pub result: Result<()>,
}

/// Per-slice results of saving every locked slice
#[derive(Debug, Default)]
pub struct SaveReport {
    pub outcomes: Vec<SaveOutcome>,
}

impl SaveReport {
    pub fn saved_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SaveOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Warps locked slices out of the source raster into upright images
#[derive(Debug, Clone)]
pub struct Extractor {
    /// Colour used where the boundary reaches outside the source
    pub fill: Rgba<u8>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            fill: Rgba([255, 255, 255, 255]),
        }
    }
}

/// Largest output raster `extract` will allocate, in pixels
pub const MAX_OUTPUT_PIXELS: u64 = 1 << 28;

/// Output size: the mean of opposite edge lengths, rounded to whole pixels.
///
/// Fails for empty sizes and for sizes beyond `MAX_OUTPUT_PIXELS`.
pub fn output_size(boundary: &Quadrilateral) -> Result<(u32, u32)> {
    let [top, right, bottom, left] = boundary.edge_lengths();
    let width = ((top + bottom) / 2.0).round();
    let height = ((left + right) / 2.0).round();
    if !(width >= 1.0 && height >= 1.0) {
        return Err(SlicerError::InvalidGeometry(format!(
            "boundary rounds to an empty {}x{} image",
            width, height
        )));
    }
    if !(width * height <= MAX_OUTPUT_PIXELS as f64) {
        return Err(SlicerError::InvalidGeometry(format!(
            "boundary needs a {}x{} image, larger than {} pixels",
            width, height, MAX_OUTPUT_PIXELS
        )));
    }
    Ok((width as u32, height as u32))
}

/// `<stem>_<index>.<ext>` beside the source, index zero-padded to three digits
pub fn output_path(source: &Path, index: usize) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "slice".to_string());
    let extension = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    source.with_file_name(format!("{}_{:03}.{}", stem, index, extension))
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deskew the slice's boundary onto an upright rectangle
    #[instrument(skip_all, fields(order = slice.order()))]
    pub fn extract(&self, image: &DynamicImage, slice: &PhotoSlice) -> Result<DynamicImage> {
        let boundary = slice.boundary();
        let (out_w, out_h) = output_size(boundary)?;

        let c = boundary.corners();
        let src: [(f32, f32); 4] = [
            (c[0].x as f32, c[0].y as f32),
            (c[1].x as f32, c[1].y as f32),
            (c[2].x as f32, c[2].y as f32),
            (c[3].x as f32, c[3].y as f32),
        ];
        let dest: [(f32, f32); 4] = [
            (0.0, 0.0),                   // top-left
            (out_w as f32, 0.0),          // top-right
            (out_w as f32, out_h as f32), // bottom-right
            (0.0, out_h as f32),          // bottom-left
        ];

        let projection = Projection::from_control_points(src, dest).ok_or_else(|| {
            SlicerError::InvalidGeometry("no projective transform for boundary".to_string())
        })?;

        let rgba_input = image.to_rgba8();
        let mut output = RgbaImage::new(out_w, out_h);
        warp_into(&rgba_input, &projection, Interpolation::Bilinear, self.fill, &mut output);

        info!(out_w, out_h, "Slice extracted");

        let extracted = DynamicImage::ImageRgba8(output);
        if image.color().has_alpha() {
            Ok(extracted)
        } else {
            Ok(DynamicImage::ImageRgb8(extracted.to_rgb8()))
        }
    }

    /// Extract and write to `path`; the format follows the path's extension
    pub fn save(&self, image: &DynamicImage, slice: &PhotoSlice, path: &Path) -> Result<()> {
        let extracted = self.extract(image, slice)?;
        extracted.save(path).map_err(|e| match e {
            image::ImageError::IoError(io) => SlicerError::Io(io),
            other => SlicerError::Io(std::io::Error::other(other)),
        })?;
        info!(path = %path.display(), "Slice saved");
        Ok(())
    }

    /// Save every locked slice in display order.
    ///
    /// A failed write is recorded and the remaining slices are still attempted.
    pub fn save_locked<'s>(
        &self,
        image: &DynamicImage,
        slices: impl IntoIterator<Item = &'s PhotoSlice>,
        source_path: &Path,
    ) -> SaveReport {
        let mut locked: Vec<&PhotoSlice> = slices.into_iter().filter(|s| s.is_locked()).collect();
        locked.sort_by_key(|s| s.order());

        let mut report = SaveReport::default();
        for (index, slice) in locked.into_iter().enumerate() {
            let path = output_path(source_path, index);
            let result = self.save(image, slice, &path);
            if let Err(err) = &result {
                warn!(order = slice.order(), path = %path.display(), %err, "Failed to save slice");
            }
            report.outcomes.push(SaveOutcome {
                order: slice.order(),
                path,
                result,
            });
        }
        report
    }
}
