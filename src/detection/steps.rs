use image::DynamicImage;

use crate::detection::{contours, fitting, preprocessing};
use crate::error::Result;
use crate::geometry::reading_order;
use crate::models::PhotoSlice;
use crate::pipeline::{PipelineContext, PipelineData, PipelineStep};

/// Grayscale, optional blur, then threshold into a foreground mask
pub struct BinarizeStep {
    pub threshold: u8,
    pub sigma: f32,
}

impl PipelineStep for BinarizeStep {
    fn process(&self, data: &mut PipelineData<'_>, _context: &PipelineContext<'_>) -> Result<()> {
        let gray = preprocessing::to_grayscale(data.source);
        let smoothed = preprocessing::apply_blur(gray, self.sigma);
        data.mask = preprocessing::binarize(&smoothed, self.threshold);
        Ok(())
    }

    fn name(&self) -> &str {
        "Binarize"
    }

    fn progress(&self, data: &PipelineData<'_>) -> Option<String> {
        Some(format!(
            "Binarized at threshold {}: {} foreground pixels",
            self.threshold,
            preprocessing::count_foreground(&data.mask)
        ))
    }

    fn debug_image(&self, data: &PipelineData<'_>) -> Option<DynamicImage> {
        Some(DynamicImage::ImageLuma8(data.mask.clone()))
    }
}

/// Label connected foreground regions and drop the small ones
pub struct SegmentStep {
    pub min_area: u64,
}

impl PipelineStep for SegmentStep {
    fn process(&self, data: &mut PipelineData<'_>, context: &PipelineContext<'_>) -> Result<()> {
        data.regions = contours::find_regions(&data.mask, self.min_area, context.cancel)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "Segment"
    }

    fn progress(&self, data: &PipelineData<'_>) -> Option<String> {
        Some(format!("Found {} candidate regions", data.regions.len()))
    }
}

/// Fit an oriented rectangle around each region
pub struct FitStep {
    pub margin: f64,
}

impl PipelineStep for FitStep {
    fn process(&self, data: &mut PipelineData<'_>, _context: &PipelineContext<'_>) -> Result<()> {
        data.boundaries = fitting::fit_regions(&data.regions, self.margin);
        Ok(())
    }

    fn name(&self) -> &str {
        "Fit boundaries"
    }

    fn progress(&self, data: &PipelineData<'_>) -> Option<String> {
        Some(format!("Fitted {} boundaries", data.boundaries.len()))
    }
}

/// Fuse boundaries that nearly touch
pub struct MergeStep {
    pub tolerance: f64,
    pub margin: f64,
}

impl PipelineStep for MergeStep {
    fn process(&self, data: &mut PipelineData<'_>, _context: &PipelineContext<'_>) -> Result<()> {
        let fitted = std::mem::take(&mut data.boundaries);
        data.boundaries = fitting::merge_close(fitted, self.tolerance, self.margin);
        Ok(())
    }

    fn name(&self) -> &str {
        "Merge"
    }

    fn progress(&self, data: &PipelineData<'_>) -> Option<String> {
        Some(format!("{} photographs after merging", data.boundaries.len()))
    }
}

/// Number boundaries top-to-bottom, then left-to-right, and wrap them as slices
pub struct OrderStep;

impl PipelineStep for OrderStep {
    fn process(&self, data: &mut PipelineData<'_>, _context: &PipelineContext<'_>) -> Result<()> {
        let boundaries = reading_order(data.boundaries.iter().map(|f| f.boundary).collect());
        data.slices = boundaries
            .into_iter()
            .enumerate()
            .map(|(order, boundary)| PhotoSlice::new(boundary, order))
            .collect();
        Ok(())
    }

    fn name(&self) -> &str {
        "Order"
    }

    fn debug_image(&self, data: &PipelineData<'_>) -> Option<DynamicImage> {
        let overlay =
            preprocessing::render_diagnostic(&data.mask, data.slices.iter().map(|s| s.boundary()));
        Some(DynamicImage::ImageRgb8(overlay))
    }
}
