pub mod preprocessing;
pub mod contours;
pub mod fitting;
pub mod steps;

use std::path::PathBuf;

use image::DynamicImage;
use tracing::{info, instrument};

use crate::error::{Result, SlicerError};
use crate::models::PhotoSlice;
use crate::params::{self, ParameterSet};
use crate::pipeline::{CancelToken, DebugConfig, Pipeline, PipelineData, ProgressSink};
use steps::*;

/// Outcome of a successful detection run
#[derive(Debug, Clone)]
pub struct Detection {
    /// Unlocked slices numbered in reading order
    pub slices: Vec<PhotoSlice>,
    /// Binarized view of the source with the detected boundaries outlined
    pub diagnostic: DynamicImage,
}

/// Finds photographs on a scanned sheet.
///
/// The engine keeps no state between runs: identical inputs always give
/// identical slices. One `detect` call should be in flight at a time.
#[derive(Debug, Clone, Default)]
pub struct DetectionEngine {
    debug: Option<DebugConfig>,
}

impl DetectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable debug mode with output directory.
    /// The directory must be empty or non-existent.
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(SlicerError::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("debug directory is not empty: {}", output_dir.display()),
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Build the detection pipeline from the current parameter values
    pub fn build_pipeline(&self, params: &ParameterSet) -> Result<Pipeline> {
        let threshold = params.value(params::THRESHOLD)?.round().clamp(0.0, 255.0) as u8;
        let sigma = params.value(params::SMOOTHING)? as f32;
        let min_area = params.value(params::MIN_AREA)?.max(0.0).round() as u64;
        let margin = params.value(params::BORDER_MARGIN)?;
        let tolerance = params.value(params::MERGE_TOLERANCE)?;

        Ok(Pipeline::new()
            .with_debug(self.debug.clone())
            .add_step(Box::new(BinarizeStep { threshold, sigma }))
            .add_step(Box::new(SegmentStep { min_area }))
            .add_step(Box::new(FitStep { margin }))
            .add_step(Box::new(MergeStep { tolerance, margin }))
            .add_step(Box::new(OrderStep)))
    }

    /// Run binarize → segment → fit → merge → order on `image`.
    ///
    /// Fails with `NoImageLoaded` for an empty raster and with `Cancelled` when
    /// `cancel` is requested before one of the checkpoints. Finding nothing is
    /// a successful, empty result.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(
        &self,
        image: &DynamicImage,
        params: &ParameterSet,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<Detection> {
        if image.width() == 0 || image.height() == 0 {
            return Err(SlicerError::NoImageLoaded);
        }

        let pipeline = self.build_pipeline(params)?;
        let data = pipeline.run(PipelineData::from_image(image), progress, cancel)?;

        let diagnostic = DynamicImage::ImageRgb8(preprocessing::render_diagnostic(
            &data.mask,
            data.slices.iter().map(|s| s.boundary()),
        ));
        info!(slices = data.slices.len(), "Detection finished");

        Ok(Detection {
            slices: data.slices,
            diagnostic,
        })
    }
}
