use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::{DynamicImage, GrayImage};
use tracing::{debug, trace};

use crate::error::{Result, SlicerError};
use crate::models::{PhotoSlice, Region};
use crate::geometry::{Point, Quadrilateral};

/// Receives human-readable progress messages from a running detection.
///
/// Called synchronously on the detecting thread; implementations must return
/// quickly and must not start another detection.
pub trait ProgressSink {
    fn report(&mut self, message: &str);
}

impl<F: FnMut(&str)> ProgressSink for F {
    fn report(&mut self, message: &str) {
        self(message)
    }
}

/// Cooperative cancellation flag shared between a shell and a running detection
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    requested: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Clear a previous request so the token can guard the next run
    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    /// Fail with `Cancelled` if cancellation was requested
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_requested() {
            trace!("Cancellation honoured at checkpoint");
            Err(SlicerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A fitted boundary together with the hull it was fitted to
#[derive(Debug, Clone)]
pub struct FittedBoundary {
    pub hull: Vec<Point>,
    pub boundary: Quadrilateral,
}

/// Working state threaded through the detection steps
pub struct PipelineData<'a> {
    /// The source raster, read-only
    pub source: &'a DynamicImage,

    /// Binary foreground mask (255 = photograph)
    pub mask: GrayImage,

    /// Connected components that passed the area filter
    pub regions: Vec<Region>,

    /// Boundaries fitted to regions, before and after merging
    pub boundaries: Vec<FittedBoundary>,

    /// Final ordered slices
    pub slices: Vec<PhotoSlice>,
}

impl<'a> PipelineData<'a> {
    pub fn from_image(source: &'a DynamicImage) -> Self {
        Self {
            source,
            mask: GrayImage::new(0, 0),
            regions: Vec::new(),
            boundaries: Vec::new(),
            slices: Vec::new(),
        }
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Context available to all pipeline steps
pub struct PipelineContext<'c> {
    pub cancel: &'c CancelToken,
    pub debug: Option<&'c DebugConfig>,
}

/// Trait that all detection steps implement
pub trait PipelineStep: Send + Sync {
    /// Advance the working state by one stage
    fn process(&self, data: &mut PipelineData<'_>, context: &PipelineContext<'_>) -> Result<()>;

    /// Human-readable name for this step
    fn name(&self) -> &str;

    /// Message for the progress sink once the step has finished
    fn progress(&self, _data: &PipelineData<'_>) -> Option<String> {
        None
    }

    /// Intermediate raster written in debug mode
    fn debug_image(&self, _data: &PipelineData<'_>) -> Option<DynamicImage> {
        None
    }
}

/// Linear sequence of detection steps
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
    debug: Option<DebugConfig>,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            debug: None,
        }
    }

    /// Write each step's intermediate raster into `config.output_dir`
    pub fn with_debug(mut self, config: Option<DebugConfig>) -> Self {
        self.debug = config;
        self
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Run every step in order.
    ///
    /// The cancel token is checked before each step after the first. Progress
    /// is reported after a step completes and never once an error is decided.
    pub fn run<'a>(
        &self,
        mut data: PipelineData<'a>,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<PipelineData<'a>> {
        let context = PipelineContext {
            cancel,
            debug: self.debug.as_ref(),
        };

        for (step_idx, step) in self.steps.iter().enumerate() {
            if step_idx > 0 {
                cancel.checkpoint()?;
            }

            debug!(step = step.name(), "Running step");
            step.process(&mut data, &context)?;

            if let Some(debug_config) = &self.debug {
                if let Some(image) = step.debug_image(&data) {
                    let file_name = format!(
                        "{:02}_{}.png",
                        step_idx + 1,
                        step.name().to_lowercase().replace(' ', "_")
                    );
                    let path = debug_config.output_dir.join(&file_name);
                    image.save(&path).map_err(|e| match e {
                        image::ImageError::IoError(io) => SlicerError::Io(io),
                        other => SlicerError::Io(std::io::Error::other(other)),
                    })?;
                    debug!(path = %path.display(), "Debug image saved");
                }
            }

            if let Some(message) = step.progress(&data) {
                progress.report(&message);
            }
        }

        Ok(data)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl PipelineStep for Named {
        fn process(&self, _data: &mut PipelineData<'_>, context: &PipelineContext<'_>) -> Result<()> {
            if self.0 == "trip" {
                context.cancel.request();
            }
            Ok(())
        }

        fn name(&self) -> &str {
            self.0
        }

        fn progress(&self, _data: &PipelineData<'_>) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn progress_is_reported_in_step_order() {
        let image = DynamicImage::new_luma8(4, 4);
        let pipeline = Pipeline::new()
            .add_step(Box::new(Named("one")))
            .add_step(Box::new(Named("two")))
            .add_step(Box::new(Named("three")));

        let mut seen = Vec::new();
        let mut sink = |m: &str| seen.push(m.to_string());
        pipeline
            .run(PipelineData::from_image(&image), &mut sink, &CancelToken::new())
            .unwrap();
        assert_eq!(seen, vec!["one", "two", "three"]);
    }

    #[test]
    fn cancellation_stops_before_next_step() {
        let image = DynamicImage::new_luma8(4, 4);
        let pipeline = Pipeline::new()
            .add_step(Box::new(Named("trip")))
            .add_step(Box::new(Named("never")));

        let mut seen = Vec::new();
        let mut sink = |m: &str| seen.push(m.to_string());
        let result = pipeline.run(PipelineData::from_image(&image), &mut sink, &CancelToken::new());
        assert!(matches!(result, Err(SlicerError::Cancelled)));
        assert_eq!(seen, vec!["trip"]);
    }

    #[test]
    fn token_reset_clears_request() {
        let token = CancelToken::new();
        let shared = token.clone();
        shared.request();
        assert!(token.is_requested());
        token.reset();
        assert!(token.checkpoint().is_ok());
    }
}
