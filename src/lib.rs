pub mod catalog;
pub mod detection;
pub mod error;
pub mod extraction;
pub mod geometry;
pub mod models;
pub mod params;
pub mod pipeline;
pub mod session;

pub use catalog::ImageCatalog;
pub use detection::{Detection, DetectionEngine};
pub use error::{Result, SlicerError};
pub use extraction::{Extractor, SaveOutcome, SaveReport};
pub use geometry::{Point, Quadrilateral};
pub use models::{PhotoSlice, Region, SliceList};
pub use params::{Parameter, ParameterSet};
pub use pipeline::{CancelToken, Pipeline, PipelineStep, ProgressSink};
pub use session::Session;
