mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from photoslicer for tests
pub use photoslicer::{
    CancelToken, DetectionEngine, Extractor, ParameterSet, PhotoSlice, Point, Quadrilateral,
    Session, SlicerError,
};
