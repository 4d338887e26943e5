use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use tracing::{info, instrument};

use crate::detection::DetectionEngine;
use crate::error::{Result, SlicerError};
use crate::extraction::{Extractor, SaveReport};
use crate::geometry::{Point, Quadrilateral};
use crate::models::{PhotoSlice, SliceList};
use crate::params::ParameterSet;
use crate::pipeline::{CancelToken, ProgressSink};

/// Corners of the box added by `add_manual_box`
pub const MANUAL_BOX: [Point; 4] = [
    Point::new(10.0, 10.0),
    Point::new(200.0, 10.0),
    Point::new(200.0, 200.0),
    Point::new(10.0, 200.0),
];

struct LoadedImage {
    path: PathBuf,
    image: DynamicImage,
}

/// State a shell drives: parameters, the loaded sheet and its slices
pub struct Session {
    pub params: ParameterSet,
    engine: DetectionEngine,
    extractor: Extractor,
    loaded: Option<LoadedImage>,
    slices: SliceList,
    diagnostic: Option<DynamicImage>,
    cancel: CancelToken,
}

impl Session {
    pub fn new(params: ParameterSet, engine: DetectionEngine) -> Self {
        Self {
            params,
            engine,
            extractor: Extractor::default(),
            loaded: None,
            slices: SliceList::new(),
            diagnostic: None,
            cancel: CancelToken::new(),
        }
    }

    /// Swap the detection engine, e.g. to point debug output elsewhere
    pub fn set_engine(&mut self, engine: DetectionEngine) {
        self.engine = engine;
    }

    /// Session with the stock detection parameters
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(ParameterSet::detection()?, DetectionEngine::new()))
    }

    /// Decode a sheet from disk; the previous slices are discarded
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let image = ImageReader::open(path)?
            .decode()
            .map_err(|e| SlicerError::Decode(format!("{}: {}", path.display(), e)))?;
        info!(width = image.width(), height = image.height(), "Image loaded");
        self.set_image(path.to_path_buf(), image);
        Ok(())
    }

    /// Install an already decoded sheet
    pub fn set_image(&mut self, path: PathBuf, image: DynamicImage) {
        self.loaded = Some(LoadedImage { path, image });
        self.slices = SliceList::new();
        self.diagnostic = None;
    }

    pub fn image_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        self.loaded.as_ref().map(|l| &l.image)
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.loaded.as_ref().map(|l| l.path.as_path())
    }

    /// Token a shell can clone and trigger from another thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn abort(&self) {
        self.cancel.request();
    }

    /// Run detection on the loaded sheet.
    ///
    /// On success the slice list and diagnostic are replaced; on any error,
    /// including cancellation, they are left as they were.
    pub fn autodetect(&mut self, progress: &mut dyn ProgressSink) -> Result<&SliceList> {
        let loaded = self.loaded.as_ref().ok_or(SlicerError::NoImageLoaded)?;
        self.cancel.reset();
        let detection = self
            .engine
            .detect(&loaded.image, &self.params, progress, &self.cancel)?;
        self.slices.replace(detection.slices);
        self.diagnostic = Some(detection.diagnostic);
        Ok(&self.slices)
    }

    pub fn slices(&self) -> &SliceList {
        &self.slices
    }

    pub fn slices_mut(&mut self) -> &mut SliceList {
        &mut self.slices
    }

    pub fn diagnostic(&self) -> Option<&DynamicImage> {
        self.diagnostic.as_ref()
    }

    pub fn reset_parameters(&mut self) {
        self.params.reset_all();
    }

    /// Add the default operator box, already locked
    pub fn add_manual_box(&mut self) -> Result<&PhotoSlice> {
        let boundary = Quadrilateral::new(MANUAL_BOX)?;
        Ok(self.slices.insert_manual(boundary))
    }

    /// Save every locked slice next to the source image
    pub fn save_locked(&self) -> Result<SaveReport> {
        let loaded = self.loaded.as_ref().ok_or(SlicerError::NoImageLoaded)?;
        Ok(self
            .extractor
            .save_locked(&loaded.image, self.slices.iter(), &loaded.path))
    }
}
