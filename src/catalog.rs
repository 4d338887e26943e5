use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SlicerError};

/// Sorted list of scanned sheets in one directory with a cursor
#[derive(Debug, Clone)]
pub struct ImageCatalog {
    images: Vec<PathBuf>,
    index: usize,
}

impl ImageCatalog {
    /// List the `.png` files of `dir`, sorted by name
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut images = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_png = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            if is_png && path.is_file() {
                images.push(path);
            }
        }
        Self::from_paths(dir, images)
    }

    /// Build a catalog from explicit paths; `origin` names the source in errors
    pub fn from_paths(origin: &Path, mut images: Vec<PathBuf>) -> Result<Self> {
        if images.is_empty() {
            return Err(SlicerError::NoImages(origin.to_path_buf()));
        }
        images.sort();
        debug!(count = images.len(), dir = %origin.display(), "Image catalog opened");
        Ok(Self { images, index: 0 })
    }

    pub fn current(&self) -> &Path {
        &self.images[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.images
    }

    /// Advance to the next image; at the end the cursor stays put
    pub fn next(&mut self) -> Result<&Path> {
        if self.index + 1 >= self.images.len() {
            return Err(SlicerError::AtLastImage);
        }
        self.index += 1;
        Ok(self.current())
    }

    /// Step back to the previous image; at the start the cursor stays put
    pub fn previous(&mut self) -> Result<&Path> {
        if self.index == 0 {
            return Err(SlicerError::AtFirstImage);
        }
        self.index -= 1;
        Ok(self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_signals_boundaries() {
        let mut catalog = ImageCatalog::from_paths(
            Path::new("scans"),
            vec![PathBuf::from("b.png"), PathBuf::from("a.png")],
        )
        .unwrap();

        assert_eq!(catalog.current(), Path::new("a.png"));
        assert!(matches!(catalog.previous(), Err(SlicerError::AtFirstImage)));
        assert_eq!(catalog.next().unwrap(), Path::new("b.png"));
        assert!(matches!(catalog.next(), Err(SlicerError::AtLastImage)));
        assert_eq!(catalog.index(), 1);
    }

    #[test]
    fn empty_catalog_is_an_error() {
        let result = ImageCatalog::from_paths(Path::new("scans"), Vec::new());
        assert!(matches!(result, Err(SlicerError::NoImages(_))));
    }
}
