//! The per-run working directory holding intermediate page images.
//!
//! Backed by [`tempfile::TempDir`], so the directory and everything in it is
//! removed when the [`WorkDir`] is dropped: on success, on any error
//! propagated with `?`, and when the run is cancelled and its future dropped.

use crate::error::OcrError;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

const PREFIX: &str = "ocr-";

pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a fresh, empty directory under `root`, or under the system
    /// temporary directory when `root` is None.
    pub fn create(root: Option<&Path>) -> Result<Self, OcrError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| OcrError::WorkingDirectory { source: e })?;

        debug!("Working directory: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, reporting failures instead of ignoring them
    /// as the destructor does.
    pub fn close(self) -> Result<(), OcrError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| OcrError::WorkingDirectory { source: e })?;
        debug!("Removed working directory {}", path.display());
        Ok(())
    }
}
