//! Job-owned output artifact.

use std::path::{Path, PathBuf};

use crate::error::CleanupError;

/// The on-disk output of a job.
///
/// Removed by [`Artifact::cleanup`]; if the owner is dropped first (the job
/// future was cancelled), the file is removed on drop instead.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    removed: bool,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the artifact. A missing file counts as deleted.
    pub async fn cleanup(&mut self) -> Result<(), CleanupError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(CleanupError {
                    path: self.path.clone(),
                    source,
                })
            }
        }
        self.removed = true;
        Ok(())
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
