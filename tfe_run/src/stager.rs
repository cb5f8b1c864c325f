//! Stages the one-off variables file that rides along with an upload.
//!
//! The API only offers persistent workspace variables, which would leak into every later run. Writing a
//! `*.auto.tfvars` file into the uploaded directory is the only way to set variables for a single run.

use crate::error::RunError;
use polyfmt::println;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const OVERLAY_FILE_NAME: &str = "run.auto.tfvars";

/// A variables file that exists for as long as this value does. The file is removed on drop; removal is
/// best effort and a failure is only logged.
#[derive(Debug)]
pub struct VariablesOverlay {
    path: PathBuf,
}

impl VariablesOverlay {
    /// Writes `contents` to `<directory>/<working_directory>/run.auto.tfvars`. Returns `None` without touching
    /// the filesystem when there is nothing to write.
    pub fn stage(
        directory: &Path,
        working_directory: &str,
        contents: Option<&str>,
    ) -> Result<Option<Self>, RunError> {
        let contents = match contents {
            Some(contents) if !contents.is_empty() => contents,
            _ => return Ok(None),
        };

        let path = directory.join(working_directory).join(OVERLAY_FILE_NAME);

        println!("Creating variables file {}", path.display());

        fs::write(&path, contents).map_err(|source| RunError::Overlay {
            path: path.clone(),
            source,
        })?;

        Ok(Some(Self { path }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VariablesOverlay {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(_) => debug!(path = %self.path.display(), "removed variables file"),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "could not remove variables file; this might cause issues with later steps"
            ),
        }
    }
}
