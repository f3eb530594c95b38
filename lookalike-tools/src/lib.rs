//! Dataset chores that sit around the crawl.
//!
//! - [`inpaint`]: erase masked objects from source images before searching
//! - [`rename`]: renumber a folder of downloads to `1.ext..N.ext`
pub mod inpaint;
pub mod rename;

use lookalike_common::natord;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("filesystem error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image error at {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{} already exists and is not part of the rename", path.display())]
    Collision { path: PathBuf },
}

impl ToolError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ToolError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        ToolError::Image {
            path: path.into(),
            source,
        }
    }
}

/// Directory (`dirs == true`) or regular-file names under `dir`, naturally sorted.
pub(crate) fn sorted_entries(dir: &Path, dirs: bool) -> Result<Vec<String>, ToolError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| ToolError::io(dir, e))? {
        let entry = entry.map_err(|e| ToolError::io(dir, e))?;
        let path = entry.path();
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(target: "tools", path = %path.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let wanted = if dirs { meta.is_dir() } else { meta.is_file() };
        if !wanted {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    natord::sort_natural(&mut names, |s| s.as_str());
    Ok(names)
}
