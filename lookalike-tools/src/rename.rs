use crate::{sorted_entries, ToolError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rename every regular file in `dir` to `1.<ext>`, `2.<ext>`, ... in natural
/// order and return the `(old, new)` pairs.
///
/// Files are first moved to hidden temporaries and only then to their final
/// names, so a file already called `2.jpg` never gets clobbered by the one
/// that should take its place.
pub fn rename_sequentially(dir: &Path, extension: &str) -> Result<Vec<(PathBuf, PathBuf)>, ToolError> {
    let extension = extension.trim_start_matches('.');
    let files = sorted_entries(dir, false)?;
    let sources: HashSet<&str> = files.iter().map(String::as_str).collect();

    let plan: Vec<(PathBuf, PathBuf)> = files
        .iter()
        .enumerate()
        .map(|(i, name)| (dir.join(name), dir.join(format!("{}.{extension}", i + 1))))
        .collect();

    for (_, target) in &plan {
        let taken_by_other = target.exists()
            && target
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(true, |n| !sources.contains(n));
        if taken_by_other {
            return Err(ToolError::Collision {
                path: target.clone(),
            });
        }
    }

    let pid = std::process::id();
    let mut staged = Vec::with_capacity(plan.len());
    for (i, (source, _)) in plan.iter().enumerate() {
        let tmp = dir.join(format!(".rename-{pid}-{i}.tmp"));
        std::fs::rename(source, &tmp).map_err(|e| ToolError::io(source, e))?;
        debug!(target: "tools.rename", from = %source.display(), to = %tmp.display(), "staged");
        staged.push(tmp);
    }

    for (tmp, (source, target)) in staged.iter().zip(&plan) {
        std::fs::rename(tmp, target).map_err(|e| ToolError::io(target, e))?;
        info!(target: "tools.rename", from = %source.display(), to = %target.display(), "renamed");
    }

    Ok(plan)
}
