//! Client history files, one per organization, database and branch

use std::path::{Path, PathBuf};

use super::target::Target;
use crate::error::{Result, ShellError};

/// Compute the history file for `target` under `history_dir`, creating the
/// directory when it is missing. The file itself is left to the client.
///
/// Path separators in the names are replaced, so the file always lands
/// directly inside `history_dir`.
///
/// # Errors
///
/// Returns `History` if the directory cannot be created.
pub fn history_file_path(history_dir: &Path, target: &Target) -> Result<PathBuf> {
    if !history_dir.is_dir() {
        create_history_dir(history_dir).map_err(|e| ShellError::History {
            path: history_dir.display().to_string(),
            reason: e.to_string(),
        })?;
    }

    Ok(history_dir.join(format!(
        "{}.{}.{}",
        file_component(&target.organization),
        file_component(&target.database),
        file_component(&target.branch)
    )))
}

fn file_component(name: &str) -> String {
    name.replace(['/', '\\', '\0'], "_")
}

#[cfg(unix)]
fn create_history_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
}

#[cfg(not(unix))]
fn create_history_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}
