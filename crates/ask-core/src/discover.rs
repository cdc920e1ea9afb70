//! Discovery module: Find .ask root by walking up the directory tree

use std::path::{Path, PathBuf};

use crate::{AskError, Result, ASK_DIR};

/// Find the .ask root directory by walking up from the given path.
///
/// Returns the path to the directory containing .ask (not the .ask folder itself).
pub fn find_ask_root(start: &Path) -> Result<PathBuf> {
    let mut current = start.canonicalize()?;

    loop {
        if ask_dir(&current).is_dir() {
            return Ok(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Err(AskError::NotInRepo),
        }
    }
}

/// Get the .ask directory path for a given root.
pub fn ask_dir(root: &Path) -> PathBuf {
    root.join(ASK_DIR)
}

/// Get the config file path.
pub fn config_path(root: &Path) -> PathBuf {
    ask_dir(root).join("config.json")
}
