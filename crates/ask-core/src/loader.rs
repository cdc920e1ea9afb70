//! File loading: walk the root, keep files matching the include globs

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::{AskError, Result};

/// A source file read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFile {
    /// Path relative to the indexed root
    pub relative_path: String,
    /// Raw UTF-8 content
    pub content: String,
}

/// Compile glob patterns into a single matcher.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| AskError::Config(format!("invalid glob {:?}: {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| AskError::Config(e.to_string()))
}

/// Load every file under `root` that matches `include` and none of `exclude`.
///
/// Hidden entries and `.gitignore`d paths are skipped. Files larger than
/// `max_file_size` bytes, unreadable files and non-UTF-8 files are skipped
/// with a log line. Only an unreadable root is an error.
pub fn load_files(
    root: &Path,
    include: &[String],
    exclude: &[String],
    max_file_size: u64,
) -> Result<Vec<LoadedFile>> {
    if let Err(source) = std::fs::read_dir(root) {
        return Err(AskError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        });
    }

    let include = build_globset(include)?;
    let exclude = build_globset(exclude)?;

    let walker = WalkBuilder::new(root)
        .hidden(true) // Skip hidden files
        .git_ignore(true) // Respect .gitignore
        .git_global(true)
        .git_exclude(true)
        .build();

    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        let rel_path = path.strip_prefix(root).unwrap_or(path);

        if !include.is_match(rel_path) || exclude.is_match(rel_path) {
            continue;
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if size > max_file_size {
            tracing::info!("Skipping large file {} ({} bytes)", path.display(), size);
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        files.push(LoadedFile {
            relative_path: rel_path.to_string_lossy().to_string(),
            content,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    tracing::info!("Loaded {} files from {}", files.len(), root.display());
    Ok(files)
}
