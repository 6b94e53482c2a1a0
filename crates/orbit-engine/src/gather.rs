//! Page source enumeration.

use std::fs;
use std::path::{Path, PathBuf};

use orbit_source::{is_page_file, to_output_relative, url_level};

use crate::error::EngineError;

/// Collect every page file under `docs_dir`, recursively.
///
/// Directories starting with `.` or `_` are skipped (layouts and partials
/// live there; they are dependencies, not pages). The result is ordered
/// parents-first: shallower URLs come before deeper ones, so folding the
/// pages into the tree in order never orphans a child.
///
/// # Errors
///
/// Returns [`EngineError::Io`] if a directory cannot be read.
pub fn gather_files(docs_dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let mut files = Vec::new();
    visit(docs_dir, &mut files)?;

    files.sort_by_cached_key(|path| {
        let relative = path.strip_prefix(docs_dir).unwrap_or(path);
        let output = to_output_relative(relative);
        (url_level(&output), output)
    });
    Ok(files)
}

fn visit(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), EngineError> {
    let entries = fs::read_dir(dir).map_err(|source| EngineError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| EngineError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if path.is_dir() {
            if name.starts_with('.') || name.starts_with('_') || name == "node_modules" {
                continue;
            }
            visit(&path, files)?;
        } else if is_page_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}
