//! Static dependency extraction.
//!
//! Given a content-bearing file, returns the set of other files it depends
//! on, one level deep, resolved to absolute paths: the declared layout,
//! every include directive target, and the directory's shared data file if
//! one exists.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::{fs, io};

use regex::Regex;

use crate::page::include_targets;
use crate::paths::normalize;

/// Directory-level shared data file; a dependency of every page in its
/// directory.
pub const DIR_DATA_FILE: &str = "thisDir.data.yaml";

/// Matches a `layout:` line inside a front matter block.
///
/// A lightweight scan is used instead of full YAML parsing so extraction
/// stays safe on files that are not valid pages yet.
static LAYOUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^layout:\s*(\S+)\s*$").unwrap());

/// Error extracting dependencies.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// File could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Extract the one-level static dependency set of a file.
///
/// Targets are resolved relative to the file's directory and lexically
/// normalized. The result preserves first-occurrence order and contains no
/// duplicates.
///
/// # Errors
///
/// Returns [`ExtractError::Io`] if the file cannot be read.
pub fn extract_dependencies(file_path: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let content = fs::read_to_string(file_path).map_err(|source| ExtractError::Io {
        path: file_path.to_path_buf(),
        source,
    })?;

    let dir = file_path.parent().unwrap_or_else(|| Path::new(""));
    let mut dependencies = Vec::new();
    let mut push = |target: &str| {
        let resolved = normalize(&dir.join(target));
        if !dependencies.contains(&resolved) {
            dependencies.push(resolved);
        }
    };

    if let Some(front_matter) = front_matter_block(&content)
        && let Some(caps) = LAYOUT_RE.captures(front_matter)
        && let Some(target) = caps.get(1)
    {
        push(target.as_str());
    }

    for target in include_targets(&content) {
        push(target);
    }

    let dir_data = dir.join(DIR_DATA_FILE);
    if dir_data.exists() {
        let resolved = normalize(&dir_data);
        if !dependencies.contains(&resolved) {
            dependencies.push(resolved);
        }
    }

    Ok(dependencies)
}

/// The raw front matter block of a source, if it has one.
fn front_matter_block(content: &str) -> Option<&str> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;
    rest.find("\n---").map(|end| &rest[..=end])
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_extracts_layout_and_includes() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(docs.join("sub")).unwrap();
        fs::write(
            docs.join("sub/about.page.md"),
            "---\nlayout: ../_layouts/base.page.html\n---\n{{ include ./notice.md }}\n",
        )
        .unwrap();

        let deps = extract_dependencies(&docs.join("sub/about.page.md")).unwrap();

        assert_eq!(
            deps,
            vec![
                docs.join("_layouts/base.page.html"),
                docs.join("sub/notice.md"),
            ]
        );
    }

    #[test]
    fn test_includes_dir_data_file_when_present() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DIR_DATA_FILE), "team: docs\n").unwrap();
        fs::write(dir.path().join("index.page.md"), "# Home\n").unwrap();

        let deps = extract_dependencies(&dir.path().join("index.page.md")).unwrap();

        assert_eq!(deps, vec![dir.path().join(DIR_DATA_FILE)]);
    }

    #[test]
    fn test_no_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("plain.page.md"), "# Plain\n").unwrap();

        let deps = extract_dependencies(&dir.path().join("plain.page.md")).unwrap();

        assert!(deps.is_empty());
    }

    #[test]
    fn test_duplicate_targets_collapse() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("page.page.md"),
            "{{ include ./a.md }}\n{{ include ./a.md }}\n",
        )
        .unwrap();

        let deps = extract_dependencies(&dir.path().join("page.page.md")).unwrap();

        assert_eq!(deps, vec![dir.path().join("a.md")]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_dependencies(&dir.path().join("gone.page.md"));
        assert!(matches!(result, Err(ExtractError::Io { .. })));
    }

    #[test]
    fn test_safe_on_non_page_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.md"), "no directives here\n").unwrap();

        let deps = extract_dependencies(&dir.path().join("notes.md")).unwrap();

        assert!(deps.is_empty());
    }
}
