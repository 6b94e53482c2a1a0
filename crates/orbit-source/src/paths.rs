//! Source path to URL/output path conversion.
//!
//! A page file named `about.page.md` renders to `about/index.html` and is
//! served at `/about/`; `index.page.md` renders to `index.html` at `/`.
//! Path segments may carry a numeric ordering prefix (`10--guide`) which is
//! stripped from URLs and output paths but kept on disk for sorting.

use std::path::{Component, Path, PathBuf};

/// File name endings that mark a source file as a page.
pub const PAGE_ENDINGS: &[&str] = &[".page.md", ".page.html"];

/// Whether a path matches the page-file naming convention.
#[must_use]
pub fn is_page_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    PAGE_ENDINGS.iter().any(|ending| name.ends_with(ending))
}

/// Strip the page ending from a file name, if present.
///
/// Returns `None` for file names that are not page files.
#[must_use]
pub fn strip_page_ending(name: &str) -> Option<&str> {
    PAGE_ENDINGS
        .iter()
        .find_map(|ending| name.strip_suffix(ending))
}

/// Remove a numeric ordering prefix from a path segment.
///
/// `"10--guide"` becomes `"guide"`; segments without a prefix are unchanged.
#[must_use]
pub fn clean_order(segment: &str) -> &str {
    match segment.split_once("--") {
        Some((prefix, rest)) if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) => {
            rest
        }
        _ => segment,
    }
}

/// Convert a source-relative page path to its output-relative file path.
///
/// Examples:
/// - `"index.page.md"` -> `"index.html"`
/// - `"about.page.md"` -> `"about/index.html"`
/// - `"10--guide/20--setup.page.md"` -> `"guide/setup/index.html"`
#[must_use]
pub fn to_output_relative(source_relative: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let segments: Vec<&str> = source_relative
        .iter()
        .filter_map(|s| s.to_str())
        .collect();

    for segment in &segments[..segments.len().saturating_sub(1)] {
        out.push(clean_order(segment));
    }

    let file_name = segments.last().copied().unwrap_or_default();
    let name = clean_order(strip_page_ending(file_name).unwrap_or(file_name));

    if name == "index" {
        out.push("index.html");
    } else {
        out.push(name);
        out.push("index.html");
    }
    out
}

/// Convert a source-relative page path to its served URL.
///
/// Examples:
/// - `"index.page.md"` -> `"/"`
/// - `"about.page.md"` -> `"/about/"`
/// - `"guide/setup.page.md"` -> `"/guide/setup/"`
#[must_use]
pub fn to_url(source_relative: &Path) -> String {
    let output = to_output_relative(source_relative);
    let output = output.to_string_lossy();
    let trimmed = output
        .strip_suffix("index.html")
        .unwrap_or(output.as_ref());
    format!("/{trimmed}")
}

/// Nesting depth of an output-relative file path.
///
/// `"index.html"` is level 0, `"about/index.html"` is level 1.
#[must_use]
pub fn url_level(output_relative: &Path) -> usize {
    output_relative.iter().count().saturating_sub(1)
}

/// Lexically normalize a path, resolving `.` and `..` components.
///
/// Does not touch the filesystem; `..` at the root is dropped.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_is_page_file() {
        assert!(is_page_file(Path::new("docs/index.page.md")));
        assert!(is_page_file(Path::new("about.page.html")));
        assert!(!is_page_file(Path::new("notes.md")));
        assert!(!is_page_file(Path::new("thisDir.data.yaml")));
    }

    #[test]
    fn test_clean_order() {
        assert_eq!(clean_order("10--guide"), "guide");
        assert_eq!(clean_order("003--a"), "a");
        assert_eq!(clean_order("guide"), "guide");
        // only fully numeric prefixes count
        assert_eq!(clean_order("v1--guide"), "v1--guide");
        assert_eq!(clean_order("--guide"), "--guide");
    }

    #[test]
    fn test_to_output_relative_index() {
        assert_eq!(
            to_output_relative(Path::new("index.page.md")),
            PathBuf::from("index.html")
        );
    }

    #[test]
    fn test_to_output_relative_named_page() {
        assert_eq!(
            to_output_relative(Path::new("about.page.md")),
            PathBuf::from("about/index.html")
        );
    }

    #[test]
    fn test_to_output_relative_nested_with_order_prefixes() {
        assert_eq!(
            to_output_relative(Path::new("10--guide/20--setup.page.md")),
            PathBuf::from("guide/setup/index.html")
        );
        assert_eq!(
            to_output_relative(Path::new("guide/index.page.html")),
            PathBuf::from("guide/index.html")
        );
    }

    #[test]
    fn test_to_url() {
        assert_eq!(to_url(Path::new("index.page.md")), "/");
        assert_eq!(to_url(Path::new("about.page.md")), "/about/");
        assert_eq!(to_url(Path::new("guide/setup.page.md")), "/guide/setup/");
        assert_eq!(to_url(Path::new("10--guide/index.page.md")), "/guide/");
    }

    #[test]
    fn test_url_level() {
        assert_eq!(url_level(Path::new("index.html")), 0);
        assert_eq!(url_level(Path::new("about/index.html")), 1);
        assert_eq!(url_level(Path::new("guide/setup/index.html")), 2);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/docs/sub/../shared/./head.md")),
            PathBuf::from("/docs/shared/head.md")
        );
        assert_eq!(normalize(Path::new("a/./b")), PathBuf::from("a/b"));
    }
}
