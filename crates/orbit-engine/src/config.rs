//! Engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the persisted page tree file, written into the docs directory.
pub const TREE_DATA_FILE: &str = "pageTreeData.orbitGenerated.json";

/// Engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Directory holding page sources.
    pub docs_dir: PathBuf,
    /// Directory rendered output is written to. Defaults to a `_site`
    /// sibling of the docs directory.
    pub output_dir: PathBuf,
    /// Glob patterns (against absolute paths) the watcher never watches.
    pub ignore: Vec<String>,
    /// Watcher debounce quiet period.
    pub debounce: Duration,
}

impl EngineConfig {
    /// Configuration for a docs directory with default output location.
    pub fn new(docs_dir: impl Into<PathBuf>) -> Self {
        let docs_dir = docs_dir.into();
        let output_dir = docs_dir
            .parent()
            .unwrap_or(Path::new(""))
            .join("_site");
        Self {
            docs_dir,
            output_dir,
            ignore: vec![
                "**/node_modules/**".to_owned(),
                "**/.git/**".to_owned(),
            ],
            debounce: Duration::from_millis(100),
        }
    }

    /// Override the output directory.
    #[must_use]
    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Override the watcher ignore patterns.
    #[must_use]
    pub fn ignore(mut self, patterns: Vec<String>) -> Self {
        self.ignore = patterns;
        self
    }

    /// Absolute path of the persisted tree file.
    #[must_use]
    pub fn tree_data_file(&self) -> PathBuf {
        self.docs_dir.join(TREE_DATA_FILE)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_output_dir_is_site_sibling() {
        let config = EngineConfig::new("/work/docs");
        assert_eq!(config.output_dir, PathBuf::from("/work/_site"));
    }

    #[test]
    fn test_output_dir_override() {
        let config = EngineConfig::new("/work/docs").output_dir("/tmp/out");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_tree_data_file_lives_in_docs_dir() {
        let config = EngineConfig::new("/work/docs");
        assert_eq!(
            config.tree_data_file(),
            PathBuf::from("/work/docs/pageTreeData.orbitGenerated.json")
        );
    }
}
